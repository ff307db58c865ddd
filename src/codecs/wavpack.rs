//! WavPack read and write sessions
//!
//! Both sessions drive a [`CodecEngine`] over a [`CodecIo`] adapter and move
//! samples through the converter in `crate::convert`. The write session ends
//! with a finalize step that can rewrite the frame count in the first block
//! when the length was not known up front.

use crate::adapter::{CodecIo, CodecStream, Origin};
use crate::codecs::{StreamParams, resolve_sample_rate};
use crate::config::{ReadOptions, WriteOptions};
use crate::convert::{decode_block, encode_block};
use crate::engine::{CodecEngine, EngineConfig};
use crate::prelude::*;
use crate::stream::ByteStream;

/// Every WavPack block starts with this
pub const WAVPACK_SIGNATURE: &[u8; 4] = b"wvpk";

/// A first block shorter than the signature cannot be verified
const MIN_BACKPATCH_BLOCK: usize = 4;

fn encode_error(context: &str, err: anyhow::Error) -> Error {
    match err.downcast::<std::io::Error>() {
        Ok(e) => Error::Io(e),
        Err(err) => Error::Encode(format!("{}: {:#}", context, err)),
    }
}

pub struct WavpackReader<S, E> {
    io: CodecIo<S>,
    engine: E,
    params: StreamParams,
    clips: u64,
}

impl<S: ByteStream, E: CodecEngine> WavpackReader<S, E> {
    pub fn open(stream: S, mut engine: E, options: &ReadOptions) -> R<Self> {
        let mut io = CodecIo::new(stream);
        let info = engine.open_input(&mut io)?;
        if info.channels == 0 {
            return Err(Error::format("WavPack stream has no channels"));
        }
        let format = info.format()?;

        let params = StreamParams {
            sample_rate: resolve_sample_rate(info.sample_rate as f64, options.sample_rate),
            channels: info.channels,
            format,
            length: info.num_samples.map(|frames| frames * info.channels as u64),
        };

        debug!(
            "WavPack: {} channel(s), {:?} at {} Hz, {:?} samples",
            params.channels, params.format, params.sample_rate, params.length
        );

        Ok(Self {
            io,
            engine,
            params,
            clips: 0,
        })
    }

    pub fn params(&self) -> &StreamParams {
        &self.params
    }

    /// Samples clipped while converting floats into the internal domain
    pub fn clips(&self) -> u64 {
        self.clips
    }

    /// Fill `buf` with whole frames of interleaved samples. Returns the number
    /// of samples written, 0 at end of stream.
    pub fn read_samples(&mut self, buf: &mut [Sample]) -> R<usize> {
        let channels = self.params.channels as usize;
        let frames = buf.len() / channels;
        if frames == 0 {
            return Ok(0);
        }

        let window = &mut buf[..frames * channels];
        let got = self
            .engine
            .unpack_samples(&mut self.io, window, frames)?
            .min(frames);

        let count = got * channels;
        self.clips += decode_block(&mut buf[..count], self.params.format);
        Ok(count)
    }

    /// Position at interleaved sample `offset`, rounded down to a frame
    pub fn seek(&mut self, offset: u64) -> R<()> {
        let frame = offset / self.params.channels as u64;
        self.engine.seek_sample(&mut self.io, frame)?;
        Ok(())
    }

    pub fn into_inner(self) -> S {
        self.io.into_inner()
    }
}

/// Lifecycle of a write session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteState {
    Writing,
    FlushPending,
    BackpatchPending,
    Closed,
}

/// What finalize did about the first block's frame count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backpatch {
    /// Count already correct, output not seekable, or first block too small
    NotNeeded,
    Patched,
    /// The re-read first block was not a WavPack block; left as written
    SignatureMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishReport {
    /// Interleaved samples handed to the engine
    pub samples_written: u64,
    pub clips: u64,
    pub backpatch: Backpatch,
}

pub struct WavpackWriter<S, E> {
    io: CodecIo<S>,
    engine: E,
    params: StreamParams,
    state: WriteState,
    samples_written: u64,
    clips: u64,
    backpatch: Backpatch,
    native: Vec<i32>,
}

impl<S: ByteStream, E: CodecEngine> WavpackWriter<S, E> {
    pub fn open(stream: S, mut engine: E, options: &WriteOptions) -> R<Self> {
        let config = EngineConfig::from_options(options)?;
        let mut io = CodecIo::new(stream);
        engine.open_output(&mut io, &config, options.total_frames())?;

        debug!(
            "WavPack: writing {} channel(s) {:?} at {} Hz (mask {:#x}, flags {:#x})",
            config.num_channels, options.format, config.sample_rate, config.channel_mask, config.flags
        );

        Ok(Self {
            io,
            engine,
            params: StreamParams {
                sample_rate: options.sample_rate,
                channels: options.channels,
                format: options.format,
                length: options.length,
            },
            state: WriteState::Writing,
            samples_written: 0,
            clips: 0,
            backpatch: Backpatch::NotNeeded,
            native: Vec::new(),
        })
    }

    pub fn params(&self) -> &StreamParams {
        &self.params
    }

    pub fn state(&self) -> WriteState {
        self.state
    }

    pub fn clips(&self) -> u64 {
        self.clips
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Encode whole frames from `buf`; a trailing partial frame is left
    /// unwritten. Returns the number of samples consumed.
    pub fn write_samples(&mut self, buf: &[Sample]) -> R<usize> {
        if self.state != WriteState::Writing {
            return Err(Error::State(format!(
                "cannot write samples in state {:?}",
                self.state
            )));
        }

        let channels = self.params.channels as usize;
        let frames = buf.len() / channels;
        if frames == 0 {
            return Ok(0);
        }
        let count = frames * channels;

        self.native.resize(count, 0);
        self.clips += encode_block(&buf[..count], &mut self.native, self.params.format);
        self.engine
            .pack_samples(&mut self.io, &mut self.native, frames)
            .map_err(|e| encode_error("WavPack pack failed", e))?;

        self.samples_written += count as u64;
        Ok(count)
    }

    /// Flush the engine and, when needed, patch the frame count into the
    /// first block. Callable once.
    pub fn finish(&mut self) -> R<FinishReport> {
        if self.state == WriteState::Closed {
            return Err(Error::State("write session already finished".into()));
        }

        while self.advance()? != WriteState::Closed {}
        self.io.stream_mut().flush()?;

        if self.clips > 0 {
            debug!("WavPack: {} samples clipped", self.clips);
        }

        Ok(FinishReport {
            samples_written: self.samples_written,
            clips: self.clips,
            backpatch: self.backpatch,
        })
    }

    fn advance(&mut self) -> R<WriteState> {
        let next = match self.state {
            WriteState::Writing => WriteState::FlushPending,
            WriteState::FlushPending => {
                // A failed flush is final.
                self.state = WriteState::Closed;
                self.engine
                    .flush(&mut self.io)
                    .map_err(|e| encode_error("WavPack flush failed", e))?;
                if self.backpatch_due() {
                    WriteState::BackpatchPending
                } else {
                    WriteState::Closed
                }
            }
            WriteState::BackpatchPending => {
                self.state = WriteState::Closed;
                self.backpatch = self.patch_first_block()?;
                WriteState::Closed
            }
            WriteState::Closed => {
                return Err(Error::State("write session already finished".into()));
            }
        };
        self.state = next;
        Ok(next)
    }

    fn backpatch_due(&self) -> bool {
        self.io.is_seekable()
            && self.engine.num_samples() != Some(self.engine.sample_index())
            && self
                .io
                .first_block_size()
                .is_some_and(|size| size >= MIN_BACKPATCH_BLOCK)
    }

    fn patch_first_block(&mut self) -> R<Backpatch> {
        let size = self
            .io
            .first_block_size()
            .ok_or_else(|| Error::State("no block was written".into()))?;

        let mut block = vec![0u8; size];
        self.io.seek_abs(0)?;
        let n = self.io.read_bytes(&mut block)?;
        if n < size || !block.starts_with(WAVPACK_SIGNATURE) {
            warn!("WavPack: first block signature mismatch, frame count not updated");
            return Ok(Backpatch::SignatureMismatch);
        }

        self.engine.update_num_samples(&mut block)?;
        self.io.seek_abs(0)?;
        self.io.write_bytes(&block)?;
        self.io.seek_rel(0, Origin::End)?;

        debug!(
            "WavPack: frame count patched to {} in {}-byte first block",
            self.engine.sample_index(),
            size
        );
        Ok(Backpatch::Patched)
    }

    pub fn into_inner(self) -> S {
        self.io.into_inner()
    }
}
