//! NSP (CSL) container reader
//!
//! An NSP file is the 8-byte magic `FORMDS16`, a 32-bit size for the chunk
//! area, then a sequence of `tag + size + payload` chunks. The header lives in
//! `HEDR` or `HDR8`, the audio in `SDA_` as raw 16-bit signed PCM.
//!
//! The scanner never seeks backwards past what it has read on a forward-only
//! stream: there it stops at the payload chunk and leaves the stream positioned
//! on the first sample. On a seekable stream it walks past the payload to see
//! trailing chunks, then returns to the payload start.

pub mod header;

use crate::codecs::{SampleFormat, StreamParams, resolve_sample_rate};
use crate::config::{Endian, ReadOptions};
use crate::convert::signed_16bit_to_sample;
use crate::prelude::*;
use crate::stream::{ByteStream, discard};
use byteorder::ByteOrder;
pub use header::{CHANNEL_ABSENT, HeaderChunk, HeaderKind};

pub const NSP_MAGIC: &[u8; 8] = b"FORMDS16";

const HEDR_CHUNK_ID: &[u8; 4] = b"HEDR";
const HDR8_CHUNK_ID: &[u8; 4] = b"HDR8";
const NOTE_CHUNK_ID: &[u8; 4] = b"NOTE";
const SDA_CHUNK_ID: &[u8; 4] = b"SDA_";
const MARK_CHUNK_ID: &[u8; 4] = b"MARK";
const INST_CHUNK_ID: &[u8; 4] = b"INST";
const COMT_CHUNK_ID: &[u8; 4] = b"COMT";

/// Longest `NOTE` text kept for the debug log; the rest is skipped
const NOTE_LOG_LIMIT: u64 = 4096;

/// Bytes per payload sample
const NSP_SAMPLE_BYTES: u64 = 2;

/// Where the sample payload sits in the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLocation {
    pub offset: u64,
    pub length: u64,
}

/// Everything the chunk walk recovered
#[derive(Debug, Clone)]
pub struct ScanResult {
    /// Size of the chunk area from the container header. Not validated.
    pub declared_size: u32,
    pub header: Option<HeaderChunk>,
    pub note: Option<String>,
    pub payload: PayloadLocation,
}

/// Walk the chunk list. On return the stream is positioned at the first
/// payload byte.
pub fn scan<S: ByteStream + ?Sized>(stream: &mut S, order: Endian) -> R<ScanResult> {
    let mut magic = [0u8; 8];
    if stream.read_full(&mut magic)? < magic.len() || &magic != NSP_MAGIC {
        return Err(Error::format(
            "NSP header does not begin with magic word `FORMDS16'",
        ));
    }

    let declared_size = read_u32(stream, order)?
        .ok_or_else(|| Error::format("NSP container header truncated"))?;

    let seekable = stream.is_seekable();
    let mut header = None;
    let mut note = None;
    let mut payload: Option<PayloadLocation> = None;

    loop {
        let Some((tag, size)) = read_chunk_header(stream, order)? else {
            break;
        };
        let size = size as u64;

        match &tag {
            HEDR_CHUNK_ID | HDR8_CHUNK_ID => {
                let kind = if &tag == HEDR_CHUNK_ID {
                    HeaderKind::Short
                } else {
                    HeaderKind::Extended
                };
                let body = read_chunk_prefix(stream, size, kind.encoded_len() as u64)?;
                header = Some(HeaderChunk::decode(kind, &body, order)?);
            }
            NOTE_CHUNK_ID => {
                let body = read_chunk_prefix(stream, size, NOTE_LOG_LIMIT)?;
                let text = String::from_utf8_lossy(&body)
                    .trim_end_matches('\0')
                    .to_string();
                debug!("NSP comment: {}", text);
                note = Some(text);
            }
            SDA_CHUNK_ID => {
                let location = PayloadLocation {
                    offset: stream.tell(),
                    length: size,
                };
                payload = Some(location);
                if !seekable {
                    break;
                }
                stream.seek(SeekFrom::Current(size as i64))?;
            }
            MARK_CHUNK_ID | INST_CHUNK_ID | COMT_CHUNK_ID => {
                discard(stream, size)?;
            }
            _ => {
                debug!(
                    "NSP: skipping unknown chunk `{}' ({} bytes)",
                    String::from_utf8_lossy(&tag),
                    size
                );
                discard(stream, size)?;
            }
        }
    }

    let payload = payload.ok_or_else(|| Error::format("NSP: no sound data on input file"))?;
    if seekable {
        stream.seek(SeekFrom::Start(payload.offset))?;
    }

    Ok(ScanResult {
        declared_size,
        header,
        note,
        payload,
    })
}

/// Tag and size of the next chunk, or `None` when the stream ends before a
/// complete chunk header
fn read_chunk_header<S: ByteStream + ?Sized>(
    stream: &mut S,
    order: Endian,
) -> R<Option<([u8; 4], u32)>> {
    let mut tag = [0u8; 4];
    if stream.read_full(&mut tag)? < tag.len() {
        return Ok(None);
    }
    Ok(read_u32(stream, order)?.map(|size| (tag, size)))
}

fn read_u32<S: ByteStream + ?Sized>(stream: &mut S, order: Endian) -> R<Option<u32>> {
    let mut buf = [0u8; 4];
    if stream.read_full(&mut buf)? < buf.len() {
        return Ok(None);
    }
    Ok(Some(match order {
        Endian::Little => LittleEndian::read_u32(&buf),
        Endian::Big => BigEndian::read_u32(&buf),
    }))
}

/// Read at most `keep` bytes of a chunk payload and skip the remainder, so
/// exactly `size` bytes are consumed
fn read_chunk_prefix<S: ByteStream + ?Sized>(stream: &mut S, size: u64, keep: u64) -> R<Vec<u8>> {
    let mut body = vec![0u8; size.min(keep) as usize];
    let n = stream.read_full(&mut body)?;
    body.truncate(n);
    if n as u64 == size.min(keep) {
        discard(stream, size - n as u64)?;
    }
    Ok(body)
}

/// Reader for NSP files. Samples come out in the internal domain.
pub struct NspReader<S> {
    stream: S,
    params: StreamParams,
    header: HeaderChunk,
    scan: ScanResult,
    byte_order: Endian,
    remaining: u64,
    scratch: Vec<u8>,
}

impl<S: ByteStream> NspReader<S> {
    pub fn open(mut stream: S, options: &ReadOptions) -> R<Self> {
        let scan = scan(&mut stream, options.byte_order)?;
        let header = scan
            .header
            .clone()
            .ok_or_else(|| Error::format("NSP: no channels defined"))?;

        let sample_rate = resolve_sample_rate(header.sample_rate as f64, options.sample_rate);

        let params = StreamParams {
            sample_rate,
            channels: header.channels,
            format: SampleFormat::I16,
            length: Some(scan.payload.length / NSP_SAMPLE_BYTES),
        };

        debug!(
            "NSP: {} channel(s) at {} Hz, {} payload bytes at offset {}",
            params.channels, params.sample_rate, scan.payload.length, scan.payload.offset
        );

        Ok(Self {
            stream,
            params,
            header,
            remaining: scan.payload.length,
            scan,
            byte_order: options.byte_order,
            scratch: Vec::new(),
        })
    }

    pub fn params(&self) -> &StreamParams {
        &self.params
    }

    pub fn header(&self) -> &HeaderChunk {
        &self.header
    }

    pub fn payload(&self) -> PayloadLocation {
        self.scan.payload
    }

    /// Text of the last `NOTE` chunk seen, if any
    pub fn note(&self) -> Option<&str> {
        self.scan.note.as_deref()
    }

    pub fn declared_size(&self) -> u32 {
        self.scan.declared_size
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    /// Read up to `buf.len()` interleaved samples, never past the payload
    /// chunk. Returns the count; 0 means the payload is exhausted.
    pub fn read_samples(&mut self, buf: &mut [Sample]) -> R<usize> {
        let want = (buf.len() as u64).min(self.remaining / NSP_SAMPLE_BYTES) as usize;
        if want == 0 {
            return Ok(0);
        }

        self.scratch.resize(want * NSP_SAMPLE_BYTES as usize, 0);
        let n = self.stream.read_full(&mut self.scratch)?;
        self.remaining -= n as u64;

        let got = n / NSP_SAMPLE_BYTES as usize;
        for (dst, word) in buf.iter_mut().zip(self.scratch[..got * 2].chunks_exact(2)) {
            let native = match self.byte_order {
                Endian::Little => LittleEndian::read_i16(word),
                Endian::Big => BigEndian::read_i16(word),
            };
            *dst = signed_16bit_to_sample(native as i32);
        }
        Ok(got)
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}
