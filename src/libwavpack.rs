//! [`CodecEngine`] backed by the WavPack C library.
//!
//! WavPack keeps the `id` pointer it was opened with and calls back through it
//! on later calls, while sessions lend out their stream only for the duration
//! of one engine call. The id is therefore a heap [`IoSlot`] owned by the
//! engine through a raw pointer; each call parks the borrowed stream in the
//! slot and clears it again before returning. The callback table and the slot
//! are only ever touched through those raw pointers once the library has them.

use crate::adapter::{CodecStream, Origin};
use crate::engine::{CodecEngine, EngineConfig, EngineInfo};
use crate::prelude::*;
use crate::wavpack_bindings::*;
use libc::{c_int, c_void};
use std::ffi::CStr;
use std::io;
use std::ptr;

struct IoSlot {
    /// Points at a `&mut dyn CodecStream` on the caller's stack, or null
    io: *mut c_void,
    /// First stream failure seen by a callback during the current call
    error: Option<io::Error>,
}

impl IoSlot {
    /// Run `f` on the parked stream; a failure is recorded and `fail` returned
    unsafe fn with<T>(
        id: *mut c_void,
        fail: T,
        f: impl FnOnce(&mut dyn CodecStream) -> io::Result<T>,
    ) -> T {
        if id.is_null() {
            return fail;
        }
        let slot = unsafe { &mut *(id as *mut IoSlot) };
        if slot.io.is_null() {
            return fail;
        }
        let io = unsafe { &mut **(slot.io as *mut &mut dyn CodecStream) };
        match f(io) {
            Ok(value) => value,
            Err(e) => {
                slot.error.get_or_insert(e);
                fail
            }
        }
    }
}

unsafe extern "C" fn read_bytes(id: *mut c_void, data: *mut c_void, bcount: i32) -> i32 {
    if data.is_null() || bcount <= 0 {
        return 0;
    }
    let buf = unsafe { std::slice::from_raw_parts_mut(data as *mut u8, bcount as usize) };
    unsafe { IoSlot::with(id, 0, |io| io.read_bytes(buf).map(|n| n as i32)) }
}

unsafe extern "C" fn write_bytes(id: *mut c_void, data: *mut c_void, bcount: i32) -> i32 {
    if data.is_null() || bcount <= 0 {
        return 0;
    }
    let buf = unsafe { std::slice::from_raw_parts(data as *const u8, bcount as usize) };
    unsafe { IoSlot::with(id, 0, |io| io.write_bytes(buf).map(|n| n as i32)) }
}

unsafe extern "C" fn get_pos(id: *mut c_void) -> i64 {
    unsafe { IoSlot::with(id, -1, |io| Ok(io.tell() as i64)) }
}

unsafe extern "C" fn set_pos_abs(id: *mut c_void, pos: i64) -> c_int {
    if pos < 0 {
        return -1;
    }
    unsafe { IoSlot::with(id, -1, |io| io.seek_abs(pos as u64).map(|_| 0)) }
}

unsafe extern "C" fn set_pos_rel(id: *mut c_void, delta: i64, mode: c_int) -> c_int {
    let Some(origin) = Origin::from_whence(mode) else {
        return -1;
    };
    unsafe { IoSlot::with(id, -1, |io| io.seek_rel(delta, origin).map(|_| 0)) }
}

unsafe extern "C" fn push_back_byte(id: *mut c_void, c: c_int) -> c_int {
    unsafe { IoSlot::with(id, libc::EOF, |io| io.push_back(c as u8).map(|_| c)) }
}

unsafe extern "C" fn get_length(id: *mut c_void) -> i64 {
    unsafe { IoSlot::with(id, 0, |io| Ok(io.length().map_or(0, |len| len as i64))) }
}

unsafe extern "C" fn can_seek(id: *mut c_void) -> c_int {
    unsafe { IoSlot::with(id, 0, |io| Ok(io.is_seekable() as c_int)) }
}

unsafe extern "C" fn block_output(id: *mut c_void, data: *mut c_void, bcount: i32) -> c_int {
    if bcount <= 0 {
        return 1;
    }
    (unsafe { write_bytes(id, data, bcount) } == bcount) as c_int
}

pub struct LibWavpack {
    context: *mut WavpackContext,
    /// From `Box::into_raw`; freed in `Drop`
    reader: *mut WavpackStreamReader64,
    /// From `Box::into_raw`; freed in `Drop`
    slot: *mut IoSlot,
}

impl Default for LibWavpack {
    fn default() -> Self {
        Self::new()
    }
}

impl LibWavpack {
    pub fn new() -> Self {
        Self {
            context: ptr::null_mut(),
            reader: Box::into_raw(Box::new(WavpackStreamReader64 {
                read_bytes: Some(read_bytes),
                write_bytes: Some(write_bytes),
                get_pos: Some(get_pos),
                set_pos_abs: Some(set_pos_abs),
                set_pos_rel: Some(set_pos_rel),
                push_back_byte: Some(push_back_byte),
                get_length: Some(get_length),
                can_seek: Some(can_seek),
                truncate_here: None,
                close: None,
            })),
            slot: Box::into_raw(Box::new(IoSlot {
                io: ptr::null_mut(),
                error: None,
            })),
        }
    }

    fn slot_id(&self) -> *mut c_void {
        self.slot as *mut c_void
    }

    /// Park `io` in the slot for the duration of `f`. A stream failure seen by
    /// any callback takes precedence over the library's own result.
    fn with_io<T>(
        &mut self,
        io: &mut dyn CodecStream,
        f: impl FnOnce(&mut Self) -> anyhow::Result<T>,
    ) -> anyhow::Result<T> {
        let mut io_ref: &mut dyn CodecStream = io;
        unsafe {
            (*self.slot).io = &mut io_ref as *mut &mut dyn CodecStream as *mut c_void;
            (*self.slot).error = None;
        }

        let result = f(self);

        let error = unsafe {
            (*self.slot).io = ptr::null_mut();
            (*self.slot).error.take()
        };
        match error {
            Some(e) => Err(e.into()),
            None => result,
        }
    }

    fn context(&self) -> anyhow::Result<*mut WavpackContext> {
        if self.context.is_null() {
            return Err(anyhow!("WavPack context is not open"));
        }
        Ok(self.context)
    }

    fn last_error(&self) -> String {
        if self.context.is_null() {
            return "no context".to_string();
        }
        let msg = unsafe { WavpackGetErrorMessage(self.context) };
        if msg.is_null() {
            return "unknown error".to_string();
        }
        unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned()
    }

    fn close(&mut self) {
        if !self.context.is_null() {
            unsafe { WavpackCloseFile(self.context) };
            self.context = ptr::null_mut();
        }
    }
}

impl Drop for LibWavpack {
    fn drop(&mut self) {
        self.close();
        unsafe {
            drop(Box::from_raw(self.slot));
            drop(Box::from_raw(self.reader));
        }
    }
}

impl CodecEngine for LibWavpack {
    fn open_input(&mut self, io: &mut dyn CodecStream) -> anyhow::Result<EngineInfo> {
        self.close();
        self.with_io(io, |this| {
            let mut error = [0 as libc::c_char; WAVPACK_ERROR_LEN];
            let id = this.slot_id();
            this.context = unsafe {
                WavpackOpenFileInputEx64(
                    this.reader,
                    id,
                    ptr::null_mut(),
                    error.as_mut_ptr(),
                    OPEN_NORMALIZE,
                    0,
                )
            };
            if this.context.is_null() {
                let msg = unsafe { CStr::from_ptr(error.as_ptr()) };
                return Err(anyhow!("WavPack open failed: {}", msg.to_string_lossy()));
            }

            let ctx = this.context;
            let info = unsafe {
                EngineInfo {
                    bytes_per_sample: WavpackGetBytesPerSample(ctx) as u16,
                    channels: WavpackGetNumChannels(ctx) as u16,
                    sample_rate: WavpackGetSampleRate(ctx),
                    num_samples: u64::try_from(WavpackGetNumSamples64(ctx)).ok(),
                    float: WavpackGetMode(ctx) & MODE_FLOAT != 0,
                }
            };
            Ok(info)
        })
    }

    fn unpack_samples(
        &mut self,
        io: &mut dyn CodecStream,
        buf: &mut [i32],
        frames: usize,
    ) -> anyhow::Result<usize> {
        let ctx = self.context()?;
        self.with_io(io, |_| {
            let got = unsafe { WavpackUnpackSamples(ctx, buf.as_mut_ptr(), frames as u32) };
            Ok(got as usize)
        })
    }

    fn seek_sample(&mut self, io: &mut dyn CodecStream, frame: u64) -> anyhow::Result<()> {
        let ctx = self.context()?;
        self.with_io(io, |this| {
            if unsafe { WavpackSeekSample64(ctx, frame as i64) } == 0 {
                return Err(anyhow!("WavPack seek failed: {}", this.last_error()));
            }
            Ok(())
        })
    }

    fn open_output(
        &mut self,
        io: &mut dyn CodecStream,
        config: &EngineConfig,
        total_frames: Option<u64>,
    ) -> anyhow::Result<()> {
        self.close();
        self.with_io(io, |this| {
            let id = this.slot_id();
            this.context = unsafe { WavpackOpenFileOutput(block_output, id, ptr::null_mut()) };
            let ctx = this.context()?;

            let mut wv_config = WavpackConfig {
                bytes_per_sample: config.bytes_per_sample,
                bits_per_sample: config.bits_per_sample,
                channel_mask: config.channel_mask,
                num_channels: config.num_channels,
                sample_rate: config.sample_rate,
                flags: config.flags as c_int,
                ..WavpackConfig::default()
            };
            if config.float {
                wv_config.float_norm_exp = 127;
            }

            let total = total_frames.map_or(-1, |n| n as i64);
            if unsafe { WavpackSetConfiguration64(ctx, &mut wv_config, total, ptr::null()) } == 0 {
                return Err(anyhow!("WavPack configuration rejected: {}", this.last_error()));
            }
            if unsafe { WavpackPackInit(ctx) } == 0 {
                return Err(anyhow!("WavPack pack init failed: {}", this.last_error()));
            }
            Ok(())
        })
    }

    fn pack_samples(
        &mut self,
        io: &mut dyn CodecStream,
        buf: &mut [i32],
        frames: usize,
    ) -> anyhow::Result<()> {
        let ctx = self.context()?;
        self.with_io(io, |this| {
            if unsafe { WavpackPackSamples(ctx, buf.as_mut_ptr(), frames as u32) } == 0 {
                return Err(anyhow!("{}", this.last_error()));
            }
            Ok(())
        })
    }

    fn flush(&mut self, io: &mut dyn CodecStream) -> anyhow::Result<()> {
        let ctx = self.context()?;
        self.with_io(io, |this| {
            if unsafe { WavpackFlushSamples(ctx) } == 0 {
                return Err(anyhow!("{}", this.last_error()));
            }
            Ok(())
        })
    }

    fn num_samples(&self) -> Option<u64> {
        if self.context.is_null() {
            return None;
        }
        u64::try_from(unsafe { WavpackGetNumSamples64(self.context) }).ok()
    }

    fn sample_index(&self) -> u64 {
        if self.context.is_null() {
            return 0;
        }
        u64::try_from(unsafe { WavpackGetSampleIndex64(self.context) }).unwrap_or(0)
    }

    fn update_num_samples(&mut self, first_block: &mut [u8]) -> anyhow::Result<()> {
        let ctx = self.context()?;
        unsafe { WavpackUpdateNumSamples(ctx, first_block.as_mut_ptr() as *mut c_void) };
        Ok(())
    }
}

#[cfg(all(test, feature = "wavpack"))]
mod tests {
    use super::*;
    use crate::codecs::{Backpatch, SampleFormat, WavpackReader, WavpackWriter};
    use crate::config::{ReadOptions, WriteOptions};
    use crate::stream::{ByteStream, MemoryStream};

    fn write_unknown_length(format: SampleFormat, channels: u16, samples: &[i32]) -> Vec<u8> {
        let options = WriteOptions::new(44100.0, channels, format);
        let mut writer = WavpackWriter::open(MemoryStream::new(), LibWavpack::new(), &options).unwrap();
        for chunk in samples.chunks(1024) {
            writer.write_samples(chunk).unwrap();
        }
        let report = writer.finish().unwrap();
        assert_eq!(report.backpatch, Backpatch::Patched);
        assert_eq!(report.samples_written, samples.len() as u64);
        assert_eq!(report.clips, 0);
        writer.into_inner().into_inner()
    }

    fn read_all(data: Vec<u8>, len: usize) -> (WavpackReader<MemoryStream, LibWavpack>, Vec<i32>) {
        let mut reader =
            WavpackReader::open(MemoryStream::from_vec(data), LibWavpack::new(), &ReadOptions::default())
                .unwrap();
        let mut out = vec![0; len + 64];
        let mut filled = 0;
        loop {
            let n = reader.read_samples(&mut out[filled..]).unwrap();
            if n == 0 {
                break;
            }
            filled += n;
        }
        out.truncate(filled);
        (reader, out)
    }

    #[test]
    fn test_int16_round_trip_with_backpatch() {
        let samples: Vec<i32> = (0..8000).map(|i| ((i * 37) % 4001 - 2000) << 16).collect();
        let data = write_unknown_length(SampleFormat::I16, 2, &samples);
        assert_eq!(&data[..4], b"wvpk");

        let (reader, decoded) = read_all(data, samples.len());
        assert_eq!(reader.params().channels, 2);
        assert_eq!(reader.params().format, SampleFormat::I16);
        assert_eq!(reader.params().sample_rate, 44100.0);
        assert_eq!(reader.params().length, Some(8000));
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_float_round_trip() {
        let samples: Vec<i32> = [1 << 30, 0, -(1 << 28), 3 << 20]
            .iter()
            .copied()
            .cycle()
            .take(2000)
            .collect();
        let data = write_unknown_length(SampleFormat::F32, 1, &samples);

        let (reader, decoded) = read_all(data, samples.len());
        assert_eq!(reader.params().format, SampleFormat::F32);
        assert_eq!(reader.params().length, Some(2000));
        assert_eq!(decoded, samples);
        assert_eq!(reader.clips(), 0);
    }

    #[test]
    fn test_unknown_whence_is_refused() {
        let mut engine = LibWavpack::new();
        let mut stream = crate::adapter::CodecIo::new(MemoryStream::from_vec(vec![0; 16]));
        let id = engine.slot_id();
        let result = engine
            .with_io(&mut stream, |_| {
                Ok(unsafe { (set_pos_rel(id, 4, libc::SEEK_SET), set_pos_rel(id, 0, 7)) })
            })
            .unwrap();
        assert_eq!(result, (0, -1));
        assert_eq!(stream.stream().tell(), 4);
    }
}
