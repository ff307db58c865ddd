//! FFI declarations for the subset of the WavPack C library used by
//! [`crate::libwavpack`]: stream-callback input, block-callback output.

#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_int, c_uchar, c_void};

pub type int32_t = i32;
pub type uint32_t = u32;
pub type int64_t = i64;

#[repr(C)]
#[derive(Debug, Clone)]
pub struct WavpackConfig {
    pub bitrate: f32,
    pub shaping_weight: f32,
    pub bits_per_sample: c_int,
    pub bytes_per_sample: c_int,
    pub qmode: c_int,
    pub flags: c_int,
    pub xmode: c_int,
    pub num_channels: c_int,
    pub float_norm_exp: c_int,
    pub block_samples: int32_t,
    pub worker_threads: int32_t,
    pub sample_rate: int32_t,
    pub channel_mask: int32_t,
    pub md5_checksum: [c_uchar; 16],
    pub md5_read: c_uchar,
    pub num_tag_strings: c_int,
    pub tag_strings: *mut *mut c_char,
}

impl Default for WavpackConfig {
    fn default() -> Self {
        Self {
            bitrate: 0.0,
            shaping_weight: 0.0,
            bits_per_sample: 0,
            bytes_per_sample: 0,
            qmode: 0,
            flags: 0,
            xmode: 0,
            num_channels: 0,
            float_norm_exp: 0,
            block_samples: 0,
            worker_threads: 0,
            sample_rate: 0,
            channel_mask: 0,
            md5_checksum: [0; 16],
            md5_read: 0,
            num_tag_strings: 0,
            tag_strings: std::ptr::null_mut(),
        }
    }
}

/// Stream callbacks, 64-bit positions
#[repr(C)]
pub struct WavpackStreamReader64 {
    pub read_bytes: Option<
        unsafe extern "C" fn(id: *mut c_void, data: *mut c_void, bcount: int32_t) -> int32_t,
    >,
    pub write_bytes: Option<
        unsafe extern "C" fn(id: *mut c_void, data: *mut c_void, bcount: int32_t) -> int32_t,
    >,
    pub get_pos: Option<unsafe extern "C" fn(id: *mut c_void) -> int64_t>,
    pub set_pos_abs: Option<unsafe extern "C" fn(id: *mut c_void, pos: int64_t) -> c_int>,
    pub set_pos_rel:
        Option<unsafe extern "C" fn(id: *mut c_void, delta: int64_t, mode: c_int) -> c_int>,
    pub push_back_byte: Option<unsafe extern "C" fn(id: *mut c_void, c: c_int) -> c_int>,
    pub get_length: Option<unsafe extern "C" fn(id: *mut c_void) -> int64_t>,
    pub can_seek: Option<unsafe extern "C" fn(id: *mut c_void) -> c_int>,
    pub truncate_here: Option<unsafe extern "C" fn(id: *mut c_void) -> c_int>,
    pub close: Option<unsafe extern "C" fn(id: *mut c_void) -> c_int>,
}

/// Called once per finished block; returns nonzero on success
pub type WavpackBlockOutput =
    unsafe extern "C" fn(id: *mut c_void, data: *mut c_void, bcount: int32_t) -> c_int;

#[repr(C)]
pub struct WavpackContext {
    _private: [u8; 0],
}

pub const OPEN_NORMALIZE: c_int = 0x10;

pub const MODE_FLOAT: c_int = 0x8;

/// Size of the error buffer the open functions fill
pub const WAVPACK_ERROR_LEN: usize = 80;

#[link(name = "wavpack")]
unsafe extern "C" {
    pub fn WavpackOpenFileInputEx64(
        reader: *mut WavpackStreamReader64,
        wv_id: *mut c_void,
        wvc_id: *mut c_void,
        error: *mut c_char,
        flags: c_int,
        norm_offset: c_int,
    ) -> *mut WavpackContext;

    pub fn WavpackUnpackSamples(
        wpc: *mut WavpackContext,
        buffer: *mut int32_t,
        samples: uint32_t,
    ) -> uint32_t;

    pub fn WavpackSeekSample64(wpc: *mut WavpackContext, sample: int64_t) -> c_int;

    pub fn WavpackCloseFile(wpc: *mut WavpackContext) -> *mut WavpackContext;

    pub fn WavpackGetMode(wpc: *mut WavpackContext) -> c_int;

    pub fn WavpackGetErrorMessage(wpc: *mut WavpackContext) -> *mut c_char;

    /// -1 when unknown
    pub fn WavpackGetNumSamples64(wpc: *mut WavpackContext) -> int64_t;

    pub fn WavpackGetSampleIndex64(wpc: *mut WavpackContext) -> int64_t;

    pub fn WavpackGetSampleRate(wpc: *mut WavpackContext) -> uint32_t;

    pub fn WavpackGetBytesPerSample(wpc: *mut WavpackContext) -> c_int;

    pub fn WavpackGetNumChannels(wpc: *mut WavpackContext) -> c_int;

    pub fn WavpackOpenFileOutput(
        blockout: WavpackBlockOutput,
        wv_id: *mut c_void,
        wvc_id: *mut c_void,
    ) -> *mut WavpackContext;

    pub fn WavpackSetConfiguration64(
        wpc: *mut WavpackContext,
        config: *mut WavpackConfig,
        total_samples: int64_t,
        chan_ids: *const c_uchar,
    ) -> c_int;

    pub fn WavpackPackInit(wpc: *mut WavpackContext) -> c_int;

    pub fn WavpackPackSamples(
        wpc: *mut WavpackContext,
        sample_buffer: *mut int32_t,
        sample_count: uint32_t,
    ) -> c_int;

    pub fn WavpackFlushSamples(wpc: *mut WavpackContext) -> c_int;

    pub fn WavpackUpdateNumSamples(wpc: *mut WavpackContext, first_block: *mut c_void);
}
