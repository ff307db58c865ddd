pub mod adapter;
pub mod codecs;
pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
mod prelude;
pub mod stream;

#[cfg(feature = "wavpack")]
pub mod libwavpack;
#[cfg(feature = "wavpack")]
pub mod wavpack_bindings;

pub use codecs::{Format, SampleFormat, StreamParams, probe_file};
pub use config::{Endian, Quality, ReadOptions, WriteOptions};
pub use error::{Error, R};

/// Internal sample: full-range signed 32-bit PCM
pub type Sample = i32;

pub const SAMPLE_MAX: Sample = i32::MAX;
pub const SAMPLE_MIN: Sample = i32::MIN;
