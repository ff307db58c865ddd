//! Capability interface of an external sample codec engine.
//!
//! The engine owns all knowledge of the compressed bitstream. Sessions hand it
//! a [`CodecStream`] on every call and exchange samples as native 32-bit words:
//! integers right-justified at the stream's depth, or IEEE float bit patterns.

use crate::adapter::CodecStream;
use crate::codecs::SampleFormat;
use crate::config::{Quality, WriteOptions};
use crate::prelude::*;

pub const CONFIG_FAST_FLAG: u32 = 0x200;
pub const CONFIG_HIGH_FLAG: u32 = 0x800;
pub const CONFIG_VERY_HIGH_FLAG: u32 = 0x1000;

/// Mono is front centre, stereo front left + right, anything wider the first
/// `n` speaker positions
pub fn channel_mask(channels: u16) -> i32 {
    match channels {
        1 => 4,
        2 => 3,
        n if n >= 31 => -1,
        n => (1 << n) - 1,
    }
}

impl Quality {
    pub fn engine_flags(&self) -> u32 {
        match self {
            Quality::Fast => CONFIG_FAST_FLAG,
            Quality::Normal => 0,
            Quality::High => CONFIG_HIGH_FLAG,
            Quality::VeryHigh => CONFIG_VERY_HIGH_FLAG,
        }
    }
}

/// Flat configuration record handed to the engine when a write session opens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub bytes_per_sample: i32,
    pub bits_per_sample: i32,
    pub channel_mask: i32,
    pub num_channels: i32,
    pub sample_rate: i32,
    pub flags: u32,
    pub float: bool,
}

impl EngineConfig {
    pub fn from_options(options: &WriteOptions) -> R<Self> {
        options.validate()?;
        Ok(Self {
            bytes_per_sample: options.format.bytes_per_sample() as i32,
            bits_per_sample: options.format.bits_per_sample() as i32,
            channel_mask: channel_mask(options.channels),
            num_channels: options.channels as i32,
            sample_rate: (options.sample_rate + 0.5) as i32,
            flags: options.quality.engine_flags(),
            float: options.format.is_float(),
        })
    }
}

/// Stream properties the engine reports after opening an input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineInfo {
    pub bytes_per_sample: u16,
    pub channels: u16,
    pub sample_rate: u32,
    /// Frames per channel, `None` when the stream does not say
    pub num_samples: Option<u64>,
    pub float: bool,
}

impl EngineInfo {
    pub fn format(&self) -> R<SampleFormat> {
        SampleFormat::from_bits(self.bytes_per_sample * 8, self.float)
    }
}

/// An external codec. All sample counts are in frames.
pub trait CodecEngine {
    fn open_input(&mut self, io: &mut dyn CodecStream) -> anyhow::Result<EngineInfo>;

    /// Decode up to `frames` frames into `buf`; returns frames decoded,
    /// 0 at end of stream
    fn unpack_samples(
        &mut self,
        io: &mut dyn CodecStream,
        buf: &mut [i32],
        frames: usize,
    ) -> anyhow::Result<usize>;

    fn seek_sample(&mut self, io: &mut dyn CodecStream, frame: u64) -> anyhow::Result<()>;

    /// Open for output, apply the configuration and prepare to pack.
    /// `total_frames` of `None` means the length is unknown.
    fn open_output(
        &mut self,
        io: &mut dyn CodecStream,
        config: &EngineConfig,
        total_frames: Option<u64>,
    ) -> anyhow::Result<()>;

    fn pack_samples(
        &mut self,
        io: &mut dyn CodecStream,
        buf: &mut [i32],
        frames: usize,
    ) -> anyhow::Result<()>;

    /// Emit every pending block
    fn flush(&mut self, io: &mut dyn CodecStream) -> anyhow::Result<()>;

    /// Frame count currently declared in the stream header
    fn num_samples(&self) -> Option<u64>;

    /// Frames packed or unpacked so far
    fn sample_index(&self) -> u64;

    /// Rewrite the frame count inside a copy of the first block
    fn update_num_samples(&mut self, first_block: &mut [u8]) -> anyhow::Result<()>;
}
