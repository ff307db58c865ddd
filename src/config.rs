//! Session options for read and write sessions

use crate::codecs::SampleFormat;
use crate::error::{Error, R};

/// Byte order of the numeric fields inside an NSP container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

/// Options for opening a stream for reading
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    /// Sample rate requested by the caller. When the stream declares a different
    /// rate, the requested one wins and a warning is logged.
    pub sample_rate: Option<f64>,

    /// Byte order of chunk sizes and header fields (NSP only, default: little)
    pub byte_order: Endian,
}

/// Compression effort handed to the codec engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    Fast,
    Normal,
    High,
    #[default]
    VeryHigh,
}

/// Options for opening a stream for writing
#[derive(Debug, Clone)]
pub struct WriteOptions {
    pub sample_rate: f64,
    pub channels: u16,
    pub format: SampleFormat,

    /// Total number of interleaved samples, if known up front. `None` tells the
    /// engine the length is unknown and enables the header backpatch at close.
    pub length: Option<u64>,

    pub quality: Quality,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            channels: 2,
            format: SampleFormat::I16,
            length: None,
            quality: Quality::default(),
        }
    }
}

impl WriteOptions {
    pub fn new(sample_rate: f64, channels: u16, format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            format,
            ..Self::default()
        }
    }

    pub fn with_length(mut self, length: u64) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn validate(&self) -> R<()> {
        if self.channels == 0 {
            return Err(Error::Config("channel count must be at least 1".into()));
        }
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(Error::Config(format!(
                "invalid sample rate: {}",
                self.sample_rate
            )));
        }
        if self.sample_rate + 0.5 > i32::MAX as f64 {
            return Err(Error::Config(format!(
                "sample rate out of range: {}",
                self.sample_rate
            )));
        }
        Ok(())
    }

    /// Total frames implied by `length`, if known
    pub fn total_frames(&self) -> Option<u64> {
        self.length.map(|len| len / self.channels.max(1) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_options_validation() {
        assert!(WriteOptions::default().validate().is_ok());

        let mut opts = WriteOptions::default();
        opts.channels = 0;
        assert!(matches!(opts.validate(), Err(Error::Config(_))));

        let opts = WriteOptions::new(f64::NAN, 1, SampleFormat::I16);
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_total_frames() {
        let opts = WriteOptions::new(48000.0, 2, SampleFormat::I24).with_length(1000);
        assert_eq!(opts.total_frames(), Some(500));
        assert_eq!(WriteOptions::default().total_frames(), None);
    }
}
