use crate::prelude::*;
use crate::stream::{ByteStream, MappedStream};
pub mod nsp;
pub mod wavpack;
pub use nsp::NspReader;
pub use wavpack::{Backpatch, FinishReport, WavpackReader, WavpackWriter};

/// Container formats handled by the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Nsp,
    Wavpack,
}

impl Format {
    pub fn from_path(file_path: &str) -> R<Self> {
        let extension = std::path::Path::new(file_path)
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| Error::Config(format!("Invalid file extension: {}", file_path)))?;

        match extension.to_lowercase().as_str() {
            "nsp" => Ok(Format::Nsp),
            "wv" => Ok(Format::Wavpack),
            _ => Err(Error::Config(format!(
                "No format found for extension: {}",
                extension
            ))),
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            Format::Nsp => "nsp",
            Format::Wavpack => "wv",
        }
    }
}

/// Native sample word layout exchanged with a codec engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    I8,
    #[default]
    I16,
    I24,
    I32,
    F32,
}

impl SampleFormat {
    pub fn from_bits(bits_per_sample: u16, is_float: bool) -> R<Self> {
        match (bits_per_sample, is_float) {
            (8, false) => Ok(SampleFormat::I8),
            (16, false) => Ok(SampleFormat::I16),
            (24, false) => Ok(SampleFormat::I24),
            (32, false) => Ok(SampleFormat::I32),
            (32, true) => Ok(SampleFormat::F32),
            (bits, true) => Err(Error::Config(format!(
                "Float samples must be 32-bit, got {} bits",
                bits
            ))),
            (bits, false) => Err(Error::Config(format!("Unsupported bit depth: {}", bits))),
        }
    }

    pub fn bits_per_sample(&self) -> u16 {
        match self {
            SampleFormat::I8 => 8,
            SampleFormat::I16 => 16,
            SampleFormat::I24 => 24,
            SampleFormat::I32 => 32,
            SampleFormat::F32 => 32,
        }
    }

    pub fn bytes_per_sample(&self) -> u16 {
        self.bits_per_sample() / 8
    }

    pub fn is_float(&self) -> bool {
        matches!(self, SampleFormat::F32)
    }
}

/// Stream parameters recovered at read-open
#[derive(Debug, Clone, PartialEq)]
pub struct StreamParams {
    pub sample_rate: f64,
    pub channels: u16,
    pub format: SampleFormat,
    /// Total interleaved samples, when known
    pub length: Option<u64>,
}

impl StreamParams {
    pub fn duration_seconds(&self) -> Option<f64> {
        let frames = self.length? / self.channels.max(1) as u64;
        (self.sample_rate > 0.0).then(|| frames as f64 / self.sample_rate)
    }
}

#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: String,
    pub size: usize,
    pub sample_rate: f64,
    pub channels: u16,
    pub bit_depth: u16,
    pub duration: String,
}

impl FileInfo {
    fn new(path: &str, size: usize, params: &StreamParams) -> Self {
        Self {
            path: path.to_string(),
            size,
            sample_rate: params.sample_rate,
            channels: params.channels,
            bit_depth: params.format.bits_per_sample(),
            duration: format_duration(params.duration_seconds().unwrap_or(0.0)),
        }
    }
}

/// A requested rate always wins; disagreeing with a declared nonzero rate is
/// worth a warning
pub(crate) fn resolve_sample_rate(declared: f64, requested: Option<f64>) -> f64 {
    match requested {
        Some(rate) => {
            if declared != 0.0 && declared != rate {
                warn!(
                    "sample rate in stream is {} Hz, using requested {} Hz",
                    declared, rate
                );
            }
            rate
        }
        None => declared,
    }
}

fn format_duration(duration_seconds: f64) -> String {
    let total = duration_seconds.max(0.0) as u64;
    if total >= 3600 {
        format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
    } else {
        format!("{}:{:02}", total / 60, total % 60)
    }
}

/// Read the stream parameters of a file without decoding any samples
pub fn probe_file(file_path: &str) -> R<FileInfo> {
    match Format::from_path(file_path)? {
        Format::Nsp => {
            let mut stream = MappedStream::open(file_path)?;
            let size = stream.length().unwrap_or(0) as usize;
            let reader = NspReader::open(stream, &config::ReadOptions::default())?;
            Ok(FileInfo::new(file_path, size, reader.params()))
        }
        #[cfg(feature = "wavpack")]
        Format::Wavpack => {
            let mut stream = MappedStream::open(file_path)?;
            let size = stream.length().unwrap_or(0) as usize;
            let reader = WavpackReader::open(
                stream,
                crate::libwavpack::LibWavpack::new(),
                &config::ReadOptions::default(),
            )?;
            Ok(FileInfo::new(file_path, size, reader.params()))
        }
        #[cfg(not(feature = "wavpack"))]
        Format::Wavpack => Err(Error::Config(
            "WavPack support requires the `wavpack` feature".into(),
        )),
    }
}
