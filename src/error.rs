//! Error types for container parsing and codec sessions

use thiserror::Error;

/// Result alias used throughout the crate
pub type R<T> = std::result::Result<T, Error>;

/// Fatal conditions. Clipping and skipped backpatches are not errors; they are
/// counted or reported on the session instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed container: bad magic, no channels, missing payload chunk
    #[error("Format error: {0}")]
    Format(String),

    /// Failure of the underlying byte stream, propagated verbatim
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Error reported by the external codec engine
    #[error("Codec engine error: {0}")]
    Engine(anyhow::Error),

    /// Packing or flushing samples failed
    #[error("Encode error: {0}")]
    Encode(String),

    /// Unsupported session options
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation not valid for the current session state
    #[error("Invalid state: {0}")]
    State(String),
}

/// Stream failures raised inside an engine call come back out as [`Error::Io`].
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<std::io::Error>() {
            Ok(e) => Error::Io(e),
            Err(err) => Error::Engine(err),
        }
    }
}

impl Error {
    pub fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Error::Format(_))
    }
}
