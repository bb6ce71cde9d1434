//! Error types for splice.

use thiserror::Error;

/// Main error type for splice operations.
#[derive(Error, Debug)]
pub enum SpliceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Decoder error: {0}")]
    Decoder(String),

    #[error("Seek to {target} failed after {attempts} attempts")]
    Seek { target: u64, attempts: u32 },

    #[error("Read at {position} failed after {attempts} attempts")]
    Read { position: u64, attempts: u32 },

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Timeline error: {0}")]
    Timeline(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SpliceError {
    /// Whether the operation may succeed if retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Decoder(_) | Self::Io(_))
    }
}

impl From<serde_json::Error> for SpliceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type alias for splice operations.
pub type Result<T> = std::result::Result<T, SpliceError>;
