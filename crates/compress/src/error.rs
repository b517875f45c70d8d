//! Compression Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};

/// A compression error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for compression operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Failed to initialize an encoder/decoder.
    #[display("codec initialization failed")]
    Encoder,
    /// Input is not valid data for the codec. Don't retry with the same input.
    #[display("invalid or corrupted data")]
    InvalidData,
    /// The name doesn't belong to any known bundle format.
    #[display("unsupported bundle format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// The bundle format is known but was compiled out.
    #[display("disabled bundle format: {_0}")]
    DisabledFormat(#[error(not(source))] String),
    /// Writing encoded or decoded output failed.
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }
}
