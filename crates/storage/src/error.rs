//! Storage Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;
use strata_compress::error::{Error as CompressionError, ErrorKind as CompressionErrorKind};

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// File does not exist
    #[display("file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied by the filesystem
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Client-supplied filename can't be placed inside a tier root
    #[display("invalid filename: {_0:?}")]
    InvalidFilename(#[error(not(source))] String),
    /// Storage type is neither `low` nor `deep`
    #[display("illegal storage type: {_0:?}")]
    InvalidTier(#[error(not(source))] String),
    /// Path lies under neither tier root (or under a different one than requested)
    #[display("path outside storage tiers: {}", _0.display())]
    OutsideTiers(#[error(not(source))] PathBuf),
    /// Store was constructed with an unusable configuration
    #[display("invalid storage configuration: {_0}")]
    Misconfigured(#[error(not(source))] String),
    /// Encoding/decoding a deep-tier artifact failed
    #[display("compression error: {_0}")]
    Compression(CompressionErrorKind),
    /// A blocking worker panicked or was cancelled
    #[display("blocking storage task failed")]
    Task,
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}
impl ErrorKind {
    /// Convert a compression error into a storage error, keeping the
    /// compress crate's frame as a child in the error tree.
    #[track_caller]
    pub fn compression(err: CompressionError) -> Error {
        let inner = (*err).clone();
        err.raise(ErrorKind::Compression(inner))
    }

    /// Classify an I/O failure on `path`.
    pub(crate) fn io(err: IoError, path: impl Into<PathBuf>) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.into()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.into()),
            _ => Self::Io(err),
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_are_classified() {
        let missing = IoError::new(std::io::ErrorKind::NotFound, "gone");
        assert!(matches!(ErrorKind::io(missing, "/a"), ErrorKind::NotFound(p) if p == PathBuf::from("/a")));
        let denied = IoError::new(std::io::ErrorKind::PermissionDenied, "nope");
        assert!(matches!(ErrorKind::io(denied, "/b"), ErrorKind::PermissionDenied(_)));
        let other = IoError::other("boom");
        assert!(matches!(ErrorKind::io(other, "/c"), ErrorKind::Io(_)));
    }

    #[test]
    fn compression_errors_keep_their_kind() {
        let err = "lz4".parse::<strata_compress::Compression>().unwrap_err();
        let raised = ErrorKind::compression(err);
        assert!(matches!(&*raised, ErrorKind::Compression(CompressionErrorKind::UnsupportedFormat(_))));
    }
}
