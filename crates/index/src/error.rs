//! Index Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An index error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for index operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading or replacing the backing file failed.
    #[display("could not persist index to {}", _0.display())]
    Persist(#[error(not(source))] PathBuf),
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    /// A record can't be represented in (or recovered from) the backing store.
    #[display("invalid index data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
    /// Unknown index backend name.
    #[display("unsupported index backend: {_0:?}")]
    UnsupportedBackend(#[error(not(source))] String),
    /// A blocking worker panicked or was cancelled.
    #[display("blocking index task failed")]
    Task,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persist(_) | Self::Task)
    }
}
