//! Render Error Types

use derive_more::{Display, Error};

/// A render error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for render operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Embedded asset is missing from the binary.
    #[display("asset not found: {_0}")]
    AssetNotFound(#[error(not(source))] String),
    /// Embedded asset isn't valid UTF-8.
    #[display("asset is not valid UTF-8: {_0}")]
    AssetEncoding(#[error(not(source))] String),
    /// Template failed to compile or render.
    #[display("template error")]
    Template,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
