//! Service Error Types
//!
//! Handlers map every lower-level failure into exactly one [`ErrorKind`] at
//! their boundary; [`Rejection`] turns it into a status code and a short
//! plain-text body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use derive_more::{Display, Error};

/// A service error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The client sent something unusable (400).
    #[display("{_0}")]
    BadRequest(#[error(not(source))] String),
    /// The resource is absent after all checks (404).
    #[display("{_0}")]
    NotFound(#[error(not(source))] String),
    /// Something failed on our side (500).
    #[display("{_0}")]
    Internal(#[error(not(source))] String),
}

impl ErrorKind {
    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub(crate) fn internal() -> Self {
        Self::Internal("server error".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// The server could not be brought up; names the step that failed.
#[derive(Debug, Display, Error)]
#[display("startup failed: {_0}")]
pub struct StartupError(#[error(not(source))] pub &'static str);

/// Result type alias for bootstrapping the service.
pub type StartupResult<T> = std::result::Result<T, exn::Exn<StartupError>>;

/// Handler error; `?` on an [`Error`] converts into it.
#[derive(Debug)]
pub struct Rejection(pub Error);
impl From<Error> for Rejection {
    fn from(err: Error) -> Self {
        Self(err)
    }
}
impl From<ErrorKind> for Rejection {
    #[track_caller]
    fn from(kind: ErrorKind) -> Self {
        Self(Error::from(kind))
    }
}
impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let status = self.0.status();
        match status {
            StatusCode::INTERNAL_SERVER_ERROR => tracing::error!(error = ?self.0, "Request failed"),
            _ => tracing::info!(%status, reason = %*self.0, "Request rejected"),
        }
        (status, (*self.0).to_string()).into_response()
    }
}
