//! Request handlers, one per route.

mod delete;
mod download;
mod list;
mod upload;

pub(crate) use self::delete::delete;
pub(crate) use self::download::download;
pub(crate) use self::list::list;
pub(crate) use self::upload::upload;

use crate::error::Rejection;
use axum::http::StatusCode;

/// Fallback for every unrouted path.
pub(crate) async fn not_found() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, "Not Found")
}

pub(crate) type HandlerResult<T> = std::result::Result<T, Rejection>;
