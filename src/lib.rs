//! strata: single-node file storage over HTTP.
//!
//! Uploaded files land in one of two tiers, a plain **low** tier for fast
//! retrieval or a compressed **deep** tier for space efficiency, and a
//! metadata index maps each file's public URL to where it is stored.
//!
//! `strata-storage` decides placement and does the (de)compression;
//! `strata-index` persists the URL mapping. This crate ties them together
//! behind an [`axum`] router ([`router`]).

pub mod error;
mod handlers;
mod routes;
mod state;

pub use crate::routes::router;
pub use crate::state::AppState;
