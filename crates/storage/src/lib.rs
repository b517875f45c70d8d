//! Storage engine for strata.
//!
//! Files live in one of two [`Tier`]s, each rooted at its own directory:
//! the **low** tier keeps bytes verbatim, the **deep** tier keeps them
//! encoded with the configured bundle format. [`TieredStore`] resolves
//! filenames to paths, writes and removes artifacts, and opens them for
//! serving (decoding deep-tier artifacts through a transient low-tier file).
//!
//! Tier membership is never stored; it is derived from where a path lives
//! ([`TieredStore::tier_of`]).

pub mod error;
mod locks;
mod models;
mod path;
mod store;

pub use crate::models::{StorageInfo, Tier};
pub use crate::path::validate_filename;
pub use crate::store::{Opened, TieredStore};
use std::sync::Arc;

pub type StoreHandle = Arc<TieredStore>;
