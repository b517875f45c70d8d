//! Metadata index mapping public URLs to stored files.
//!
//! The index is the authority on which URLs exist; the storage engine is the
//! authority on bytes. Handlers only ever talk to a [`MetadataStore`], so the
//! persistence strategy can change without touching them:
//! - [`FlatFileIndex`]: every entry in memory, mirrored to a JSON-lines file
//!   that is rewritten in full (write-new-then-rename) on each mutation.
//! - [`SqliteIndex`]: an embedded SQLite table, for indexes that outgrow a
//!   full rewrite per upload.

pub mod error;
mod flat;
mod models;
mod sqlite;

pub use crate::flat::FlatFileIndex;
pub use crate::sqlite::SqliteIndex;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use strata_storage::StorageInfo;

/// Persistent url → [`StorageInfo`] mapping.
///
/// Every mutation is durable before the call returns. Implementations
/// serialize all four operations; none of them is cancellable half-way in a
/// way that loses previously stored entries.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Add `info`, or overwrite the entry with the same url in place.
    async fn insert(&self, info: StorageInfo) -> Result<()>;

    /// Snapshot of every entry in insertion order.
    async fn get_all(&self) -> Result<Vec<StorageInfo>>;

    async fn get_one_by_url(&self, url: &str) -> Result<Option<StorageInfo>>;

    /// Remove the entry for `url`. Returns `false` if there was none.
    async fn delete_by_url(&self, url: &str) -> Result<bool>;
}

pub type IndexHandle = Arc<dyn MetadataStore>;

/// Which [`MetadataStore`] implementation to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    File,
    Sqlite,
}
impl FromStr for Backend {
    type Err = crate::error::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "sqlite" => Ok(Self::Sqlite),
            _ => exn::bail!(ErrorKind::UnsupportedBackend(s.to_string())),
        }
    }
}
impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Self::File => "file",
            Self::Sqlite => "sqlite",
        })
    }
}

/// Open the index stored at `path` with the chosen backend.
pub async fn open(backend: Backend, path: impl AsRef<Path>) -> Result<IndexHandle> {
    let path = path.as_ref();
    tracing::info!(%backend, path = %path.display(), "Opening metadata index");
    let index: IndexHandle = match backend {
        Backend::File => Arc::new(FlatFileIndex::load(path).await?),
        Backend::Sqlite => Arc::new(SqliteIndex::connect(path).await?),
    };
    Ok(index)
}
