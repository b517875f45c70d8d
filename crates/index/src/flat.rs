//! JSON-lines index file, rewritten in full on every mutation.

use crate::MetadataStore;
use crate::error::{ErrorKind, Result};
use crate::models::Record;
use async_trait::async_trait;
use exn::ResultExt;
use std::collections::HashMap;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strata_storage::StorageInfo;
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::sync::Mutex;
use tokio::task::spawn_blocking;
use tracing::instrument;

/// Entries in insertion order, with a url → position lookup.
#[derive(Debug, Clone, Default)]
struct Entries {
    order: Vec<StorageInfo>,
    positions: HashMap<String, usize>,
}
impl Entries {
    /// Malformed lines are logged and skipped; a later line for the same url
    /// overwrites an earlier one.
    fn parse(contents: &[u8]) -> Self {
        let mut entries = Self::default();
        for (number, line) in contents.split(|byte| *byte == b'\n').enumerate() {
            if line.trim_ascii().is_empty() {
                continue;
            }
            let parsed = serde_json::from_slice::<Record>(line)
                .or_raise(|| ErrorKind::InvalidData("record"))
                .and_then(StorageInfo::try_from);
            match parsed {
                Ok(info) => entries.upsert(info),
                Err(err) => tracing::warn!(line = number + 1, error = ?err, "Skipping malformed index record"),
            }
        }
        entries
    }

    fn encode(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        for info in &self.order {
            serde_json::to_writer(&mut buffer, &Record::try_from(info)?).or_raise(|| ErrorKind::InvalidData("record"))?;
            buffer.push(b'\n');
        }
        Ok(buffer)
    }

    fn get(&self, url: &str) -> Option<&StorageInfo> {
        self.positions.get(url).map(|&position| &self.order[position])
    }

    fn upsert(&mut self, info: StorageInfo) {
        match self.positions.get(&info.url) {
            Some(&position) => self.order[position] = info,
            None => {
                self.positions.insert(info.url.clone(), self.order.len());
                self.order.push(info);
            },
        }
    }

    fn remove(&mut self, url: &str) -> bool {
        let Some(position) = self.positions.remove(url) else {
            return false;
        };
        self.order.remove(position);
        for (shifted, info) in self.order.iter().enumerate().skip(position) {
            self.positions.insert(info.url.clone(), shifted);
        }
        true
    }
}

/// Index kept in memory and mirrored to a flat file of JSON lines, one
/// [`StorageInfo`] per line.
///
/// A single lock guards reads and writes alike. Mutations are applied to a
/// copy, written to a sibling temporary file, synced and renamed over the
/// backing file; only then does the in-memory view change. A failed write
/// leaves both the old file and the in-memory entries untouched.
///
/// A mutation runs on the blocking pool while holding the lock, so it
/// completes (file and memory alike) even if the caller stops waiting.
#[derive(Debug)]
pub struct FlatFileIndex {
    path: PathBuf,
    entries: Arc<Mutex<Entries>>,
}

impl FlatFileIndex {
    /// Load the index from `path`. A missing file is an empty index.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read(&path).await {
            Ok(contents) => Entries::parse(&contents),
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                tracing::info!("No index file yet, starting empty");
                Entries::default()
            },
            Err(e) => return Err(e).or_raise(|| ErrorKind::Persist(path)),
        };
        tracing::debug!(entries = entries.order.len(), "Loaded index");
        Ok(Self { path, entries: Arc::new(Mutex::new(entries)) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `change` to a copy of the entries and, if it reports a change,
    /// persist the copy and swap it in.
    async fn mutate<F>(&self, change: F) -> Result<bool>
    where
        F: FnOnce(&mut Entries) -> bool + Send + 'static,
    {
        let mut entries = Arc::clone(&self.entries).lock_owned().await;
        let path = self.path.clone();
        spawn_blocking(move || -> Result<bool> {
            let mut next = entries.clone();
            if !change(&mut next) {
                return Ok(false);
            }
            replace_file(&path, &next.encode()?)?;
            *entries = next;
            Ok(true)
        })
        .await
        .or_raise(|| ErrorKind::Task)?
    }
}

fn replace_file(path: &Path, contents: &[u8]) -> Result<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let failed = || ErrorKind::Persist(path.to_path_buf());
    std::fs::create_dir_all(directory).or_raise(failed)?;
    let mut staged = NamedTempFile::new_in(directory).or_raise(failed)?;
    staged.write_all(contents).or_raise(failed)?;
    staged.as_file().sync_all().or_raise(failed)?;
    staged.persist(path).or_raise(failed)?;
    Ok(())
}

#[async_trait]
impl MetadataStore for FlatFileIndex {
    #[instrument(skip_all, fields(url = %info.url))]
    async fn insert(&self, info: StorageInfo) -> Result<()> {
        self.mutate(move |entries| {
            entries.upsert(info);
            true
        })
        .await?;
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<StorageInfo>> {
        Ok(self.entries.lock().await.order.clone())
    }

    async fn get_one_by_url(&self, url: &str) -> Result<Option<StorageInfo>> {
        Ok(self.entries.lock().await.get(url).cloned())
    }

    #[instrument(skip(self))]
    async fn delete_by_url(&self, url: &str) -> Result<bool> {
        let url = url.to_string();
        self.mutate(move |entries| entries.remove(&url)).await
    }
}
