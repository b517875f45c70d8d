//! Two-tier filesystem store.
//!
//! All blocking work (encoding, decoding, fsync) runs inside
//! [`spawn_blocking`] so a large deep-tier upload doesn't stall the runtime.

use crate::error::{ErrorKind, Result};
use crate::locks::PathLocks;
use crate::models::{StorageInfo, Tier};
use crate::path::validate_filename;
use bytes::Bytes;
use exn::{OptionExt, ResultExt};
use std::borrow::Cow;
use std::fs::File as SyncFile;
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use strata_compress::{Compression, MAGIC_LEN};
use tempfile::{Builder as TempBuilder, NamedTempFile, TempPath};
use time::UtcDateTime;
use tokio::fs;
use tokio::task::spawn_blocking;
use tracing::instrument;

/// Transient filenames embed (a prefix of) the artifact name to make stray
/// files recognisable; keep them well below `NAME_MAX`.
const TRANSIENT_SEGMENT_CHARS: usize = 64;

/// Storage engine over a low-tier and a deep-tier root directory.
///
/// Roots are made absolute on construction but not created until first
/// needed ([`place`](Self::place) and deep-tier reads create them).
///
/// # Examples
///
/// ```no_run
/// use bytes::Bytes;
/// use strata_compress::Compression;
/// use strata_storage::{Tier, TieredStore};
///
/// # async fn example() -> strata_storage::error::Result<()> {
/// let store = TieredStore::new("/srv/low_storage", "/srv/deep_storage", Compression::Gzip)?;
/// let path = store.place(Tier::Deep, "a.txt").await?;
/// store.write(&path, Bytes::from_static(b"hello world"), Tier::Deep).await?;
/// let info = store.describe(&path, "/download/").await?;
/// assert_eq!(info.url, "/download/a.txt");
/// # Ok(())
/// # }
/// ```
pub struct TieredStore {
    low_root: PathBuf,
    deep_root: PathBuf,
    bundle_format: Compression,
    locks: PathLocks,
}

/// An artifact opened for serving.
///
/// For deep-tier artifacts the file is a decoded transient copy under the
/// low root; [`into_file`](Self::into_file) unlinks it while keeping the
/// handle readable.
pub struct Opened {
    file: fs::File,
    size: u64,
    transient: Option<TempPath>,
}
impl Opened {
    /// Number of bytes that will be served.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Location of the decoded copy, if one was made.
    pub fn transient_path(&self) -> Option<&Path> {
        self.transient.as_deref()
    }

    /// Take the open handle, removing the transient copy (best-effort).
    pub fn into_file(self) -> fs::File {
        if let Some(transient) = self.transient {
            let path = transient.to_path_buf();
            match transient.close() {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed transient file"),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Could not remove transient file"),
            }
        }
        self.file
    }
}

impl TieredStore {
    /// Create a store over two non-overlapping roots.
    ///
    /// # Errors
    /// [`Misconfigured`](ErrorKind::Misconfigured) if the roots overlap
    /// (tier membership would be ambiguous) or if `bundle_format` doesn't
    /// compress.
    pub fn new(
        low_root: impl AsRef<Path>,
        deep_root: impl AsRef<Path>,
        bundle_format: Compression,
    ) -> Result<Self> {
        let low_root = std::path::absolute(low_root.as_ref()).map_err(ErrorKind::Io)?;
        let deep_root = std::path::absolute(deep_root.as_ref()).map_err(ErrorKind::Io)?;
        if low_root.starts_with(&deep_root) || deep_root.starts_with(&low_root) {
            exn::bail!(ErrorKind::Misconfigured(format!(
                "low root `{}` and deep root `{}` overlap",
                low_root.display(),
                deep_root.display()
            )));
        }
        if !bundle_format.is_compressed() {
            exn::bail!(ErrorKind::Misconfigured(format!("bundle format `{bundle_format}` does not compress")));
        }
        Ok(Self {
            low_root,
            deep_root,
            bundle_format,
            locks: PathLocks::default(),
        })
    }

    pub fn root(&self, tier: Tier) -> &Path {
        match tier {
            Tier::Low => &self.low_root,
            Tier::Deep => &self.deep_root,
        }
    }

    pub fn bundle_format(&self) -> Compression {
        self.bundle_format
    }

    /// Which tier `path` belongs to, judged purely by its location.
    pub fn tier_of(&self, path: impl AsRef<Path>) -> Option<Tier> {
        let path = path.as_ref();
        [Tier::Low, Tier::Deep]
            .into_iter()
            .find(|tier| path.starts_with(self.root(*tier)) && path != self.root(*tier))
    }

    async fn ensure_root(&self, tier: Tier) -> Result<&Path> {
        let root = self.root(tier);
        fs::create_dir_all(root).await.map_err(|e| ErrorKind::io(e, root))?;
        Ok(root)
    }

    /// Resolve where `filename` lives in `tier`, creating the tier root if
    /// it's missing.
    #[instrument(skip(self))]
    pub async fn place(&self, tier: Tier, filename: &str) -> Result<PathBuf> {
        let filename = validate_filename(filename)?;
        Ok(self.ensure_root(tier).await?.join(filename))
    }

    /// Store `data` at `path`, encoding it with the bundle format for the
    /// deep tier.
    ///
    /// The bytes are staged in a temporary file beside the destination and
    /// renamed over it once fully written and synced, so an existing file is
    /// either left intact or replaced whole. Concurrent writes to the same
    /// path are serialized; the last one wins.
    #[instrument(skip(self, data), fields(path = %path.display(), tier = %tier, bytes = data.len()))]
    pub async fn write(&self, path: &Path, data: Bytes, tier: Tier) -> Result<()> {
        if self.tier_of(path) != Some(tier) {
            exn::bail!(ErrorKind::OutsideTiers(path.to_path_buf()));
        }
        let directory = path.parent().ok_or_raise(|| ErrorKind::OutsideTiers(path.to_path_buf()))?.to_path_buf();
        let codec = match tier {
            Tier::Low => Compression::None,
            Tier::Deep => self.bundle_format,
        };
        let _guard = self.locks.lock(path).await;
        let target = path.to_path_buf();
        spawn_blocking(move || stage_and_replace(&directory, &target, &data, codec))
            .await
            .or_raise(|| ErrorKind::Task)??;
        Ok(())
    }

    /// Build the index entry for an artifact from its location and a stat.
    ///
    /// The url is `download_prefix` followed by the path relative to the
    /// tier root, always `/`-separated. `mtime` is truncated to the second.
    pub async fn describe(&self, path: &Path, download_prefix: &str) -> Result<StorageInfo> {
        let tier = self.tier_of(path).ok_or_raise(|| ErrorKind::OutsideTiers(path.to_path_buf()))?;
        let relative = path
            .strip_prefix(self.root(tier))
            .or_raise(|| ErrorKind::OutsideTiers(path.to_path_buf()))?
            .iter()
            .map(|segment| segment.to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let metadata = fs::metadata(path).await.map_err(|e| ErrorKind::io(e, path))?;
        let modified = UtcDateTime::from(metadata.modified().map_err(ErrorKind::Io)?);
        // Indexes persist whole seconds.
        let mtime = modified.replace_nanosecond(0).unwrap_or(modified);
        Ok(StorageInfo::new(format!("{download_prefix}{relative}"), path, metadata.len(), mtime))
    }

    /// Open a stored artifact for serving.
    ///
    /// Low-tier artifacts are opened directly. Deep-tier artifacts are
    /// decoded into a transient file under the low root; the codec is taken
    /// from the artifact's magic bytes, falling back to the configured
    /// bundle format.
    ///
    /// # Errors
    /// - [`NotFound`](ErrorKind::NotFound) if the artifact is missing
    /// - [`Compression`](ErrorKind::Compression) if decoding fails
    /// - [`OutsideTiers`](ErrorKind::OutsideTiers) if the path is under neither root
    #[instrument(skip(self), fields(path = %storage_path.display()))]
    pub async fn open(&self, storage_path: &Path) -> Result<Opened> {
        match self.tier_of(storage_path) {
            Some(Tier::Low) => {
                let file = fs::File::open(storage_path).await.map_err(|e| ErrorKind::io(e, storage_path))?;
                let metadata = file.metadata().await.map_err(|e| ErrorKind::io(e, storage_path))?;
                if !metadata.is_file() {
                    exn::bail!(ErrorKind::NotFound(storage_path.to_path_buf()));
                }
                Ok(Opened { file, size: metadata.len(), transient: None })
            },
            Some(Tier::Deep) => {
                let staging = self.ensure_root(Tier::Low).await?.to_path_buf();
                let source = storage_path.to_path_buf();
                let fallback = self.bundle_format;
                let (file, size, transient) = spawn_blocking(move || decode_to_transient(&source, &staging, fallback))
                    .await
                    .or_raise(|| ErrorKind::Task)??;
                tracing::debug!(transient = %transient.display(), size, "Decoded deep-tier artifact");
                Ok(Opened {
                    file: fs::File::from_std(file),
                    size,
                    transient: Some(transient),
                })
            },
            None => exn::bail!(ErrorKind::OutsideTiers(storage_path.to_path_buf())),
        }
    }

    pub async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(fs::try_exists(path).await.map_err(|e| ErrorKind::io(e, path))?)
    }

    pub async fn size(&self, path: &Path) -> Result<u64> {
        Ok(fs::metadata(path).await.map_err(|e| ErrorKind::io(e, path))?.len())
    }

    /// Unlink an artifact. Refuses paths outside both tiers.
    #[instrument(skip(self), fields(path = %path.display()))]
    pub async fn remove(&self, path: &Path) -> Result<()> {
        if self.tier_of(path).is_none() {
            exn::bail!(ErrorKind::OutsideTiers(path.to_path_buf()));
        }
        let _guard = self.locks.lock(path).await;
        Ok(fs::remove_file(path).await.map_err(|e| ErrorKind::io(e, path))?)
    }
}

/// Encode (if needed), write into a sibling temp file, fsync, rename.
fn stage_and_replace(directory: &Path, target: &Path, data: &[u8], codec: Compression) -> Result<()> {
    let encoded = match codec.is_compressed() {
        true => Cow::Owned(codec.compress(data).map_err(ErrorKind::compression)?),
        false => Cow::Borrowed(data),
    };
    let mut staged = NamedTempFile::new_in(directory).map_err(|e| ErrorKind::io(e, directory))?;
    staged.write_all(&encoded).map_err(|e| ErrorKind::io(e, target))?;
    staged.as_file().sync_all().map_err(|e| ErrorKind::io(e, target))?;
    staged.persist(target).map_err(|e| ErrorKind::io(e.error, target))?;
    Ok(())
}

/// Decode `source` into a uniquely named hidden file inside `staging`.
fn decode_to_transient(source: &Path, staging: &Path, fallback: Compression) -> Result<(SyncFile, u64, TempPath)> {
    let mut input = SyncFile::open(source).map_err(|e| ErrorKind::io(e, source))?;
    let mut head = Vec::with_capacity(MAGIC_LEN);
    (&mut input).take(MAGIC_LEN as u64).read_to_end(&mut head).map_err(|e| ErrorKind::io(e, source))?;
    let codec = Compression::detect(&head, fallback);

    let segment: String = source
        .file_name()
        .map(|name| name.to_string_lossy().chars().take(TRANSIENT_SEGMENT_CHARS).collect())
        .unwrap_or_default();
    let mut staged = TempBuilder::new()
        .prefix(&format!(".{segment}."))
        .tempfile_in(staging)
        .map_err(|e| ErrorKind::io(e, staging))?;
    let staged_path = staged.path().to_path_buf();
    let size = {
        let mut writer = BufWriter::new(staged.as_file_mut());
        let size = codec.decompress_stream(Cursor::new(head).chain(input), &mut writer).map_err(ErrorKind::compression)?;
        writer.flush().map_err(|e| ErrorKind::io(e, &staged_path))?;
        size
    };
    let file = staged.reopen().map_err(|e| ErrorKind::io(e, &staged_path))?;
    Ok((file, size, staged.into_temp_path()))
}
