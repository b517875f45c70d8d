//! Storage models.

use crate::error::{Error, ErrorKind};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::str::FromStr;
use time::UtcDateTime;

/// Which storage root a file lives under.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Uncompressed, served directly.
    Low,
    /// Encoded with the bundle format, decoded on every read.
    Deep,
}
impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Low => "low",
            Tier::Deep => "deep",
        }
    }
}
impl Display for Tier {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
impl FromStr for Tier {
    type Err = Error;

    /// Parses the `StorageType` header value. Matching is exact: `Low` or
    /// ` deep` are rejected just like any other unknown value.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Tier::Low),
            "deep" => Ok(Tier::Deep),
            other => exn::bail!(ErrorKind::InvalidTier(other.to_string())),
        }
    }
}

/// Metadata for one stored file, keyed by its `url`.
///
/// `fsize` and `mtime` describe the artifact as it sits on disk, so for the
/// deep tier `fsize` is the encoded size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageInfo {
    /// External identifier (download prefix + path relative to the tier root)
    pub url: String,
    /// Where the artifact lives; always under one of the tier roots
    pub storage_path: PathBuf,
    /// Size of the artifact in bytes
    pub fsize: u64,
    /// Last modification time of the artifact when it was indexed
    pub mtime: UtcDateTime,
}
impl StorageInfo {
    pub fn new(url: impl Into<String>, storage_path: impl Into<PathBuf>, fsize: u64, mtime: UtcDateTime) -> Self {
        Self {
            url: url.into(),
            storage_path: storage_path.into(),
            fsize,
            mtime,
        }
    }

    /// Final segment of the storage path.
    pub fn filename(&self) -> String {
        self.storage_path.file_name().map(|name| name.to_string_lossy().into_owned()).unwrap_or_default()
    }

    /// Entity tag in the form `filename-fsize-mtime`, `mtime` being whole
    /// seconds since the Unix epoch.
    ///
    /// ```
    /// use strata_storage::StorageInfo;
    /// use time::UtcDateTime;
    ///
    /// let mtime = UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap();
    /// let info = StorageInfo::new("/download/a.txt", "/srv/low/a.txt", 11, mtime);
    /// assert_eq!(info.etag(), "a.txt-11-1700000000");
    /// ```
    pub fn etag(&self) -> String {
        format!("{}-{}-{}", self.filename(), self.fsize, self.mtime.unix_timestamp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn info(path: &str, fsize: u64, mtime: i64) -> StorageInfo {
        StorageInfo::new("/download/x", path, fsize, UtcDateTime::from_unix_timestamp(mtime).unwrap())
    }

    #[rstest]
    #[case("low", Tier::Low)]
    #[case("deep", Tier::Deep)]
    fn tier_parses(#[case] value: &str, #[case] expected: Tier) {
        assert_eq!(value.parse::<Tier>().unwrap(), expected);
        assert_eq!(expected.to_string(), value);
    }

    #[rstest]
    #[case("")]
    #[case("LOW")]
    #[case("medium")]
    #[case(" deep")]
    fn tier_rejects_unknown(#[case] value: &str) {
        let err = value.parse::<Tier>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidTier(v) if v == value));
    }

    #[test]
    fn etag_is_deterministic() {
        assert_eq!(info("/low/a.txt", 11, 100).etag(), info("/low/a.txt", 11, 100).etag());
        // The url is not part of the tag.
        let mut other = info("/low/a.txt", 11, 100);
        other.url = "/download/elsewhere".to_string();
        assert_eq!(other.etag(), "a.txt-11-100");
    }

    #[rstest]
    #[case(info("/low/b.txt", 11, 100))]
    #[case(info("/low/a.txt", 12, 100))]
    #[case(info("/low/a.txt", 11, 101))]
    fn etag_changes_with_any_field(#[case] changed: StorageInfo) {
        assert_ne!(info("/low/a.txt", 11, 100).etag(), changed.etag());
    }

    #[test]
    fn etag_ignores_subsecond_precision() {
        let base = info("/low/a.txt", 1, 100);
        let mut nanos = base.clone();
        nanos.mtime = nanos.mtime.replace_nanosecond(500).unwrap();
        assert_eq!(base.etag(), nanos.etag());
    }
}
