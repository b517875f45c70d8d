use crate::error::{Error, ErrorKind};
use exn::{OptionExt, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strata_storage::StorageInfo;
use time::UtcDateTime;

/// Persisted shape of a [`StorageInfo`], shared by both backends (one JSON
/// line in the flat file, one row in SQLite).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub(crate) struct Record {
    pub url: String,
    pub storage_path: String,
    pub fsize: i64,
    pub mtime: i64,
}
impl TryFrom<&StorageInfo> for Record {
    type Error = Error;
    fn try_from(info: &StorageInfo) -> Result<Self, Self::Error> {
        Ok(Self {
            url: info.url.clone(),
            storage_path: info.storage_path.to_str().ok_or_raise(|| ErrorKind::InvalidData("path"))?.to_string(),
            fsize: i64::try_from(info.fsize).or_raise(|| ErrorKind::InvalidData("file size"))?,
            mtime: info.mtime.unix_timestamp(),
        })
    }
}
impl TryFrom<Record> for StorageInfo {
    type Error = Error;
    fn try_from(record: Record) -> Result<Self, Self::Error> {
        Ok(StorageInfo::new(
            record.url,
            PathBuf::from(record.storage_path),
            u64::try_from(record.fsize).or_raise(|| ErrorKind::InvalidData("file size"))?,
            UtcDateTime::from_unix_timestamp(record.mtime).or_raise(|| ErrorKind::InvalidData("modification time"))?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_to_model() {
        let mtime = UtcDateTime::now();
        let record = Record {
            url: "/download/a.txt".to_string(),
            storage_path: "/srv/deep_storage/a.txt".to_string(),
            fsize: 31,
            mtime: mtime.unix_timestamp(),
        };
        let model = StorageInfo::try_from(record).unwrap();
        assert_eq!(model.storage_path, PathBuf::from("/srv/deep_storage/a.txt"));
        // Unix timestamps are whole seconds.
        assert_eq!(model.mtime, mtime.replace_nanosecond(0).unwrap());
    }

    #[test]
    fn test_negative_size_is_rejected() {
        let record = Record {
            url: "/download/a.txt".to_string(),
            storage_path: "/srv/low_storage/a.txt".to_string(),
            fsize: -1,
            mtime: 0,
        };
        let err = StorageInfo::try_from(record).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("file size")));
    }

    #[test]
    fn test_json_shape() {
        let info = StorageInfo::new(
            "/download/a.txt",
            "/srv/low_storage/a.txt",
            11,
            UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
        );
        let line = serde_json::to_string(&Record::try_from(&info).unwrap()).unwrap();
        assert_eq!(
            line,
            r#"{"url":"/download/a.txt","storage_path":"/srv/low_storage/a.txt","fsize":11,"mtime":1700000000}"#
        );
    }
}
