//! Embedded SQLite index.

use crate::MetadataStore;
use crate::error::{ErrorKind, Result};
use crate::models::Record;
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::time::Duration;
use strata_storage::StorageInfo;
use tracing::instrument;

/// Embedded migrations that are run automatically on connect.
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Index stored in an SQLite database.
///
/// The pool holds a single connection, so every operation is serialized
/// the same way the flat-file index serializes them behind its lock.
/// Insertion order is the table's rowid order; an upsert keeps the rowid of
/// the entry it overwrites.
#[derive(Debug, Clone)]
pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    async fn new(options: SqliteConnectOptions) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let index = Self { pool };
        index.migrate().await?;
        Ok(index)
    }

    /// Open (or create) the database at `path`, creating its parent directory
    /// if needed.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Persist(path.to_path_buf()))?;
        }
        let options = Self::base_options()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        Self::new(options).await
    }

    /// Connect to an in-memory database, destroyed when the pool closes.
    pub async fn connect_in_memory() -> Result<Self> {
        Self::new(Self::base_options().filename(":memory:")).await
    }

    fn base_options() -> SqliteConnectOptions {
        SqliteConnectOptions::new()
            // Entries must be durable before `insert` returns.
            .synchronous(SqliteSynchronous::Full)
            .busy_timeout(Duration::from_millis(1500))
    }

    #[instrument("performing index migrations", skip(self))]
    async fn migrate(&self) -> Result<()> {
        MIGRATOR.run(&self.pool).await.or_raise(|| ErrorKind::Migration)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl MetadataStore for SqliteIndex {
    #[instrument(skip_all, fields(url = %info.url))]
    async fn insert(&self, info: StorageInfo) -> Result<()> {
        let record = Record::try_from(&info)?;
        sqlx::query(include_str!("../queries/upsert.sql"))
            .bind(record.url)
            .bind(record.storage_path)
            .bind(record.fsize)
            .bind(record.mtime)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<StorageInfo>> {
        let rows: Vec<Record> = sqlx::query_as(include_str!("../queries/get_all.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(StorageInfo::try_from).collect()
    }

    async fn get_one_by_url(&self, url: &str) -> Result<Option<StorageInfo>> {
        let row: Option<Record> = sqlx::query_as(include_str!("../queries/get_one_by_url.sql"))
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(StorageInfo::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn delete_by_url(&self, url: &str) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/delete_by_url.sql"))
            .bind(url)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::UtcDateTime;

    fn info(name: &str, fsize: u64) -> StorageInfo {
        StorageInfo::new(
            format!("/download/{name}"),
            format!("/srv/deep_storage/{name}"),
            fsize,
            UtcDateTime::from_unix_timestamp(1_700_000_000).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let index = SqliteIndex::connect_in_memory().await.unwrap();
        index.migrate().await.unwrap();
        assert!(index.get_all().await.unwrap().is_empty());
        index.close().await;
    }

    #[tokio::test]
    async fn test_upsert_keeps_insertion_order() {
        let index = SqliteIndex::connect_in_memory().await.unwrap();
        index.insert(info("b.txt", 1)).await.unwrap();
        index.insert(info("a.txt", 2)).await.unwrap();
        index.insert(info("b.txt", 30)).await.unwrap();

        let all = index.get_all().await.unwrap();
        let urls = all.iter().map(|info| info.url.as_str()).collect::<Vec<_>>();
        assert_eq!(urls, ["/download/b.txt", "/download/a.txt"]);
        assert_eq!(all[0].fsize, 30);
    }

    #[tokio::test]
    async fn test_lookup_and_delete() {
        let index = SqliteIndex::connect_in_memory().await.unwrap();
        index.insert(info("a.txt", 11)).await.unwrap();
        assert_eq!(index.get_one_by_url("/download/a.txt").await.unwrap(), Some(info("a.txt", 11)));
        assert_eq!(index.get_one_by_url("/download/nope").await.unwrap(), None);

        assert!(index.delete_by_url("/download/a.txt").await.unwrap());
        assert!(!index.delete_by_url("/download/a.txt").await.unwrap());
        assert!(index.get_one_by_url("/download/a.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_database_survives_reconnect() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("index/storage.db");
        let index = SqliteIndex::connect(&path).await.unwrap();
        index.insert(info("a.txt", 11)).await.unwrap();
        index.close().await;

        let reopened = SqliteIndex::connect(&path).await.unwrap();
        assert_eq!(reopened.get_all().await.unwrap(), vec![info("a.txt", 11)]);
        reopened.close().await;
    }
}
