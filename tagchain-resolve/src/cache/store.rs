//! Embedded SQLite store backing the persistent caches
//!
//! One database file, one table per [`Namespace`]. Rows hold the JSON value
//! (NULL for a cached absence) and the time the row was written. A
//! `schema_version` table marks the layout for future migrations.
//!
//! The pool is limited to a single connection so every read and write
//! through one `CacheStore` is serialized. Multiple processes writing the
//! same file are not supported.

use super::Namespace;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tagchain_common::{Error, Result};
use tracing::info;

/// Current on-disk layout version
pub const SCHEMA_VERSION: i64 = 1;

/// Handle to the persistent cache database
#[derive(Clone)]
pub struct CacheStore {
    pool: SqlitePool,
    path: PathBuf,
}

impl CacheStore {
    /// Open (creating if needed) the store at `path`
    pub async fn open(path: &Path) -> Result<Self> {
        let newly_created = !path.exists();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        if newly_created {
            info!("Initialized new cache store: {}", path.display());
        } else {
            info!("Opened existing cache store: {}", path.display());
        }

        let store = Self {
            pool,
            path: path.to_path_buf(),
        };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        let found: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&self.pool)
            .await?;

        if let Some(version) = found {
            if version > SCHEMA_VERSION {
                return Err(Error::Config(format!(
                    "Cache store {} has schema version {}, this build supports up to {}",
                    self.path.display(),
                    version,
                    SCHEMA_VERSION
                )));
            }
        }

        for namespace in Namespace::ALL {
            let sql = format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    cache_key TEXT PRIMARY KEY,
                    value TEXT,
                    created_at TEXT NOT NULL
                )
                "#,
                namespace.table()
            );
            sqlx::query(&sql).execute(&self.pool).await?;
        }

        sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
            .bind(SCHEMA_VERSION)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Stored schema version
    pub async fn schema_version(&self) -> Result<i64> {
        let version: Option<i64> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_one(&self.pool)
            .await?;
        version.ok_or_else(|| Error::Internal("schema_version table is empty".to_string()))
    }

    /// `None` if no row, `Some(None)` for a stored absence
    pub async fn fetch(&self, namespace: Namespace, key: &str) -> Result<Option<Option<String>>> {
        let sql = format!("SELECT value FROM {} WHERE cache_key = ?", namespace.table());
        let row: Option<(Option<String>,)> = sqlx::query_as(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(value,)| value))
    }

    /// Insert one row, or replace the value of an existing row keeping its
    /// `created_at`
    pub async fn upsert(&self, namespace: Namespace, key: &str, value: Option<&str>) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (cache_key, value, created_at) VALUES (?, ?, ?) \
             ON CONFLICT(cache_key) DO UPDATE SET value = excluded.value",
            namespace.table()
        );
        sqlx::query(&sql)
            .bind(key)
            .bind(value)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn remove(&self, namespace: Namespace, key: &str) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE cache_key = ?", namespace.table());
        let result = sqlx::query(&sql).bind(key).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn clear_namespace(&self, namespace: Namespace) -> Result<()> {
        let sql = format!("DELETE FROM {}", namespace.table());
        let result = sqlx::query(&sql).execute(&self.pool).await?;
        info!(
            namespace = %namespace,
            rows = result.rows_affected(),
            "Cleared cache namespace"
        );
        Ok(())
    }

    pub async fn clear_all(&self) -> Result<()> {
        for namespace in Namespace::ALL {
            self.clear_namespace(namespace).await?;
        }
        Ok(())
    }

    pub async fn count(&self, namespace: Namespace) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", namespace.table());
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;
        Ok(count as usize)
    }

    /// Database size in bytes (page_count * page_size)
    pub async fn size_bytes(&self) -> Result<u64> {
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await?;
        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await?;
        Ok((page_count.max(0) as u64) * (page_size.max(0) as u64))
    }

    /// Close the pool, flushing the WAL
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_schema() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open(&dir.path().join("nested/cache.db")).await.unwrap();

        assert_eq!(store.schema_version().await.unwrap(), SCHEMA_VERSION);
        for namespace in Namespace::ALL {
            assert_eq!(store.count(namespace).await.unwrap(), 0);
        }
        assert!(store.size_bytes().await.unwrap() > 0);
    }

    #[tokio::test]
    async fn test_upsert_replaces_row() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open(&dir.path().join("cache.db")).await.unwrap();

        store.upsert(Namespace::Metadata, "k", Some("1")).await.unwrap();
        store.upsert(Namespace::Metadata, "k", Some("2")).await.unwrap();

        assert_eq!(store.count(Namespace::Metadata).await.unwrap(), 1);
        assert_eq!(
            store.fetch(Namespace::Metadata, "k").await.unwrap(),
            Some(Some("2".to_string()))
        );
    }

    async fn lyrics_created_at(store: &CacheStore, key: &str) -> String {
        sqlx::query_scalar("SELECT created_at FROM lyrics_cache WHERE cache_key = ?")
            .bind(key)
            .fetch_one(&store.pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_upsert_keeps_created_at() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open(&dir.path().join("cache.db")).await.unwrap();

        store.upsert(Namespace::Lyrics, "a|b", None).await.unwrap();
        let first = lyrics_created_at(&store, "a|b").await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        store.upsert(Namespace::Lyrics, "a|b", Some("\"text\"")).await.unwrap();

        assert_eq!(lyrics_created_at(&store, "a|b").await, first);
        assert_eq!(
            store.fetch(Namespace::Lyrics, "a|b").await.unwrap(),
            Some(Some("\"text\"".to_string()))
        );
    }

    #[tokio::test]
    async fn test_null_value_is_stored_absence() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open(&dir.path().join("cache.db")).await.unwrap();

        store.upsert(Namespace::Lyrics, "a|b", None).await.unwrap();
        assert_eq!(store.fetch(Namespace::Lyrics, "a|b").await.unwrap(), Some(None));
        assert_eq!(store.fetch(Namespace::Lyrics, "a|c").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_namespaces_are_independent() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::open(&dir.path().join("cache.db")).await.unwrap();

        store.upsert(Namespace::Metadata, "k", Some("m")).await.unwrap();
        store.upsert(Namespace::Lyrics, "k", Some("l")).await.unwrap();
        store.clear_namespace(Namespace::Metadata).await.unwrap();

        assert_eq!(store.count(Namespace::Metadata).await.unwrap(), 0);
        assert_eq!(store.count(Namespace::Lyrics).await.unwrap(), 1);

        store.clear_all().await.unwrap();
        assert_eq!(store.count(Namespace::Lyrics).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_newer_schema_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.db");
        let store = CacheStore::open(&path).await.unwrap();
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(SCHEMA_VERSION + 1)
            .execute(&store.pool)
            .await
            .unwrap();
        store.close().await;

        let result = CacheStore::open(&path).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
