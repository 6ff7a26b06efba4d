//! Key/value stores backing the crawl cache.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database, params};
use tokio::sync::RwLock;
use tracing::{debug, info};

use groundwork_shared::{GroundworkError, Result};

use crate::migrations;

/// Minimal string key/value contract.
///
/// A single `set` is atomic for its key: readers see the old value or the
/// new one, never a mix.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

fn storage_err(e: libsql::Error) -> GroundworkError {
    GroundworkError::Storage(e.to_string())
}

// ---------------------------------------------------------------------------
// libSQL
// ---------------------------------------------------------------------------

/// Local libSQL file holding one `kv_entries` table.
pub struct SqliteKv {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
    readonly: bool,
}

impl SqliteKv {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| GroundworkError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        let store = Self {
            db,
            conn,
            readonly: false,
        };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Open an existing database without migrating; writes are rejected.
    pub async fn open_readonly(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GroundworkError::Storage(format!(
                "cache database not found at {}",
                path.display()
            )));
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(storage_err)?;
        let conn = db.connect().map_err(storage_err)?;

        Ok(Self {
            db,
            conn,
            readonly: true,
        })
    }

    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn.execute_batch(migration.sql).await.map_err(|e| {
                    GroundworkError::Storage(format!("migration v{} failed: {e}", migration.version))
                })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 if no migrations have been applied.
    async fn schema_version(&self) -> u32 {
        match self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await
        {
            Ok(mut rows) => match rows.next().await {
                Ok(Some(row)) => row.get::<u32>(0).unwrap_or(0),
                _ => 0,
            },
            Err(_) => 0,
        }
    }

    fn check_writable(&self) -> Result<()> {
        if self.readonly {
            return Err(GroundworkError::Storage(
                "cache database is opened in read-only mode".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for SqliteKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM kv_entries WHERE key = ?1", params![key])
            .await
            .map_err(storage_err)?;

        match rows.next().await.map_err(storage_err)? {
            Some(row) => Ok(Some(row.get::<String>(0).map_err(storage_err)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check_writable()?;
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now.as_str()],
            )
            .await
            .map_err(storage_err)?;
        debug!(key, bytes = value.len(), "stored cache entry");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Process-local store, for tests and cache-less runs.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_db() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("gw_test_{}.db", Uuid::now_v7()))
    }

    #[tokio::test]
    async fn open_and_migrate() {
        let store = SqliteKv::open(&temp_db()).await.expect("open");
        assert_eq!(store.schema_version().await, 1);
    }

    #[tokio::test]
    async fn idempotent_migration() {
        let path = temp_db();
        let first = SqliteKv::open(&path).await.expect("first open");
        drop(first);
        let second = SqliteKv::open(&path).await.expect("second open");
        assert_eq!(second.schema_version().await, 1);
    }

    #[tokio::test]
    async fn get_set_overwrite() {
        let store = SqliteKv::open(&temp_db()).await.unwrap();
        assert_eq!(store.get("helpcenter:articles").await.unwrap(), None);

        store.set("helpcenter:articles", "[1]").await.unwrap();
        store.set("helpcenter:articles", "[1,2]").await.unwrap();
        assert_eq!(
            store.get("helpcenter:articles").await.unwrap().as_deref(),
            Some("[1,2]")
        );
    }

    #[tokio::test]
    async fn values_survive_reopen_and_readonly_rejects_writes() {
        let path = temp_db();
        let rw = SqliteKv::open(&path).await.unwrap();
        rw.set("k", "v").await.unwrap();
        drop(rw);

        let ro = SqliteKv::open_readonly(&path).await.unwrap();
        assert_eq!(ro.get("k").await.unwrap().as_deref(), Some("v"));
        let err = ro.set("k", "w").await.unwrap_err();
        assert!(err.to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn readonly_open_of_missing_file_fails() {
        assert!(SqliteKv::open_readonly(&temp_db()).await.is_err());
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryKv::new();
        assert!(store.get("a").await.unwrap().is_none());
        store.set("a", "1").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
    }
}
