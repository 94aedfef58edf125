//! SQLite key-value store for the shared app-group container
//!
//! Both processes open the same file. WAL mode lets the keyboard extension
//! read while the host app writes, and a busy timeout turns brief cross-process
//! write contention into a short wait instead of an error.

use crate::interface::{PersistenceAdapter, StorageError};
use chrono::Utc;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// How long a connection waits on a lock held by the other process
const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Thread-safe key-value table using connection pooling
pub struct SqliteStore {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteStore {
    /// Open or create the store at the given path with connection pooling
    pub fn open<P: AsRef<Path>>(path: P) -> DatabaseResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let manager = SqliteConnectionManager::file(path)
            .with_init(|conn| {
                conn.busy_timeout(BUSY_TIMEOUT)?;
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get::<_, String>(0)
                })?;
                conn.execute_batch("PRAGMA synchronous=NORMAL;")?;
                Ok(())
            });

        let pool = Pool::builder()
            .max_size(4)
            .build(manager)?;

        let store = Self { pool };
        store.setup_schema()?;
        Ok(store)
    }

    /// Open an in-memory store (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> DatabaseResult<Self> {
        let manager = SqliteConnectionManager::memory();

        // In-memory needs single connection to maintain state
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)?;

        let store = Self { pool };
        store.setup_schema()?;
        Ok(store)
    }

    /// Get a connection from the pool
    fn get_conn(&self) -> DatabaseResult<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn setup_schema(&self) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute_batch(r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value BLOB NOT NULL,
                updatedAt TEXT NOT NULL
            );
        "#)?;
        Ok(())
    }

    pub fn read(&self, key: &str) -> DatabaseResult<Option<Vec<u8>>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn write(&self, key: &str, value: &[u8]) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        let now = Utc::now().format("%Y-%m-%d %H:%M:%S%.f").to_string();
        conn.execute(
            "INSERT INTO kv (key, value, updatedAt) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updatedAt = excluded.updatedAt",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> DatabaseResult<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }

    /// Number of stored keys
    pub fn count_keys(&self) -> DatabaseResult<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM kv", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

impl PersistenceAdapter for SqliteStore {
    fn get(&self, key: String) -> Result<Option<Vec<u8>>, StorageError> {
        self.read(&key).map_err(|e| {
            warn!(error = %e, key = %key, "SQLite read failed");
            StorageError::ReadFailed { reason: e.to_string() }
        })
    }

    fn set(&self, key: String, value: Vec<u8>) -> Result<(), StorageError> {
        self.write(&key, &value)
            .map_err(|e| StorageError::WriteFailed { reason: e.to_string() })
    }

    fn remove(&self, key: String) -> Result<(), StorageError> {
        self.delete(&key)
            .map_err(|e| StorageError::WriteFailed { reason: e.to_string() })
    }
}

/// Open the SQLite store inside the shared container
#[uniffi::export]
pub fn open_shared_store(path: String) -> Result<Arc<dyn PersistenceAdapter>, crate::ClipshelfError> {
    Ok(Arc::new(SqliteStore::open(&path)?))
}
