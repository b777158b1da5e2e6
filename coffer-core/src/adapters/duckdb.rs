//! DuckDB key-value store
//!
//! Documents live in the `sys_kv` table as JSON. Connection calls are
//! blocking, so every store operation hops onto the blocking pool.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use duckdb::{params, Connection, OptionalExt};
use serde_json::Value as JsonValue;

use crate::domain::result::{Error, Result};
use crate::migrations::MIGRATIONS;
use crate::ports::KeyValueStore;
use crate::services::MigrationService;

/// Maximum number of attempts when the database file is locked
const MAX_OPEN_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock")
}

fn storage_err(e: impl std::fmt::Display) -> Error {
    Error::storage(e.to_string())
}

pub struct DuckDbStore {
    conn: Arc<Mutex<Connection>>,
    db_path: Option<PathBuf>,
}

impl DuckDbStore {
    /// Open (or create) the database file and bring its schema up to date
    ///
    /// Locked files are retried with exponential backoff.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut attempt = 0;
        let conn = loop {
            match Self::try_open_connection(db_path) {
                Ok(conn) => break conn,
                Err(e) => {
                    let msg = e.to_string();
                    attempt += 1;
                    if !is_retryable_error(&msg) || attempt >= MAX_OPEN_RETRIES {
                        return Err(storage_err(e));
                    }
                    let delay = Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt - 1));
                    tracing::warn!(
                        attempt,
                        max = MAX_OPEN_RETRIES,
                        delay_ms = delay.as_millis() as u64,
                        error = %msg,
                        "database busy, retrying"
                    );
                    thread::sleep(delay);
                }
            }
        };

        Self::with_connection(conn, Some(db_path.to_path_buf()))
    }

    /// Volatile database, mostly for tests
    pub fn open_in_memory() -> Result<Self> {
        let config = duckdb::Config::default()
            .enable_autoload_extension(false)
            .map_err(storage_err)?;
        let conn = Connection::open_in_memory_with_flags(config).map_err(storage_err)?;
        Self::with_connection(conn, None)
    }

    fn try_open_connection(db_path: &Path) -> std::result::Result<Connection, duckdb::Error> {
        // Cached extensions may be signed differently; the JSON extension is
        // linked statically so nothing needs autoloading.
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Connection::open_with_flags(db_path, config)
    }

    fn with_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        let result = MigrationService::new(&conn, MIGRATIONS)
            .run_pending()
            .map_err(storage_err)?;
        if !result.applied.is_empty() {
            tracing::debug!(applied = ?result.applied, "store schema migrated");
        }
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            db_path,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Run `f` against the connection on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> std::result::Result<T, duckdb::Error> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| Error::storage(format!("lock poisoned: {e}")))?;
            f(&conn).map_err(storage_err)
        })
        .await
        .map_err(storage_err)?
    }
}

#[async_trait]
impl KeyValueStore for DuckDbStore {
    async fn save(&self, key: &str, value: JsonValue) -> Result<()> {
        let key = key.to_string();
        let json = serde_json::to_string(&value)?;
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO sys_kv (key, value, updated_at)
                 VALUES (?, ?::JSON, CURRENT_TIMESTAMP)
                 ON CONFLICT (key) DO UPDATE SET
                    value = EXCLUDED.value,
                    updated_at = EXCLUDED.updated_at",
                params![key, json],
            )
            .map(|_| ())
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<JsonValue>> {
        let key = key.to_string();
        let raw = self
            .blocking(move |conn| {
                conn.query_row(
                    "SELECT CAST(value AS VARCHAR) FROM sys_kv WHERE key = ?",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()
            })
            .await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.blocking(move |conn| {
            conn.execute("DELETE FROM sys_kv WHERE key = ?", params![key])
                .map(|_| ())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_retryable_errors() {
        assert!(is_retryable_error("IO Error: Database is locked"));
        assert!(is_retryable_error(
            "The process cannot access the file because it is being used by another process"
        ));
        assert!(is_retryable_error(
            "IO Error: Could not set lock on file \"coffer.duckdb\": Conflicting lock is held"
        ));
        assert!(!is_retryable_error("Catalog Error: Table does not exist"));
    }

    #[tokio::test]
    async fn test_upsert_and_remove() {
        let store = DuckDbStore::open_in_memory().unwrap();
        assert_eq!(store.get("banking_accounts").await.unwrap(), None);

        store.save("banking_accounts", json!([1, 2])).await.unwrap();
        store
            .save("banking_accounts", json!([{"name": "Main"}]))
            .await
            .unwrap();
        assert_eq!(
            store.get("banking_accounts").await.unwrap(),
            Some(json!([{"name": "Main"}]))
        );

        store.remove("banking_accounts").await.unwrap();
        store.remove("banking_accounts").await.unwrap();
        assert_eq!(store.get("banking_accounts").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("coffer.duckdb");
        {
            let store = DuckDbStore::open(&path).unwrap();
            store
                .save("banking_pin_hash", json!("abc"))
                .await
                .unwrap();
        }
        let store = DuckDbStore::open(&path).unwrap();
        assert_eq!(store.db_path(), Some(path.as_path()));
        assert_eq!(
            store.get("banking_pin_hash").await.unwrap(),
            Some(json!("abc"))
        );
    }
}
