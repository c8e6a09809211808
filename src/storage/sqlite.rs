//! SQLite-backed durable store.
//!
//! One table, `kv(key TEXT PRIMARY KEY, value TEXT NOT NULL)`, holding
//! JSON text. Queries run on the blocking pool.

use super::kv::{KvStore, StoreFuture};
use crate::base::monitorerror::MonitorError;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        let conn = Connection::open(path).map_err(MonitorError::storage_init)?;
        Self::with_connection(conn)
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> Result<Self, MonitorError> {
        let conn = Connection::open_in_memory().map_err(MonitorError::storage_init)?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, MonitorError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                 key   TEXT PRIMARY KEY NOT NULL,
                 value TEXT NOT NULL
             );",
        )
        .map_err(MonitorError::storage_init)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, key: &str, op: F) -> Result<T, MonitorError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, MonitorError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let label = key.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| MonitorError::storage(&label, "connection mutex poisoned"))?;
            op(&*conn)
        })
        .await
        .map_err(|e| MonitorError::storage(key, e))?
    }
}

impl KvStore for SqliteStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Value>> {
        Box::pin(async move {
            let owned = key.to_string();
            let text: Option<String> = self
                .run(key, move |conn| {
                    Ok(conn
                        .query_row("SELECT value FROM kv WHERE key = ?1", params![owned], |row| row.get(0))
                        .optional()?)
                })
                .await?;

            match text {
                Some(text) => Ok(Some(serde_json::from_str(&text)?)),
                None => Ok(None),
            }
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let owned = key.to_string();
            let text = serde_json::to_string(&value)?;
            self.run(key, move |conn| {
                conn.execute(
                    "INSERT INTO kv (key, value) VALUES (?1, ?2)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                    params![owned, text],
                )?;
                Ok(())
            })
            .await
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let owned = key.to_string();
            self.run(key, move |conn| {
                conn.execute("DELETE FROM kv WHERE key = ?1", params![owned])?;
                Ok(())
            })
            .await
        })
    }
}
