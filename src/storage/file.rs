//! JSON-file persistence.
//!
//! The whole key space is one JSON object on disk. Writes go to a
//! sibling temp file that is then renamed over the original.

use super::kv::{KvStore, StoreFuture};
use crate::base::context::StorageResultExt;
use crate::base::monitorerror::MonitorError;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Durable store backed by a single JSON document.
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the file.
    lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// # Example
    /// ```ignore
    /// let store = JsonFileStore::open("/path/to/cookiewatch.json").await?;
    /// ```
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, MonitorError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(MonitorError::storage_init)?;
            }
        }
        let store = Self {
            path,
            lock: Mutex::new(()),
        };
        // Fail at startup, not on the first event, if the file is corrupt.
        store.load().await.map_err(MonitorError::storage_init)?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Map<String, Value>, MonitorError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(json) if json.trim().is_empty() => Ok(Map::new()),
            Ok(json) => serde_json::from_str(&json).storage_context(&self.path.display().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(MonitorError::storage(self.path.display().to_string(), e)),
        }
    }

    async fn save(&self, doc: &Map<String, Value>) -> Result<(), MonitorError> {
        let label = self.path.display().to_string();
        let json = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await.storage_context(&label)?;
        tokio::fs::rename(&tmp, &self.path).await.storage_context(&label)
    }
}

impl KvStore for JsonFileStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Value>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut doc = self.load().await?;
            Ok(doc.remove(key))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut doc = self.load().await?;
            doc.insert(key.to_string(), value);
            self.save(&doc).await
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut doc = self.load().await?;
            if doc.remove(key).is_some() {
                self.save(&doc).await?;
            }
            Ok(())
        })
    }
}
