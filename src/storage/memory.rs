//! In-memory key-value store.

use super::kv::{KvStore, StoreFuture};
use crate::base::monitorerror::MonitorError;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-lifetime store backed by a `DashMap`.
///
/// Serves as the ephemeral session store. `set_failing(true)` makes every
/// operation fail, for exercising transient-failure paths.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, Value>>,
    failing: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self, key: &str) -> Result<(), MonitorError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(MonitorError::storage(key, "store unavailable"));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Value>> {
        Box::pin(async move {
            self.check(key)?;
            Ok(self.entries.get(key).map(|v| v.value().clone()))
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check(key)?;
            self.entries.insert(key.to_string(), value);
            Ok(())
        })
    }

    fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check(key)?;
            self.entries.remove(key);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_remove() {
        let store = MemoryStore::new();
        store.set("k", json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 1})));

        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_failing() {
        let store = MemoryStore::new();
        store.set_failing(true);
        assert!(matches!(
            store.get("k").await,
            Err(MonitorError::Storage { .. })
        ));
        store.set_failing(false);
        assert!(store.get("k").await.unwrap().is_none());
    }
}
