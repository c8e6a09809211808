//! Key-value storage abstraction.
//!
//! Both the durable store (settings, mute registry, history, metadata) and
//! the ephemeral session store (checkpoints) sit behind [`KvStore`].

use crate::base::monitorerror::MonitorError;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

/// Alias for the `Future` returned by storage operations.
pub type StoreFuture<'a, T> = BoxFuture<'a, Result<T, MonitorError>>;

/// Async get/set over JSON values.
///
/// Implementations must be thread-safe. A write replaces the whole value
/// stored under a key.
pub trait KvStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Value>>;

    fn set<'a>(&'a self, key: &'a str, value: Value) -> StoreFuture<'a, ()>;

    fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;
}

/// Blanket implementation for Arc-wrapped stores.
impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<Value>> {
        (**self).get(key)
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> StoreFuture<'a, ()> {
        (**self).set(key, value)
    }

    fn remove<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        (**self).remove(key)
    }
}

/// Stable storage keys.
pub mod keys {
    pub const SETTINGS: &str = "cw_settings";
    pub const MUTED_DOMAINS: &str = "cw_muted_domains";
    pub const HISTORY: &str = "cw_history";
    pub const METADATA: &str = "cw_metadata";
    pub const SESSION_STATE: &str = "cw_session_state";
    pub const PENDING_QUEUE: &str = "cw_pending_queue";
}
