//! Persistence.
//!
//! - [`kv`]: the [`KvStore`](kv::KvStore) seam and stable keys
//! - [`memory`], [`file`], [`sqlite`]: backends
//! - [`history`]: the durable history store (history, settings, mute registry, metadata)
//! - [`settings`]: persisted record types

pub mod file;
pub mod history;
pub mod kv;
pub mod memory;
pub mod settings;
#[cfg(feature = "sqlite")]
pub mod sqlite;
