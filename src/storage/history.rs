//! Durable history store.
//!
//! Owns every durable record: settings, the muted-domain registry, the
//! bounded event history and its metadata. Events are queued in memory
//! and appended in batches by [`HistoryStore::flush`]; when the history
//! grows past the prune threshold only the most recent events are kept.
//!
//! All history and metadata writes (flush, prune, clear) run under one
//! lock, so at most one read-modify-write of the history blob is in
//! flight at a time and the prune bookkeeping lands with the prune.
//! Settings and the mute registry share a second lock for their
//! read-merge-write updates.

use super::kv::{keys, KvStore};
use super::settings::{Metadata, MutedDomainEntry, Settings, SettingsPatch, STORAGE_VERSION};
use crate::base::clock::{format_rfc3339, Clock};
use crate::base::context::{DegradeExt, StorageResultExt};
use crate::base::monitorerror::MonitorError;
use crate::cookies::event::CookieEvent;
use crate::LOG_TARGET;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Muted domains keyed by registrable domain.
pub type MutedDomains = BTreeMap<String, MutedDomainEntry>;

/// Disclaimer attached to exports that carry cookie values.
pub const DISCLAIMER_WITH_VALUES: &str = "WARNING: This export includes cookie values. Handle with care.";

/// Disclaimer attached to redacted exports.
pub const DISCLAIMER_REDACTED: &str = "Cookie values have been redacted for privacy.";

/// History size bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Events kept after a prune.
    pub max_retained: usize,
    /// History length above which a prune runs.
    pub prune_threshold: usize,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_retained: 5000,
            prune_threshold: 5500,
        }
    }
}

/// Settings as exported: everything except the developer-mode switch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedSettings {
    pub incognito_enabled: bool,
    pub notifications_enabled: bool,
    pub auto_mute_big_tech: bool,
    pub theme: String,
}

impl From<&Settings> for ExportedSettings {
    fn from(s: &Settings) -> Self {
        Self {
            incognito_enabled: s.incognito_enabled,
            notifications_enabled: s.notifications_enabled,
            auto_mute_big_tech: s.auto_mute_big_tech,
            theme: s.theme.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: String,
    pub export_date: String,
    pub metadata: Metadata,
    pub settings: ExportedSettings,
    pub muted_domains: MutedDomains,
    pub history: Vec<CookieEvent>,
    pub includes_values: bool,
    pub disclaimer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    /// Size of the serialized history.
    pub bytes_in_use: usize,
    pub retained_events: usize,
    pub total_events: u64,
    /// RFC 3339 time of the last prune, or `never`.
    pub last_prune: String,
}

/// Keep the `keep` most recent events; returns how many were discarded.
pub fn prune_history(events: &mut Vec<CookieEvent>, keep: usize) -> usize {
    if events.len() <= keep {
        return 0;
    }
    events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let discarded = events.len() - keep;
    events.truncate(keep);
    discarded
}

pub struct HistoryStore {
    store: Arc<dyn KvStore>,
    clock: Arc<dyn Clock>,
    retention: RetentionPolicy,
    pending: Mutex<Vec<CookieEvent>>,
    write_lock: Mutex<()>,
    records_lock: Mutex<()>,
    initialized: AtomicBool,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KvStore>, clock: Arc<dyn Clock>, retention: RetentionPolicy) -> Self {
        Self {
            store,
            clock,
            retention,
            pending: Mutex::new(Vec::new()),
            write_lock: Mutex::new(()),
            records_lock: Mutex::new(()),
            initialized: AtomicBool::new(false),
        }
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Create any missing records. Existing records are left untouched.
    ///
    /// Any failure here is fatal: nothing else can run without durable
    /// storage.
    pub async fn init(&self) -> Result<(), MonitorError> {
        if self.initialized.load(Ordering::SeqCst) {
            return Ok(());
        }

        self.ensure(keys::SETTINGS, &Settings::default()).await?;
        self.ensure(keys::MUTED_DOMAINS, &MutedDomains::new()).await?;
        self.ensure(keys::HISTORY, &Vec::<CookieEvent>::new()).await?;
        self.ensure(keys::METADATA, &Metadata::default()).await?;

        self.initialized.store(true, Ordering::SeqCst);
        tracing::debug!(target: LOG_TARGET, "durable store initialized");
        Ok(())
    }

    async fn ensure<T: Serialize>(&self, key: &str, default: &T) -> Result<(), MonitorError> {
        let existing = self.store.get(key).await.map_err(MonitorError::storage_init)?;
        if existing.is_none() {
            let value = serde_json::to_value(default).map_err(MonitorError::storage_init)?;
            self.store.set(key, value).await.map_err(MonitorError::storage_init)?;
        }
        Ok(())
    }

    async fn read<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T, MonitorError> {
        match self.store.get(key).await? {
            Some(value) => serde_json::from_value(value).storage_context(key),
            None => Ok(T::default()),
        }
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> Result<(), MonitorError> {
        let value = serde_json::to_value(value).storage_context(key)?;
        self.store.set(key, value).await
    }

    // ---- pending queue ----

    /// Queue an event for the next flush. Never writes synchronously.
    pub async fn enqueue(&self, event: CookieEvent) {
        self.pending.lock().await.push(event);
    }

    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Copy of the un-flushed queue, for checkpointing.
    pub async fn pending_snapshot(&self) -> Vec<CookieEvent> {
        self.pending.lock().await.clone()
    }

    /// Put previously checkpointed events back at the head of the queue.
    pub async fn restore_pending(&self, mut events: Vec<CookieEvent>) {
        if events.is_empty() {
            return;
        }
        let mut pending = self.pending.lock().await;
        events.append(&mut pending);
        *pending = events;
    }

    /// Drain the queue into durable history.
    ///
    /// Returns the number of events written. When the history write fails
    /// the drained batch is put back at the head of the queue.
    pub async fn flush(&self) -> Result<usize, MonitorError> {
        let _guard = self.write_lock.lock().await;

        let batch = std::mem::take(&mut *self.pending.lock().await);
        if batch.is_empty() {
            return Ok(0);
        }

        match self.append_locked(&batch).await {
            Ok(()) => Ok(batch.len()),
            Err(e) => {
                tracing::error!(target: LOG_TARGET, error = %e, count = batch.len(), "history flush failed");
                let mut pending = self.pending.lock().await;
                let newer = std::mem::replace(&mut *pending, batch);
                pending.extend(newer);
                Err(e)
            }
        }
    }

    /// Append events directly, bypassing the queue.
    pub async fn append_events(&self, events: &[CookieEvent]) -> Result<(), MonitorError> {
        if events.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock().await;
        self.append_locked(events).await
    }

    async fn append_locked(&self, events: &[CookieEvent]) -> Result<(), MonitorError> {
        let mut history: Vec<CookieEvent> = self.read(keys::HISTORY).await?;
        let mut meta: Metadata = self.read(keys::METADATA).await?;
        let now = self.clock.now_millis();

        history.extend_from_slice(events);

        let discarded = if history.len() > self.retention.prune_threshold {
            prune_history(&mut history, self.retention.max_retained)
        } else {
            0
        };

        self.write(keys::HISTORY, &history).await?;

        meta.total_events += events.len() as u64;
        meta.last_write = Some(now);
        if discarded > 0 {
            meta.last_prune = Some(now);
            meta.pruned_count += discarded as u64;
            tracing::debug!(target: LOG_TARGET, discarded, retained = history.len(), "history pruned");
        }
        // The events are already durable; a requeue here would append them twice.
        if let Err(e) = self.write(keys::METADATA, &meta).await {
            tracing::error!(target: LOG_TARGET, error = %e, "history metadata update failed");
        }
        Ok(())
    }

    // ---- history ----

    /// The `limit` most recent events, newest first. Empty on failure.
    pub async fn get_history(&self, limit: usize) -> Vec<CookieEvent> {
        let mut history: Vec<CookieEvent> = self.read(keys::HISTORY).await.log_or_default("get_history");
        history.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        history.truncate(limit);
        history
    }

    pub async fn clear_history(&self) -> Result<(), MonitorError> {
        let _guard = self.write_lock.lock().await;

        let mut meta: Metadata = self.read(keys::METADATA).await?;
        self.write(keys::HISTORY, &Vec::<CookieEvent>::new()).await?;

        meta.total_events = 0;
        meta.last_clear = Some(self.clock.now_millis());
        self.write(keys::METADATA, &meta).await
    }

    pub async fn get_metadata(&self) -> Metadata {
        self.read(keys::METADATA).await.log_or_default("get_metadata")
    }

    // ---- mute registry ----

    /// Muted domains. Empty on failure.
    pub async fn get_muted_domains(&self) -> MutedDomains {
        self.read(keys::MUTED_DOMAINS).await.log_or_default("get_muted_domains")
    }

    pub async fn is_muted(&self, domain: &str) -> bool {
        self.get_muted_domains().await.contains_key(domain)
    }

    pub async fn mute_domain(&self, domain: &str, manual: bool) -> Result<(), MonitorError> {
        let _guard = self.records_lock.lock().await;
        let mut muted: MutedDomains = self.read(keys::MUTED_DOMAINS).await?;
        muted.insert(
            domain.to_string(),
            MutedDomainEntry {
                timestamp: self.clock.now_millis(),
                manual,
            },
        );
        self.write(keys::MUTED_DOMAINS, &muted).await
    }

    pub async fn unmute_domain(&self, domain: &str) -> Result<(), MonitorError> {
        let _guard = self.records_lock.lock().await;
        let mut muted: MutedDomains = self.read(keys::MUTED_DOMAINS).await?;
        if muted.remove(domain).is_some() {
            self.write(keys::MUTED_DOMAINS, &muted).await?;
        }
        Ok(())
    }

    // ---- settings ----

    /// Current settings. Defaults on failure.
    pub async fn get_settings(&self) -> Settings {
        self.read(keys::SETTINGS).await.log_or_default("get_settings")
    }

    /// Shallow-merge `patch` into the stored settings and return the result.
    pub async fn update_settings(&self, patch: SettingsPatch) -> Result<Settings, MonitorError> {
        let _guard = self.records_lock.lock().await;
        let mut settings: Settings = self.read(keys::SETTINGS).await?;
        settings.apply(patch);
        self.write(keys::SETTINGS, &settings).await?;
        Ok(settings)
    }

    // ---- export ----

    /// Export everything. Requires developer mode.
    pub async fn export_data(&self, include_values: bool) -> Result<ExportDocument, MonitorError> {
        let settings = self.get_settings().await;
        if !settings.developer_mode {
            return Err(MonitorError::DeveloperModeRequired);
        }

        let history: Vec<CookieEvent> = self.read(keys::HISTORY).await?;
        let history = if include_values {
            history
        } else {
            history.iter().map(CookieEvent::redacted).collect()
        };
        let now = self.clock.now_millis();

        Ok(ExportDocument {
            version: STORAGE_VERSION.to_string(),
            export_date: format_rfc3339(now).unwrap_or_else(|| now.to_string()),
            metadata: self.get_metadata().await,
            settings: ExportedSettings::from(&settings),
            muted_domains: self.get_muted_domains().await,
            history,
            includes_values: include_values,
            disclaimer: if include_values {
                DISCLAIMER_WITH_VALUES
            } else {
                DISCLAIMER_REDACTED
            }
            .to_string(),
        })
    }

    pub async fn storage_stats(&self) -> Result<StorageStats, MonitorError> {
        let history = self.store.get(keys::HISTORY).await?;
        let meta = self.get_metadata().await;

        let (bytes_in_use, retained_events) = match &history {
            Some(value) => (
                serde_json::to_string(value)?.len(),
                value.as_array().map(|a| a.len()).unwrap_or(0),
            ),
            None => (0, 0),
        };

        Ok(StorageStats {
            bytes_in_use,
            retained_events,
            total_events: meta.total_events,
            last_prune: meta
                .last_prune
                .and_then(format_rfc3339)
                .unwrap_or_else(|| "never".to_string()),
        })
    }
}
