//! The cookie monitor orchestrator.
//!
//! [`CookieMonitor`] owns every piece of process-wide state: the live
//! identity index, the circuit breaker table, the history queue, pending
//! timers. Each change notification goes through the same pipeline:
//!
//! | Stage | Outcome on rejection |
//! |-------|----------------------|
//! | private-store gate | dropped unless incognito tracking is on |
//! | circuit breaker | dropped while the domain is tripped |
//! | mute registry | dropped |
//! | identity | merge into existing entry, or insert / remove |
//! | persistence | checkpoint, alert, history queue |
//!
//! # Example
//!
//! ```
//! use cookiewatch::cookies::{BrowserCookie, CookieChange};
//! use cookiewatch::monitor::CookieMonitor;
//! use cookiewatch::storage::memory::MemoryStore;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), cookiewatch::MonitorError> {
//! let monitor = CookieMonitor::builder(Arc::new(MemoryStore::new())).build();
//! monitor.init().await?;
//!
//! let cookie = BrowserCookie::new("_ga", "GA1.2.3", "example.com");
//! let event = monitor.handle_change(CookieChange::added(cookie)).await?;
//! assert_eq!(event.map(|e| e.change_count), Some(1));
//! # Ok(())
//! # }
//! ```

pub mod breaker;
pub mod checkpoint;
pub mod command;
pub mod config;
pub mod notify;
pub mod scheduler;

use crate::base::clock::{Clock, SystemClock};
use crate::base::context::DegradeExt;
use crate::base::monitorerror::MonitorError;
use crate::cookies::canonicalcookie::{BrowserCookie, CookieChange};
use crate::cookies::classifier::{Classifier, RiskTier};
use crate::cookies::event::{CookieAction, CookieEvent};
use crate::cookies::identity::identity_hash_for;
use crate::cookies::psl::{is_third_party, registrable_domain};
use crate::cookies::sanitize::sanitize_input;
use crate::cookies::source::{CookieSource, EmptySource};
use crate::storage::history::HistoryStore;
use crate::storage::kv::KvStore;
use crate::storage::memory::MemoryStore;
use crate::storage::settings::Settings;
use crate::LOG_TARGET;
use breaker::CircuitBreaker;
use checkpoint::SessionCheckpointer;
use command::{Command, Response};
use config::MonitorConfig;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use notify::{AlertScheduler, AlertSink, LogAlertSink};
use scheduler::{Schedule, TokioScheduler};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Timer that writes the session checkpoint.
pub const CHECKPOINT_TIMER: &str = "save_state_debounce";

/// Timer that drains the history queue.
pub const FLUSH_TIMER: &str = "batch_storage_write";

/// Registrable domains muted automatically when `autoMuteBigTech` is on.
pub const AUTO_MUTE_DOMAINS: &[&str] = &[
    "doubleclick.net",
    "google-analytics.com",
    "googlesyndication.com",
    "googletagmanager.com",
    "googleadservices.com",
    "facebook.net",
    "amazon-adsystem.com",
    "adnxs.com",
    "criteo.com",
    "scorecardresearch.com",
];

pub const TEST_NOTIFICATION_DOMAIN: &str = "tracker-test-site.com";
pub const TEST_NOTIFICATION_HASH: &str = "test-notification-hash";
pub const TEST_NOTIFICATION_COOKIE: &str = "TEST_TRACKER_COOKIE";

pub fn is_auto_muted(domain: &str) -> bool {
    AUTO_MUTE_DOMAINS.contains(&domain)
}

struct Inner {
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Schedule>,
    breaker: CircuitBreaker,
    history: HistoryStore,
    checkpointer: SessionCheckpointer,
    alerts: Arc<AlertScheduler>,
    classifier: Classifier,
    source: Arc<dyn CookieSource>,
    index: DashMap<String, CookieEvent>,
    active_page: RwLock<Option<String>>,
}

/// Builder for [`CookieMonitor`].
pub struct CookieMonitorBuilder {
    durable: Arc<dyn KvStore>,
    session: Option<Arc<dyn KvStore>>,
    source: Arc<dyn CookieSource>,
    sink: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    scheduler: Option<Arc<dyn Schedule>>,
    config: MonitorConfig,
}

impl CookieMonitorBuilder {
    /// Ephemeral store for checkpoints. Defaults to an in-memory store.
    pub fn session_store(mut self, session: Arc<dyn KvStore>) -> Self {
        self.session = Some(session);
        self
    }

    /// Live cookie set used for hydration.
    pub fn source(mut self, source: Arc<dyn CookieSource>) -> Self {
        self.source = source;
        self
    }

    pub fn alert_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn scheduler(mut self, scheduler: Arc<dyn Schedule>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> CookieMonitor {
        let config = self.config;
        let clock = self.clock;
        let scheduler: Arc<dyn Schedule> = match self.scheduler {
            Some(scheduler) => scheduler,
            None => Arc::new(TokioScheduler::new()),
        };
        let session: Arc<dyn KvStore> = match self.session {
            Some(session) => session,
            None => Arc::new(MemoryStore::new()),
        };

        let breaker = CircuitBreaker::new(
            clock.clone(),
            config.breaker_threshold,
            config.breaker_window,
            config.breaker_cooldown,
        );
        let history = HistoryStore::new(self.durable, clock.clone(), config.retention);
        let alerts = Arc::new(AlertScheduler::new(
            scheduler.clone(),
            self.sink,
            clock.clone(),
            config.alert_delay,
        ));
        let classifier = Classifier::new().with_value_limit(config.value_inspect_limit);

        CookieMonitor {
            inner: Arc::new(Inner {
                config,
                clock,
                scheduler,
                breaker,
                history,
                checkpointer: SessionCheckpointer::new(session),
                alerts,
                classifier,
                source: self.source,
                index: DashMap::new(),
                active_page: RwLock::new(None),
            }),
        }
    }
}

/// Event-driven cookie monitor. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CookieMonitor {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CookieMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieMonitor")
            .field("tracked", &self.inner.index.len())
            .field("restored", &self.inner.checkpointer.is_restored())
            .finish()
    }
}

impl CookieMonitor {
    pub fn builder(durable: Arc<dyn KvStore>) -> CookieMonitorBuilder {
        CookieMonitorBuilder {
            durable,
            session: None,
            source: Arc::new(EmptySource),
            sink: Arc::new(LogAlertSink),
            clock: Arc::new(SystemClock),
            scheduler: None,
            config: MonitorConfig::default(),
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    pub fn history(&self) -> &HistoryStore {
        &self.inner.history
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.inner.breaker
    }

    // ---- lifecycle ----

    /// Initialize durable storage, restore the last checkpoint and hydrate
    /// from the live cookie set when nothing was restored.
    ///
    /// Only a storage initialization failure is returned.
    pub async fn init(&self) -> Result<(), MonitorError> {
        self.inner.history.init().await?;
        self.restore().await;

        if self.inner.index.is_empty() {
            self.hydrate().await;
        }
        if self.inner.history.pending_len().await > 0 {
            self.ensure_flush_armed();
        }

        tracing::info!(target: LOG_TARGET, tracking = self.inner.index.len(), "monitor initialized");
        Ok(())
    }

    /// Load the last checkpoint into the live index, once until
    /// [`invalidate_restore`](Self::invalidate_restore).
    ///
    /// Returns whether a checkpoint was loaded.
    pub async fn restore(&self) -> bool {
        let Some(checkpoint) = self.inner.checkpointer.restore().await else {
            return false;
        };

        let restored = checkpoint.entries.len();
        for (hash, event) in checkpoint.entries {
            self.inner.index.insert(hash, event);
        }

        // A queue that is still populated already holds these events.
        if !checkpoint.pending.is_empty() && self.inner.history.pending_len().await == 0 {
            self.inner.history.restore_pending(checkpoint.pending).await;
            self.ensure_flush_armed();
        }

        tracing::debug!(target: LOG_TARGET, restored, "checkpoint restored");
        true
    }

    pub fn is_restored(&self) -> bool {
        self.inner.checkpointer.is_restored()
    }

    /// Allow the next [`restore`](Self::restore) to run again.
    pub fn invalidate_restore(&self) {
        self.inner.checkpointer.invalidate();
    }

    /// Cancel pending timers, then run the final flush and checkpoint.
    pub async fn teardown(&self) {
        self.inner.scheduler.cancel_all();
        self.flush().await.log_or_default("teardown flush");
        self.save_checkpoint().await.log_or_default("teardown checkpoint");
        tracing::info!(target: LOG_TARGET, "monitor torn down");
    }

    // ---- pipeline ----

    /// Run one change notification through the pipeline.
    ///
    /// Returns the resulting index record, or `None` when the change was
    /// dropped by the private-store gate, the breaker or the mute registry.
    pub async fn handle_change(&self, change: CookieChange) -> Result<Option<CookieEvent>, MonitorError> {
        let inner = &self.inner;
        if !inner.checkpointer.is_restored() {
            self.restore().await;
        }

        let CookieChange { cookie, removed, cause } = change;
        let settings = inner.history.get_settings().await;
        let private = cookie.is_private();

        if private && !settings.incognito_enabled {
            tracing::trace!(target: LOG_TARGET, store = %cookie.store_id, "private store change ignored");
            return Ok(None);
        }

        let domain = registrable_domain(cookie.domain.trim_start_matches('.'));
        if inner.breaker.should_suppress(&domain) {
            return Ok(None);
        }

        if settings.auto_mute_big_tech && is_auto_muted(&domain) {
            if !inner.history.is_muted(&domain).await {
                inner.history.mute_domain(&domain, false).await.log_or_default("auto mute");
                tracing::info!(target: LOG_TARGET, domain = %domain, "domain muted automatically");
            }
            return Ok(None);
        }

        if inner.history.is_muted(&domain).await {
            return Ok(None);
        }

        let hash = identity_hash_for(&cookie)?;
        let reference = self.reference_for(&cookie).await;
        let now = inner.clock.now_millis();

        let (event, created) = match inner.index.entry(hash.clone()) {
            Entry::Occupied(mut existing) if !removed => {
                existing.get_mut().touch(now);
                (existing.get().clone(), false)
            }
            entry => {
                let event = self.build_event(hash, &cookie, removed, cause, reference.as_deref(), now);
                match entry {
                    Entry::Occupied(existing) => {
                        existing.remove();
                    }
                    Entry::Vacant(slot) => {
                        if !removed {
                            slot.insert(event.clone());
                        }
                    }
                }
                (event, true)
            }
        };

        self.schedule_checkpoint();

        if !created {
            tracing::trace!(target: LOG_TARGET, hash = %event.identity_hash, count = event.change_count, "merged");
            return Ok(Some(event));
        }

        if !removed && event.risk_level == RiskTier::High && !private && settings.notifications_enabled {
            inner.alerts.schedule_alert(&event.registrable_domain);
        }

        if !private {
            inner.history.enqueue(self.history_record(&event, &cookie, &settings)).await;
            self.ensure_flush_armed();
        }

        Ok(Some(event))
    }

    fn build_event(
        &self,
        hash: String,
        cookie: &BrowserCookie,
        removed: bool,
        cause: Option<String>,
        reference: Option<&str>,
        now: i64,
    ) -> CookieEvent {
        let action = if removed { CookieAction::Removed } else { CookieAction::Added };
        let mut event = CookieEvent::from_cookie(hash, cookie, action, now);
        if let Some(cause) = cause {
            event.cause = sanitize_input(&cause);
        }
        if !removed {
            event.is_third_party = reference.is_some_and(|r| is_third_party(&cookie.domain, r));
            event.risk_level = self.inner.classifier.classify(cookie, event.is_third_party);
        }
        event
    }

    /// History copy of `event`, carrying the cookie value while developer
    /// mode is on. The index never holds values.
    fn history_record(&self, event: &CookieEvent, cookie: &BrowserCookie, settings: &Settings) -> CookieEvent {
        let mut record = event.clone();
        if settings.developer_mode && event.action != CookieAction::Removed {
            record.value = Some(sanitize_input(&cookie.value));
        }
        record
    }

    /// Page the third-party check compares against: the partition's
    /// top-level site, else the active page.
    async fn reference_for(&self, cookie: &BrowserCookie) -> Option<String> {
        match cookie.partition_site() {
            Some(site) => Some(site.to_string()),
            None => self.inner.active_page.read().await.clone(),
        }
    }

    /// Set the page URL third-party checks are made against.
    pub async fn set_active_page(&self, url: Option<String>) {
        *self.inner.active_page.write().await = url;
    }

    /// Rebuild the index from the live cookie set. Values are never read.
    ///
    /// Returns the number of cookies indexed; a failing source is logged
    /// and indexes nothing.
    pub async fn hydrate(&self) -> usize {
        let inner = &self.inner;
        let cookies = match inner.source.get_all().await {
            Ok(cookies) => cookies,
            Err(e) => {
                tracing::error!(target: LOG_TARGET, error = %e, "hydration failed");
                return 0;
            }
        };

        let settings = inner.history.get_settings().await;
        let reference = inner.active_page.read().await.clone();
        let now = inner.clock.now_millis();
        let mut hydrated = 0;

        for mut cookie in cookies {
            if cookie.is_private() && !settings.incognito_enabled {
                continue;
            }
            cookie.value.clear();

            let hash = match identity_hash_for(&cookie) {
                Ok(hash) => hash,
                Err(e) => {
                    tracing::warn!(target: LOG_TARGET, error = %e, "skipping cookie during hydration");
                    continue;
                }
            };

            let site = cookie.partition_site().map(str::to_string).or_else(|| reference.clone());
            let mut event = CookieEvent::from_cookie(hash.clone(), &cookie, CookieAction::Hydrated, now);
            event.is_third_party = site.is_some_and(|r| is_third_party(&cookie.domain, &r));
            event.risk_level = inner.classifier.classify(&cookie, event.is_third_party);

            inner.index.insert(hash, event);
            hydrated += 1;
        }

        if hydrated > 0 {
            self.schedule_checkpoint();
        }
        tracing::info!(target: LOG_TARGET, hydrated, "index hydrated");
        hydrated
    }

    // ---- timers ----

    /// (Re)arm the checkpoint debounce timer.
    pub fn schedule_checkpoint(&self) {
        let this = self.clone();
        self.inner.scheduler.arm(
            CHECKPOINT_TIMER,
            self.inner.config.checkpoint_delay,
            Box::pin(async move {
                this.save_checkpoint().await.log_or_default("checkpoint");
            }),
        );
    }

    /// Arm the batch flush timer unless one is pending.
    pub fn ensure_flush_armed(&self) -> bool {
        let this = self.clone();
        self.inner.scheduler.arm_if_idle(
            FLUSH_TIMER,
            self.inner.config.flush_delay,
            Box::pin(async move {
                this.flush().await.log_or_default("history flush");
            }),
        )
    }

    /// Write the index and the pending queue to the session store.
    pub async fn save_checkpoint(&self) -> Result<(), MonitorError> {
        let entries: Vec<(String, CookieEvent)> = self
            .inner
            .index
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let pending = self.inner.history.pending_snapshot().await;
        self.inner.checkpointer.save(&entries, &pending).await
    }

    /// Drain the history queue now.
    pub async fn flush(&self) -> Result<usize, MonitorError> {
        self.inner.history.flush().await
    }

    // ---- queries ----

    /// Live index records, most recently seen first.
    pub fn index_snapshot(&self) -> Vec<CookieEvent> {
        let mut events: Vec<CookieEvent> = self.inner.index.iter().map(|e| e.value().clone()).collect();
        events.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        events
    }

    pub fn index_len(&self) -> usize {
        self.inner.index.len()
    }

    pub fn lookup(&self, identity_hash: &str) -> Option<CookieEvent> {
        self.inner.index.get(identity_hash).map(|e| e.value().clone())
    }

    pub fn tripped_domains(&self) -> Vec<String> {
        self.inner.breaker.tripped_domains()
    }

    /// The user activated alert `id`; returns the domain it referred to.
    pub fn on_alert_activated(&self, id: &str) -> Option<String> {
        self.inner.alerts.on_alert_activated(id)
    }

    // ---- message API ----

    /// Execute one command.
    pub async fn dispatch(&self, command: Command) -> Response {
        let inner = &self.inner;
        match command {
            Command::GetCookies => {
                if !inner.checkpointer.is_restored() {
                    self.restore().await;
                }
                Response::Cookies {
                    cookies: self.index_snapshot(),
                    circuit_breakers: self.tripped_domains(),
                }
            }
            Command::GetHistory { limit } => {
                let limit = limit.filter(|l| *l > 0).unwrap_or(inner.config.default_history_limit);
                Response::History {
                    history: inner.history.get_history(limit).await,
                }
            }
            Command::MuteDomain { domain } => {
                let domain = domain.trim().to_ascii_lowercase();
                into_response(inner.history.mute_domain(&domain, true).await)
            }
            Command::UnmuteDomain { domain } => {
                let domain = domain.trim().to_ascii_lowercase();
                into_response(inner.history.unmute_domain(&domain).await)
            }
            Command::GetSettings => Response::Settings {
                settings: inner.history.get_settings().await,
            },
            Command::UpdateSettings { settings } => match inner.history.update_settings(settings).await {
                Ok(settings) => Response::Settings { settings },
                Err(e) => Response::error(e),
            },
            Command::ClearHistory => into_response(inner.history.clear_history().await),
            Command::ExportData { include_values } => match inner.history.export_data(include_values).await {
                Ok(data) => Response::Export { data },
                Err(e) => Response::error(e),
            },
            Command::TriggerTestNotification => {
                self.trigger_test_notification().await;
                Response::success()
            }
            Command::GetStorageStats => match inner.history.storage_stats().await {
                Ok(stats) => Response::Stats { stats },
                Err(e) => Response::error(e),
            },
        }
    }

    /// Parse a JSON command, execute it and serialize the response.
    pub async fn handle_message(&self, message: Value) -> Value {
        let response = match serde_json::from_value::<Command>(message) {
            Ok(command) => self.dispatch(command).await,
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, error = %e, "rejected message");
                Response::error(MonitorError::InvalidCommand { message: e.to_string() })
            }
        };

        serde_json::to_value(&response).unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() }))
    }

    /// Insert a recognizable high-risk event and raise an alert for it,
    /// regardless of the notifications toggle.
    pub async fn trigger_test_notification(&self) {
        let inner = &self.inner;
        inner.alerts.schedule_alert(TEST_NOTIFICATION_DOMAIN);

        let cookie = BrowserCookie::new(TEST_NOTIFICATION_COOKIE, "", TEST_NOTIFICATION_DOMAIN);
        let mut event = CookieEvent::from_cookie(
            TEST_NOTIFICATION_HASH.to_string(),
            &cookie,
            CookieAction::Added,
            inner.clock.now_millis(),
        );
        event.risk_level = RiskTier::High;
        event.is_third_party = true;

        inner.index.insert(TEST_NOTIFICATION_HASH.to_string(), event.clone());
        self.schedule_checkpoint();
        inner.history.enqueue(event).await;
        self.ensure_flush_armed();
    }

    // ---- event source ----

    /// Spawn a task feeding every change from `changes` through the
    /// pipeline in arrival order. The task ends when the channel closes.
    pub fn listen(&self, mut changes: broadcast::Receiver<CookieChange>) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        if let Err(e) = this.handle_change(change).await {
                            tracing::error!(target: LOG_TARGET, error = %e, "change dropped");
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(target: LOG_TARGET, missed, "change listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!(target: LOG_TARGET, "change listener stopped");
        })
    }
}

fn into_response(result: Result<(), MonitorError>) -> Response {
    match result {
        Ok(()) => Response::success(),
        Err(e) => Response::error(e),
    }
}
