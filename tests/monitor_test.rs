//! End-to-end tests of the monitor pipeline over in-memory stores.

use cookiewatch::base::clock::ManualClock;
use cookiewatch::cookies::source::{CookieSource, Listing};
use cookiewatch::cookies::{BrowserCookie, CookieAction, CookieChange, CookieJar, RiskTier};
use cookiewatch::monitor::notify::{Alert, AlertSink};
use cookiewatch::monitor::scheduler::{Schedule, TokioScheduler};
use cookiewatch::monitor::{CookieMonitor, TEST_NOTIFICATION_DOMAIN, TEST_NOTIFICATION_HASH};
use cookiewatch::storage::kv::{keys, KvStore};
use cookiewatch::storage::memory::MemoryStore;
use cookiewatch::{MonitorConfig, MonitorError};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingSink {
    shown: Mutex<Vec<(String, Alert)>>,
}

impl AlertSink for RecordingSink {
    fn show(&self, id: &str, alert: &Alert) {
        self.shown.lock().unwrap().push((id.to_string(), alert.clone()));
    }
}

struct Harness {
    monitor: CookieMonitor,
    durable: Arc<MemoryStore>,
    session: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
    sink: Arc<RecordingSink>,
}

fn harness_with(config: MonitorConfig) -> Harness {
    let durable = Arc::new(MemoryStore::new());
    let session = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let sink = Arc::new(RecordingSink::default());

    let monitor = CookieMonitor::builder(durable.clone())
        .session_store(session.clone())
        .clock(clock.clone())
        .alert_sink(sink.clone())
        .config(config)
        .build();

    Harness {
        monitor,
        durable,
        session,
        clock,
        sink,
    }
}

fn harness() -> Harness {
    harness_with(MonitorConfig::default())
}

fn added(name: &str, domain: &str) -> CookieChange {
    CookieChange::added(BrowserCookie::new(name, "value", domain))
}

async fn settle(config: &MonitorConfig) {
    tokio::time::sleep(config.flush_delay.max(config.checkpoint_delay) + Duration::from_millis(10)).await;
}

#[tokio::test(start_paused = true)]
async fn test_second_addition_is_a_mutation() {
    let h = harness();
    h.monitor.init().await.unwrap();

    let first = h.monitor.handle_change(added("_ga", "example.com")).await.unwrap().unwrap();
    h.clock.advance(1_000);
    let second = h.monitor.handle_change(added("_ga", "example.com")).await.unwrap().unwrap();

    assert_eq!(first.identity_hash, second.identity_hash);
    assert_eq!(second.change_count, 2);
    assert_eq!(second.risk_level, first.risk_level);
    assert_eq!(h.monitor.index_len(), 1);

    settle(h.monitor.config()).await;
    assert_eq!(h.monitor.history().get_history(10).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_noisy_domain_trips_breaker() {
    let h = harness();
    h.monitor.init().await.unwrap();

    for i in 0..50 {
        let event = h.monitor.handle_change(added(&format!("c{i}"), "noisy.com")).await.unwrap();
        assert!(event.is_some(), "event {} should pass", i + 1);
    }

    assert!(h.monitor.handle_change(added("c50", "noisy.com")).await.unwrap().is_none());
    assert!(h.monitor.handle_change(added("c51", "www.noisy.com")).await.unwrap().is_none());
    assert_eq!(h.monitor.tripped_domains(), vec!["noisy.com".to_string()]);

    // Other domains are unaffected.
    assert!(h.monitor.handle_change(added("a", "quiet.com")).await.unwrap().is_some());

    h.clock.advance(10_001);
    assert!(h.monitor.handle_change(added("late", "noisy.com")).await.unwrap().is_some());
    assert!(h.monitor.tripped_domains().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_tripped_domain_stays_suppressed_after_window_reset() {
    let h = harness();
    h.monitor.init().await.unwrap();

    for i in 0..51 {
        h.monitor.handle_change(added(&format!("c{i}"), "noisy.com")).await.unwrap();
    }
    let indexed = h.monitor.index_len();

    // Past the 1 s window but well inside the cooldown.
    h.clock.advance(1_500);
    assert!(h.monitor.handle_change(added("x", "noisy.com")).await.unwrap().is_none());
    assert_eq!(h.monitor.tripped_domains(), vec!["noisy.com".to_string()]);
    assert_eq!(h.monitor.index_len(), indexed);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_changes_to_one_identity() {
    let h = harness();
    h.monitor.init().await.unwrap();

    let (a, b) = tokio::join!(
        h.monitor.handle_change(added("sid", "example.com")),
        h.monitor.handle_change(added("sid", "example.com"))
    );
    assert!(a.unwrap().is_some());
    assert!(b.unwrap().is_some());

    assert_eq!(h.monitor.index_len(), 1);
    let entry = &h.monitor.index_snapshot()[0];
    assert_eq!(entry.change_count, 2);
    assert_eq!(h.monitor.history().pending_len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn test_history_pruned_to_most_recent() {
    let h = harness_with(MonitorConfig::new().retention(3, 5));
    h.monitor.init().await.unwrap();

    for i in 0..6 {
        h.clock.advance(10);
        h.monitor.handle_change(added(&format!("c{i}"), "example.com")).await.unwrap();
    }
    assert_eq!(h.monitor.flush().await.unwrap(), 6);

    let history = h.monitor.history().get_history(100).await;
    let names: Vec<&str> = history.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["c5", "c4", "c3"]);

    let meta = h.monitor.history().get_metadata().await;
    assert_eq!(meta.pruned_count, 3);
    assert_eq!(meta.total_events, 6);
    assert!(meta.last_prune.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_init_keeps_existing_settings() {
    let h = harness();
    h.durable
        .set(keys::SETTINGS, json!({"developerMode": true, "theme": "dark"}))
        .await
        .unwrap();

    h.monitor.init().await.unwrap();
    h.monitor.init().await.unwrap();

    let settings = h.monitor.history().get_settings().await;
    assert!(settings.developer_mode);
    assert_eq!(settings.theme, "dark");
    assert!(settings.notifications_enabled);
}

#[tokio::test(start_paused = true)]
async fn test_init_fails_without_storage() {
    let h = harness();
    h.durable.set_failing(true);

    let err = h.monitor.init().await.unwrap_err();
    assert!(err.is_fatal());
}

#[tokio::test(start_paused = true)]
async fn test_private_store_gate() {
    let h = harness();
    h.monitor.init().await.unwrap();

    let private = CookieChange::added(BrowserCookie::new("sid", "1", "example.com").with_store("1"));
    assert!(h.monitor.handle_change(private.clone()).await.unwrap().is_none());

    h.monitor
        .handle_message(json!({"type": "UPDATE_SETTINGS", "settings": {"incognitoEnabled": true}}))
        .await;

    let event = h.monitor.handle_change(private).await.unwrap().unwrap();
    assert!(event.is_incognito);
    assert_eq!(h.monitor.index_len(), 1);
    // Private-mode events never reach durable history.
    assert_eq!(h.monitor.history().pending_len().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_muted_domain_dropped() {
    let h = harness();
    h.monitor.init().await.unwrap();

    let reply = h
        .monitor
        .handle_message(json!({"type": "MUTE_DOMAIN", "domain": "example.com"}))
        .await;
    assert_eq!(reply, json!({"success": true}));

    assert!(h.monitor.handle_change(added("a", "www.example.com")).await.unwrap().is_none());

    h.monitor
        .handle_message(json!({"type": "UNMUTE_DOMAIN", "domain": "example.com"}))
        .await;
    assert!(h.monitor.handle_change(added("a", "www.example.com")).await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn test_auto_mute_big_tech() {
    let h = harness();
    h.monitor.init().await.unwrap();
    h.monitor
        .handle_message(json!({"type": "UPDATE_SETTINGS", "settings": {"autoMuteBigTech": true}}))
        .await;

    assert!(h.monitor.handle_change(added("IDE", ".doubleclick.net")).await.unwrap().is_none());

    let muted = h.monitor.history().get_muted_domains().await;
    assert!(!muted["doubleclick.net"].manual);
}

#[tokio::test(start_paused = true)]
async fn test_high_risk_alert_debounced() {
    let h = harness();
    h.monitor.init().await.unwrap();
    h.monitor.set_active_page(Some("https://news.example.com/".into())).await;

    for name in ["a", "b", "c"] {
        let event = h.monitor.handle_change(added(name, ".tracker.net")).await.unwrap().unwrap();
        assert_eq!(event.risk_level, RiskTier::High);
    }

    tokio::time::sleep(Duration::from_millis(900)).await;

    let shown = h.sink.shown.lock().unwrap().clone();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].1.message, "High-risk tracking detected: tracker.net");
    assert_eq!(h.monitor.on_alert_activated(&shown[0].0).as_deref(), Some("tracker.net"));
}

#[tokio::test(start_paused = true)]
async fn test_trigger_test_notification() {
    let h = harness();
    h.monitor.init().await.unwrap();

    let reply = h
        .monitor
        .handle_message(json!({"type": "TRIGGER_TEST_NOTIFICATION"}))
        .await;
    assert_eq!(reply, json!({"success": true}));

    let event = h.monitor.lookup(TEST_NOTIFICATION_HASH).unwrap();
    assert_eq!(event.risk_level, RiskTier::High);
    assert!(event.is_third_party);
    assert_eq!(event.registrable_domain, TEST_NOTIFICATION_DOMAIN);

    settle(h.monitor.config()).await;
    assert_eq!(h.sink.shown.lock().unwrap().len(), 1);
    assert_eq!(h.monitor.history().get_history(10).await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_export_requires_developer_mode() {
    let h = harness();
    h.monitor.init().await.unwrap();
    h.monitor.handle_change(added("a", "example.com")).await.unwrap();
    h.monitor.flush().await.unwrap();

    let denied = h
        .monitor
        .handle_message(json!({"type": "EXPORT_DATA", "includeValues": false}))
        .await;
    assert_eq!(denied, json!({"error": "Developer mode required for export"}));

    h.monitor
        .handle_message(json!({"type": "UPDATE_SETTINGS", "settings": {"developerMode": true}}))
        .await;
    let export = h
        .monitor
        .handle_message(json!({"type": "EXPORT_DATA", "includeValues": false}))
        .await;

    let data = &export["data"];
    assert_eq!(data["includesValues"], json!(false));
    assert_eq!(data["history"][0]["value"], json!("[REDACTED]"));
    assert!(data["settings"].get("developerMode").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_get_cookies_and_history_messages() {
    let h = harness();
    h.monitor.init().await.unwrap();
    for name in ["a", "b"] {
        h.clock.advance(5);
        h.monitor.handle_change(added(name, "example.com")).await.unwrap();
    }
    h.monitor.flush().await.unwrap();

    let cookies = h.monitor.handle_message(json!({"type": "GET_COOKIES"})).await;
    assert_eq!(cookies["cookies"].as_array().unwrap().len(), 2);
    assert_eq!(cookies["circuitBreakers"], json!([]));

    let history = h
        .monitor
        .handle_message(json!({"type": "GET_HISTORY", "limit": 1}))
        .await;
    assert_eq!(history["history"].as_array().unwrap().len(), 1);
    assert_eq!(history["history"][0]["name"], json!("b"));

    let stats = h.monitor.handle_message(json!({"type": "GET_STORAGE_STATS"})).await;
    assert_eq!(stats["stats"]["retainedEvents"], json!(2));
    assert_eq!(stats["stats"]["lastPrune"], json!("never"));

    let cleared = h.monitor.handle_message(json!({"type": "CLEAR_HISTORY"})).await;
    assert_eq!(cleared, json!({"success": true}));
    assert!(h.monitor.history().get_history(10).await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unknown_message_yields_error() {
    let h = harness();
    h.monitor.init().await.unwrap();

    let reply = h.monitor.handle_message(json!({"type": "FORMAT_DISK"})).await;
    assert!(reply["error"].is_string());
}

#[tokio::test(start_paused = true)]
async fn test_restart_restores_index_and_pending_queue() {
    let durable = Arc::new(MemoryStore::new());
    let session = Arc::new(MemoryStore::new());
    let timers = Arc::new(TokioScheduler::new());

    let monitor = CookieMonitor::builder(durable.clone())
        .session_store(session.clone())
        .scheduler(timers.clone())
        .build();
    monitor.init().await.unwrap();
    monitor.handle_change(added("a", "example.com")).await.unwrap();
    monitor.handle_change(added("b", "example.com")).await.unwrap();

    // Checkpoint lands but the process dies before the flush.
    monitor.save_checkpoint().await.unwrap();
    timers.cancel_all();
    assert!(session.get(keys::PENDING_QUEUE).await.unwrap().is_some());

    let revived = CookieMonitor::builder(durable.clone())
        .session_store(session.clone())
        .build();
    revived.init().await.unwrap();

    assert_eq!(revived.index_len(), 2);
    assert_eq!(revived.history().pending_len().await, 2);

    settle(revived.config()).await;
    assert_eq!(revived.history().pending_len().await, 0);
    assert_eq!(revived.history().get_history(10).await.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cold_start_hydrates_from_jar() {
    let jar = Arc::new(CookieJar::new());
    jar.set_cookie(BrowserCookie::new("_ga", "secret", "example.com"));
    jar.set_cookie(BrowserCookie::new("sid", "secret", "example.com").with_store("1"));

    let monitor = CookieMonitor::builder(Arc::new(MemoryStore::new()))
        .source(jar.clone())
        .clock(Arc::new(ManualClock::new(1)))
        .build();
    monitor.init().await.unwrap();

    let index = monitor.index_snapshot();
    assert_eq!(index.len(), 1);
    assert_eq!(index[0].action, CookieAction::Hydrated);
    assert_eq!(index[0].risk_level, RiskTier::Medium);
    assert!(index[0].value.is_none());
    assert_eq!(monitor.history().pending_len().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_listener_processes_jar_changes() {
    let jar = CookieJar::new();
    let h = harness();
    h.monitor.init().await.unwrap();

    let handle = h.monitor.listen(jar.subscribe());
    jar.set_cookie(BrowserCookie::new("a", "1", "example.com"));
    jar.set_cookie(BrowserCookie::new("b", "1", "example.com"));
    jar.remove_cookie("0", "example.com", "/", "a");
    drop(jar);

    handle.await.unwrap();

    let index = h.monitor.index_snapshot();
    assert_eq!(index.len(), 1);
    assert_eq!(index[0].name, "b");
    assert_eq!(h.monitor.history().pending_len().await, 3);
}

#[tokio::test(start_paused = true)]
async fn test_failed_flush_keeps_events() {
    let h = harness();
    h.monitor.init().await.unwrap();
    h.monitor.handle_change(added("a", "example.com")).await.unwrap();

    h.durable.set_failing(true);
    assert!(h.monitor.flush().await.is_err());
    assert_eq!(h.monitor.history().pending_len().await, 1);

    h.durable.set_failing(false);
    assert_eq!(h.monitor.flush().await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_flushes_and_checkpoints() {
    let h = harness();
    h.monitor.init().await.unwrap();
    h.monitor.handle_change(added("a", "example.com")).await.unwrap();

    h.monitor.teardown().await;

    assert_eq!(h.monitor.history().get_history(10).await.len(), 1);
    let saved = h.session.get(keys::SESSION_STATE).await.unwrap().unwrap();
    assert_eq!(saved.as_array().unwrap().len(), 1);
}

struct UnavailableSource;

impl CookieSource for UnavailableSource {
    fn get_all(&self) -> Listing<'_> {
        Box::pin(async { Err(MonitorError::source_unavailable("cookie API not ready")) })
    }
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_source_is_not_fatal() {
    let monitor = CookieMonitor::builder(Arc::new(MemoryStore::new()))
        .source(Arc::new(UnavailableSource))
        .build();

    monitor.init().await.unwrap();
    assert_eq!(monitor.index_len(), 0);
    assert_eq!(monitor.hydrate().await, 0);
}
