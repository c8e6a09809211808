//! Debounced high-risk alerts.

use super::scheduler::Schedule;
use crate::base::clock::Clock;
use crate::LOG_TARGET;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const ALERT_TITLE: &str = "Cookie Watch Alert";
pub const ALERT_ICON: &str = "assets/icons/icon48.png";

/// Alert content handed to the presentation sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub icon: String,
}

impl Alert {
    pub fn high_risk(domain: &str) -> Self {
        Self {
            title: ALERT_TITLE.to_string(),
            message: format!("High-risk tracking detected: {}", domain),
            icon: ALERT_ICON.to_string(),
        }
    }
}

/// Presents alerts to the user.
pub trait AlertSink: Send + Sync {
    fn show(&self, id: &str, alert: &Alert);
}

/// Sink that only logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn show(&self, id: &str, alert: &Alert) {
        tracing::info!(target: LOG_TARGET, id, message = %alert.message, "alert raised");
    }
}

/// Schedules at most one pending alert per domain and remembers which
/// domain each raised alert refers to.
pub struct AlertScheduler {
    scheduler: Arc<dyn Schedule>,
    sink: Arc<dyn AlertSink>,
    clock: Arc<dyn Clock>,
    delay: Duration,
    alert_domains: DashMap<String, String>,
    sequence: AtomicU64,
}

impl AlertScheduler {
    pub fn new(
        scheduler: Arc<dyn Schedule>,
        sink: Arc<dyn AlertSink>,
        clock: Arc<dyn Clock>,
        delay: Duration,
    ) -> Self {
        Self {
            scheduler,
            sink,
            clock,
            delay,
            alert_domains: DashMap::new(),
            sequence: AtomicU64::new(0),
        }
    }

    fn timer_name(domain: &str) -> String {
        format!("alert:{}", domain)
    }

    /// Arm an alert for `domain` unless one is already pending.
    /// Returns whether a new alert was armed.
    pub fn schedule_alert(self: &Arc<Self>, domain: &str) -> bool {
        let this = Arc::clone(self);
        let owned = domain.to_string();
        self.scheduler.arm_if_idle(
            &Self::timer_name(domain),
            self.delay,
            Box::pin(async move {
                this.raise(&owned);
            }),
        )
    }

    pub fn is_pending(&self, domain: &str) -> bool {
        self.scheduler.is_armed(&Self::timer_name(domain))
    }

    fn raise(&self, domain: &str) -> String {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let id = format!("cw-alert-{}-{}-{}", domain, self.clock.now_millis(), seq);
        self.alert_domains.insert(id.clone(), domain.to_string());
        self.sink.show(&id, &Alert::high_risk(domain));
        id
    }

    /// The user interacted with alert `id`: forget it and return its domain.
    pub fn on_alert_activated(&self, id: &str) -> Option<String> {
        self.alert_domains.remove(id).map(|(_, domain)| domain)
    }

    /// Alerts raised and not yet activated.
    pub fn outstanding(&self) -> usize {
        self.alert_domains.len()
    }
}
