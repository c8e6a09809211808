//! Per-domain circuit breaker.
//!
//! Counts change events per registrable domain in fixed windows. A domain
//! whose count exceeds the threshold within one window is tripped and its
//! events are dropped until the cooldown, measured from the trip, elapses.

use crate::base::clock::{Clock, Millis};
use crate::LOG_TARGET;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

/// Breaker state for one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerState {
    pub count: u32,
    pub reset_time: Millis,
    pub trip_time: Option<Millis>,
}

/// Thread-safe breaker table keyed by registrable domain.
pub struct CircuitBreaker {
    states: DashMap<String, CircuitBreakerState>,
    clock: Arc<dyn Clock>,
    threshold: u32,
    window: Millis,
    cooldown: Millis,
}

impl CircuitBreaker {
    pub fn new(clock: Arc<dyn Clock>, threshold: u32, window: Duration, cooldown: Duration) -> Self {
        Self {
            states: DashMap::new(),
            clock,
            threshold,
            window: window.as_millis() as Millis,
            cooldown: cooldown.as_millis() as Millis,
        }
    }

    /// Record one event for `domain` and report whether it must be dropped.
    pub fn should_suppress(&self, domain: &str) -> bool {
        let now = self.clock.now_millis();
        let mut state = self
            .states
            .entry(domain.to_string())
            .or_insert(CircuitBreakerState {
                count: 0,
                reset_time: now + self.window,
                trip_time: None,
            });

        if now > state.reset_time {
            state.count = 1;
            state.reset_time = now + self.window;
        } else {
            state.count = state.count.saturating_add(1);
        }

        // A trip holds for the whole cooldown, whatever the current window count.
        if state.trip_time.is_some_and(|t| now - t < self.cooldown) {
            return true;
        }

        if state.count <= self.threshold {
            return false;
        }

        state.trip_time = Some(now);
        tracing::warn!(target: LOG_TARGET, domain = %domain, count = state.count, "circuit breaker tripped");
        true
    }

    /// Whether `domain` is inside its cooldown right now.
    pub fn is_tripped(&self, domain: &str) -> bool {
        let now = self.clock.now_millis();
        self.states
            .get(domain)
            .and_then(|s| s.trip_time)
            .is_some_and(|t| now - t < self.cooldown)
    }

    /// Domains currently inside their cooldown, sorted.
    pub fn tripped_domains(&self) -> Vec<String> {
        let now = self.clock.now_millis();
        let mut domains: Vec<String> = self
            .states
            .iter()
            .filter(|e| e.value().trip_time.is_some_and(|t| now - t < self.cooldown))
            .map(|e| e.key().clone())
            .collect();
        domains.sort();
        domains
    }

    pub fn state(&self, domain: &str) -> Option<CircuitBreakerState> {
        self.states.get(domain).map(|s| *s)
    }

    /// Drop every domain's state.
    pub fn clear(&self) {
        self.states.clear();
    }
}
