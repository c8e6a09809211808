//! Monitor configuration.

use crate::storage::history::RetentionPolicy;
use std::time::Duration;

/// Tunables for the monitoring pipeline.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Events per window above which a domain trips its breaker
    pub breaker_threshold: u32,
    /// Breaker counting window
    pub breaker_window: Duration,
    /// How long a tripped domain stays suppressed
    pub breaker_cooldown: Duration,
    /// Debounce before the live index is checkpointed
    pub checkpoint_delay: Duration,
    /// Delay before queued events are flushed to history
    pub flush_delay: Duration,
    /// Debounce before a high-risk alert is raised
    pub alert_delay: Duration,
    /// History bounds
    pub retention: RetentionPolicy,
    /// Records returned by GET_HISTORY without an explicit limit
    pub default_history_limit: usize,
    /// Characters of a cookie value inspected by the classifier
    pub value_inspect_limit: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            breaker_threshold: 50,
            breaker_window: Duration::from_secs(1),
            breaker_cooldown: Duration::from_secs(10),
            checkpoint_delay: Duration::from_secs(3),
            flush_delay: Duration::from_secs(3),
            alert_delay: Duration::from_millis(800),
            retention: RetentionPolicy::default(),
            default_history_limit: 100,
            value_inspect_limit: crate::cookies::classifier::VALUE_INSPECT_LIMIT,
        }
    }
}

impl MonitorConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set breaker threshold, window and cooldown.
    pub fn breaker(mut self, threshold: u32, window: Duration, cooldown: Duration) -> Self {
        self.breaker_threshold = threshold;
        self.breaker_window = window;
        self.breaker_cooldown = cooldown;
        self
    }

    /// Set checkpoint debounce.
    pub fn checkpoint_delay(mut self, delay: Duration) -> Self {
        self.checkpoint_delay = delay;
        self
    }

    /// Set flush batching delay.
    pub fn flush_delay(mut self, delay: Duration) -> Self {
        self.flush_delay = delay;
        self
    }

    /// Set alert debounce.
    pub fn alert_delay(mut self, delay: Duration) -> Self {
        self.alert_delay = delay;
        self
    }

    /// Set history bounds. `max_retained` is clamped below `prune_threshold`.
    pub fn retention(mut self, max_retained: usize, prune_threshold: usize) -> Self {
        let prune_threshold = prune_threshold.max(1);
        self.retention = RetentionPolicy {
            max_retained: max_retained.min(prune_threshold - 1),
            prune_threshold,
        };
        self
    }

    /// Set default GET_HISTORY limit.
    pub fn default_history_limit(mut self, limit: usize) -> Self {
        self.default_history_limit = limit;
        self
    }

    /// Set classifier value inspection limit.
    pub fn value_inspect_limit(mut self, limit: usize) -> Self {
        self.value_inspect_limit = limit;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = MonitorConfig::default();
        assert_eq!(c.breaker_threshold, 50);
        assert_eq!(c.breaker_cooldown, Duration::from_secs(10));
        assert_eq!(c.retention.max_retained, 5000);
        assert_eq!(c.retention.prune_threshold, 5500);
    }

    #[test]
    fn test_retention_clamped() {
        let c = MonitorConfig::new().retention(100, 50);
        assert_eq!(c.retention.prune_threshold, 50);
        assert_eq!(c.retention.max_retained, 49);
    }
}
