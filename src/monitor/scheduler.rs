//! Named, debounced timers.
//!
//! Components never sleep themselves; they arm named timers on a
//! [`Schedule`] implementation. Tests drive [`TokioScheduler`] with
//! tokio's paused clock.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::BoxFuture;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Action run when a timer fires.
pub type Task = BoxFuture<'static, ()>;

/// Scheduling primitive: fire after delay, named, idempotent re-arm.
pub trait Schedule: Send + Sync {
    /// Arm `name`, replacing any pending timer of the same name.
    fn arm(&self, name: &str, delay: Duration, task: Task);

    /// Arm `name` only if no timer of that name is pending.
    /// Returns whether a timer was armed.
    fn arm_if_idle(&self, name: &str, delay: Duration, task: Task) -> bool;

    /// Cancel a pending timer. Returns whether one was pending.
    fn cancel(&self, name: &str) -> bool;

    fn is_armed(&self, name: &str) -> bool;

    fn cancel_all(&self);
}

impl<S: Schedule + ?Sized> Schedule for Arc<S> {
    fn arm(&self, name: &str, delay: Duration, task: Task) {
        (**self).arm(name, delay, task)
    }

    fn arm_if_idle(&self, name: &str, delay: Duration, task: Task) -> bool {
        (**self).arm_if_idle(name, delay, task)
    }

    fn cancel(&self, name: &str) -> bool {
        (**self).cancel(name)
    }

    fn is_armed(&self, name: &str) -> bool {
        (**self).is_armed(name)
    }

    fn cancel_all(&self) {
        (**self).cancel_all()
    }
}

struct Timer {
    generation: u64,
    handle: JoinHandle<()>,
}

/// [`Schedule`] backed by spawned `tokio::time::sleep` tasks.
///
/// Must be used from within a tokio runtime.
#[derive(Clone, Default)]
pub struct TokioScheduler {
    timers: Arc<DashMap<String, Timer>>,
    generation: Arc<AtomicU64>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn spawn(&self, name: &str, delay: Duration, task: Task) -> Timer {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let timers = Arc::clone(&self.timers);
        let key = name.to_string();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Clear our own entry first so the action may re-arm this name.
            timers.remove_if(&key, |_, t| t.generation == generation);
            task.await;
        });

        Timer { generation, handle }
    }

    /// Number of pending timers.
    pub fn pending(&self) -> usize {
        self.timers.iter().filter(|t| !t.handle.is_finished()).count()
    }
}

impl Schedule for TokioScheduler {
    fn arm(&self, name: &str, delay: Duration, task: Task) {
        let timer = self.spawn(name, delay, task);
        if let Some(previous) = self.timers.insert(name.to_string(), timer) {
            previous.handle.abort();
        }
    }

    fn arm_if_idle(&self, name: &str, delay: Duration, task: Task) -> bool {
        match self.timers.entry(name.to_string()) {
            Entry::Occupied(mut o) => {
                if !o.get().handle.is_finished() {
                    return false;
                }
                o.insert(self.spawn(name, delay, task));
                true
            }
            Entry::Vacant(v) => {
                v.insert(self.spawn(name, delay, task));
                true
            }
        }
    }

    fn cancel(&self, name: &str) -> bool {
        match self.timers.remove(name) {
            Some((_, timer)) => {
                let pending = !timer.handle.is_finished();
                timer.handle.abort();
                pending
            }
            None => false,
        }
    }

    fn is_armed(&self, name: &str) -> bool {
        self.timers
            .get(name)
            .is_some_and(|t| !t.handle.is_finished())
    }

    fn cancel_all(&self) {
        self.timers.retain(|_, timer| {
            timer.handle.abort();
            false
        });
    }
}
