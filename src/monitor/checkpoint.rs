//! Session checkpoints of the live identity index.
//!
//! The index and the un-flushed history queue are written to the
//! ephemeral session store so a restarted process can resume without a
//! full re-hydration. A missing or malformed checkpoint is a cold start.

use crate::base::context::StorageResultExt;
use crate::base::monitorerror::MonitorError;
use crate::cookies::event::CookieEvent;
use crate::storage::kv::{keys, KvStore};
use crate::LOG_TARGET;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// State recovered from the session store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoint {
    /// (identity hash, record) pairs of the live index.
    pub entries: Vec<(String, CookieEvent)>,
    /// Events that were queued but not yet flushed.
    pub pending: Vec<CookieEvent>,
}

pub struct SessionCheckpointer {
    session: Arc<dyn KvStore>,
    restored: AtomicBool,
}

impl SessionCheckpointer {
    pub fn new(session: Arc<dyn KvStore>) -> Self {
        Self {
            session,
            restored: AtomicBool::new(false),
        }
    }

    /// Serialize the index and pending queue to the session store.
    pub async fn save(&self, entries: &[(String, CookieEvent)], pending: &[CookieEvent]) -> Result<(), MonitorError> {
        let index = serde_json::to_value(entries).storage_context(keys::SESSION_STATE)?;
        self.session.set(keys::SESSION_STATE, index).await?;

        let queue = serde_json::to_value(pending).storage_context(keys::PENDING_QUEUE)?;
        self.session.set(keys::PENDING_QUEUE, queue).await?;

        tracing::debug!(target: LOG_TARGET, entries = entries.len(), pending = pending.len(), "checkpoint saved");
        Ok(())
    }

    /// Load the last checkpoint, at most once until [`invalidate`](Self::invalidate).
    ///
    /// Returns `None` when already restored, when nothing was saved, or
    /// when the checkpoint cannot be read (logged).
    pub async fn restore(&self) -> Option<Checkpoint> {
        if self.restored.swap(true, Ordering::SeqCst) {
            return None;
        }

        match self.load().await {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                tracing::warn!(target: LOG_TARGET, error = %e, "checkpoint restore failed, starting cold");
                None
            }
        }
    }

    async fn load(&self) -> Result<Option<Checkpoint>, MonitorError> {
        let Some(index) = self.session.get(keys::SESSION_STATE).await? else {
            return Ok(None);
        };
        let entries: Vec<(String, CookieEvent)> =
            serde_json::from_value(index).storage_context(keys::SESSION_STATE)?;

        let pending = match self.session.get(keys::PENDING_QUEUE).await? {
            Some(queue) => serde_json::from_value(queue).storage_context(keys::PENDING_QUEUE)?,
            None => Vec::new(),
        };

        Ok(Some(Checkpoint { entries, pending }))
    }

    pub fn is_restored(&self) -> bool {
        self.restored.load(Ordering::SeqCst)
    }

    /// Allow the next [`restore`](Self::restore) to load again.
    pub fn invalidate(&self) {
        self.restored.store(false, Ordering::SeqCst);
    }
}
