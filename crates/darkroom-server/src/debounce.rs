//! Per-key debounce scheduling for burst collapsing.
//!
//! The remote store delivers bursts of change events for a single user
//! action (uploading 50 photos fires many individual events). Each event
//! reschedules the pending work for its folder; the work runs once, a quiet
//! period after the *last* event.
//!
//! The pending map is process-local. Under multi-instance deployment each
//! instance debounces independently, which can produce redundant
//! invalidation calls; invalidation is idempotent, so redundant calls are
//! safe, merely wasteful.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::AbortHandle;

struct Pending {
    seq: u64,
    handle: AbortHandle,
}

/// Collapses bursts of events per key into a single deferred execution.
///
/// Invariant: at most one pending entry per key. Scheduling under a key
/// that already has pending work cancels the old timer and restarts the
/// quiet period, rather than stacking a second execution.
pub struct Debouncer {
    quiet_period: Duration,
    pending: Arc<DashMap<String, Pending>>,
    seq: AtomicU64,
}

impl Debouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            pending: Arc::new(DashMap::new()),
            seq: AtomicU64::new(0),
        }
    }

    /// Schedule `work` to run one quiet period from now, cancelling any
    /// previously scheduled work for the same key.
    ///
    /// The deferred work has no caller left to report to: errors are logged
    /// under the key and absorbed.
    pub fn schedule<F, Fut>(&self, key: &str, work: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send,
    {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let quiet_period = self.quiet_period;
        let pending = Arc::clone(&self.pending);
        let task_key = key.to_string();

        let task = tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;

            // Release the slot before running. Match on seq so a task that
            // was superseded after firing cannot remove the newer entry.
            pending.remove_if(&task_key, |_, p| p.seq == seq);

            if let Err(e) = work().await {
                tracing::error!(key = %task_key, error = %e, "deferred work failed");
            }
        });

        let entry = Pending {
            seq,
            handle: task.abort_handle(),
        };
        if let Some(prev) = self.pending.insert(key.to_string(), entry) {
            prev.handle.abort();
            tracing::debug!(key = %key, "debounce timer rescheduled");
        } else {
            tracing::debug!(key = %key, quiet_ms = quiet_period.as_millis() as u64, "debounce timer scheduled");
        }
    }

    /// Number of keys with pending work.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}
