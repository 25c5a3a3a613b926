//! Shared batch progress state
//!
//! One tracker instance is owned by the application state and shared between
//! the orchestrator (writer) and status-polling callers (readers). All
//! mutation happens under a single lock so readers never observe a torn
//! update. Every mutation also persists a snapshot; because the full snapshot
//! is rewritten each time, a failed write is repaired by the next successful
//! one.

use crate::db::progress as progress_db;
use crate::models::BatchProgress;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Shared, durable progress state for the running (or last) batch
#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<Mutex<BatchProgress>>,
    cancel: Arc<Mutex<CancellationToken>>,
    db: SqlitePool,
}

impl ProgressTracker {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BatchProgress::default())),
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
            db,
        }
    }

    /// Restore the last persisted snapshot (used at startup for reporting)
    pub async fn restore(&self) {
        match progress_db::load_snapshot(&self.db).await {
            Ok(Some(mut snapshot)) => {
                // A batch that was active when the process died did not survive it
                if snapshot.active {
                    snapshot.active = false;
                    snapshot.current_label.clear();
                }
                *self.inner.lock().await = snapshot;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "Failed to restore progress snapshot"),
        }
    }

    /// Reset for a new batch of `total` items and hand out its cancellation
    /// token. Returns `None` if a batch is already active.
    pub async fn begin(&self, total: usize) -> Option<CancellationToken> {
        let mut inner = self.inner.lock().await;
        if inner.active {
            return None;
        }
        *inner = BatchProgress::begin(total);
        self.persist(&inner).await;

        let token = CancellationToken::new();
        *self.cancel.lock().await = token.clone();
        Some(token)
    }

    /// Point-in-time copy for status callers
    pub async fn snapshot(&self) -> BatchProgress {
        self.inner.lock().await.clone()
    }

    pub async fn set_current(&self, label: &str) {
        let mut inner = self.inner.lock().await;
        inner.current_label = label.to_string();
        self.persist(&inner).await;
    }

    /// Mark one item finished; monotonic and capped at total
    pub async fn item_completed(&self) {
        let mut inner = self.inner.lock().await;
        if inner.completed < inner.total {
            inner.completed += 1;
        }
        self.persist(&inner).await;
    }

    pub async fn record_error(&self, message: String) {
        let mut inner = self.inner.lock().await;
        inner.errors.push(message);
        self.persist(&inner).await;
    }

    /// Terminal update at the end of a batch run
    pub async fn finish(&self) {
        let mut inner = self.inner.lock().await;
        inner.active = false;
        inner.finished = true;
        inner.current_label.clear();
        self.persist(&inner).await;
    }

    /// Request cooperative cancellation of the active batch
    pub async fn request_cancel(&self) {
        self.cancel.lock().await.cancel();
        let mut inner = self.inner.lock().await;
        inner.cancelled = true;
        self.persist(&inner).await;
    }

    async fn persist(&self, progress: &BatchProgress) {
        // Write failure is an operator concern, not a caller one; the in-memory
        // state stays authoritative and the next write carries the full state.
        if let Err(e) = progress_db::save_snapshot(&self.db, progress).await {
            tracing::error!(error = %e, "Failed to persist progress snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_begin_rejects_concurrent_batch() {
        let tracker = ProgressTracker::new(test_pool().await);

        assert!(tracker.begin(5).await.is_some());
        assert!(tracker.begin(3).await.is_none());

        tracker.finish().await;
        assert!(tracker.begin(3).await.is_some());
    }

    #[tokio::test]
    async fn test_completed_is_monotonic_and_capped() {
        let tracker = ProgressTracker::new(test_pool().await);
        tracker.begin(2).await.unwrap();

        tracker.item_completed().await;
        tracker.item_completed().await;
        tracker.item_completed().await; // over-count attempt

        let snap = tracker.snapshot().await;
        assert_eq!(snap.completed, 2);
        assert_eq!(snap.total, 2);
    }

    #[tokio::test]
    async fn test_cancel_sets_flag_and_trips_token() {
        let tracker = ProgressTracker::new(test_pool().await);
        let token = tracker.begin(4).await.unwrap();

        assert!(!token.is_cancelled());
        tracker.request_cancel().await;

        assert!(token.is_cancelled());
        assert!(tracker.snapshot().await.cancelled);
    }

    #[tokio::test]
    async fn test_restore_clears_stale_active_flag() {
        let pool = test_pool().await;

        // Simulate a process that died mid-batch
        let tracker = ProgressTracker::new(pool.clone());
        tracker.begin(8).await.unwrap();
        tracker.item_completed().await;

        let restarted = ProgressTracker::new(pool);
        restarted.restore().await;

        let snap = restarted.snapshot().await;
        assert!(!snap.active);
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.total, 8);
    }
}
