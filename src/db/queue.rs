//! Durable work queue
//!
//! FIFO of pending search items. Insertion dedups on identity key; a drain
//! atomically takes the whole queue so the batch total stays stable for
//! progress reporting. Queued-but-not-drained items survive a restart.

use crate::error::Result;
use crate::models::SearchItem;
use sqlx::SqlitePool;

/// Durable FIFO of pending search items
#[derive(Clone)]
pub struct WorkQueue {
    db: SqlitePool,
}

impl WorkQueue {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Enqueue items, silently skipping any whose identity key is already
    /// queued. Returns the count actually added.
    pub async fn enqueue(&self, items: &[SearchItem]) -> Result<usize> {
        let mut added = 0;
        let mut tx = self.db.begin().await?;

        for item in items {
            let result = sqlx::query(
                "INSERT OR IGNORE INTO work_queue (identity_key, artist, title, album)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(item.identity_key())
            .bind(&item.artist)
            .bind(&item.title)
            .bind(&item.album)
            .execute(&mut *tx)
            .await?;

            added += result.rows_affected() as usize;
        }

        tx.commit().await?;

        tracing::debug!(requested = items.len(), added, "Enqueued search items");
        Ok(added)
    }

    /// Atomically drain the entire queue in FIFO order.
    ///
    /// Concurrent enqueues land either entirely before or entirely after the
    /// drain; they are never split across it.
    pub async fn dequeue_all(&self) -> Result<Vec<SearchItem>> {
        let mut tx = self.db.begin().await?;

        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT artist, title, album FROM work_queue ORDER BY id ASC",
        )
        .fetch_all(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM work_queue").execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(rows
            .into_iter()
            .map(|(artist, title, album)| SearchItem { artist, title, album })
            .collect())
    }

    pub async fn size(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM work_queue")
            .fetch_one(&self.db)
            .await?;
        Ok(count as usize)
    }
}
