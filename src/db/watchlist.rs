//! Watchlist for offers queued behind other downloads
//!
//! When the best remaining offer for a track sits in a peer's upload queue,
//! the item is parked here for a later re-check instead of being forgotten.

use crate::error::Result;
use crate::models::SearchItem;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

/// A track whose best offer was queued at search time
#[derive(Debug, Clone, Serialize)]
pub struct WatchlistEntry {
    pub item: SearchItem,
    pub best_peer: String,
    pub queue_length: u32,
    pub added_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct Watchlist {
    db: SqlitePool,
}

impl Watchlist {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Register (or refresh) an entry for an item
    pub async fn register(&self, item: &SearchItem, best_peer: &str, queue_length: u32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO watchlist (identity_key, artist, title, album, best_peer, queue_length, added_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(identity_key) DO UPDATE SET
                best_peer = excluded.best_peer,
                queue_length = excluded.queue_length,
                added_at = excluded.added_at
            "#,
        )
        .bind(item.identity_key())
        .bind(&item.artist)
        .bind(&item.title)
        .bind(&item.album)
        .bind(best_peer)
        .bind(queue_length)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        tracing::debug!(key = %item.identity_key(), best_peer, queue_length, "Watchlist entry registered");
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<WatchlistEntry>> {
        let rows: Vec<(String, String, String, String, u32, DateTime<Utc>)> = sqlx::query_as(
            "SELECT artist, title, album, best_peer, queue_length, added_at
             FROM watchlist ORDER BY added_at ASC",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(artist, title, album, best_peer, queue_length, added_at)| WatchlistEntry {
                item: SearchItem { artist, title, album },
                best_peer,
                queue_length,
                added_at,
            })
            .collect())
    }

    /// Remove an entry; returns whether it existed
    pub async fn remove(&self, identity_key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM watchlist WHERE identity_key = ?")
            .bind(identity_key)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_register_list_remove() {
        let watchlist = Watchlist::new(test_pool().await);
        let item = SearchItem::new("Artist", "Song", "");

        watchlist.register(&item, "peer1", 3).await.unwrap();

        let entries = watchlist.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].best_peer, "peer1");
        assert_eq!(entries[0].queue_length, 3);

        assert!(watchlist.remove("Artist - Song").await.unwrap());
        assert!(watchlist.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reregister_refreshes_entry() {
        let watchlist = Watchlist::new(test_pool().await);
        let item = SearchItem::new("Artist", "Song", "");

        watchlist.register(&item, "peer1", 7).await.unwrap();
        watchlist.register(&item, "peer2", 1).await.unwrap();

        let entries = watchlist.list().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].best_peer, "peer2");
        assert_eq!(entries[0].queue_length, 1);
    }
}
