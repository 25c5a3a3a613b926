//! SQLite persistence for cratedigger
//!
//! One database file holds the work queue, track records, download ledger,
//! watchlist, and the last progress snapshot. Each concern gets its own module
//! over the shared pool.

pub mod ledger;
pub mod progress;
pub mod queue;
pub mod results;
pub mod watchlist;

pub use ledger::{DownloadLedger, LedgerStats, RecordOutcome};
pub use queue::WorkQueue;
pub use results::{ResultStore, StoreStats};
pub use watchlist::{Watchlist, WatchlistEntry};

use crate::error::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool and run table migrations
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Create tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS work_queue (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            identity_key TEXT NOT NULL UNIQUE,
            artist TEXT NOT NULL,
            title TEXT NOT NULL,
            album TEXT NOT NULL DEFAULT '',
            enqueued_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS track_records (
            identity_key TEXT PRIMARY KEY,
            artist TEXT NOT NULL,
            title TEXT NOT NULL,
            album TEXT NOT NULL DEFAULT '',
            searched_at TEXT NOT NULL,
            reviewed INTEGER NOT NULL DEFAULT 0,
            results TEXT NOT NULL DEFAULT '[]',
            canonical TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS downloads (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            recording_id TEXT,
            artist TEXT NOT NULL,
            title TEXT NOT NULL,
            filename TEXT NOT NULL,
            peer_id TEXT NOT NULL,
            downloaded_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // At most one ledger row per known recording; NULL ids may repeat
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_downloads_recording
         ON downloads (recording_id) WHERE recording_id IS NOT NULL",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS watchlist (
            identity_key TEXT PRIMARY KEY,
            artist TEXT NOT NULL,
            title TEXT NOT NULL,
            album TEXT NOT NULL DEFAULT '',
            best_peer TEXT NOT NULL,
            queue_length INTEGER NOT NULL,
            added_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS progress_snapshot (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            snapshot TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!(
        "Database tables initialized (work_queue, track_records, downloads, watchlist, progress_snapshot)"
    );

    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    let pool = SqlitePool::connect(":memory:").await.unwrap();
    init_tables(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[tokio::test]
    async fn test_init_creates_parent_directory_and_database() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("cratedigger.db");

        let pool = init_database_pool(&db_path).await.unwrap();
        assert!(db_path.exists());
        pool.close().await;
    }

    #[tokio::test]
    async fn test_init_reports_io_error_when_parent_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        // create_dir_all cannot make a directory where a file already sits
        let err = init_database_pool(&blocker.join("cratedigger.db"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
