//! Progress snapshot persistence
//!
//! A single durable row holding the last known batch progress. After a process
//! restart the snapshot is reported as-is (an interrupted batch is not
//! resumed); a batch found still marked active was cut short by the restart.

use crate::error::{Error, Result};
use crate::models::BatchProgress;
use chrono::Utc;
use sqlx::SqlitePool;

/// Replace the stored snapshot
pub async fn save_snapshot(db: &SqlitePool, progress: &BatchProgress) -> Result<()> {
    let json = serde_json::to_string(progress)
        .map_err(|e| Error::Internal(format!("Serialize progress failed: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO progress_snapshot (id, snapshot, updated_at)
        VALUES (1, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            snapshot = excluded.snapshot,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(json)
    .bind(Utc::now())
    .execute(db)
    .await?;

    Ok(())
}

/// Load the last stored snapshot, if any
pub async fn load_snapshot(db: &SqlitePool) -> Result<Option<BatchProgress>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT snapshot FROM progress_snapshot WHERE id = 1")
            .fetch_optional(db)
            .await?;

    row.map(|(json,)| {
        serde_json::from_str(&json)
            .map_err(|e| Error::Internal(format!("Corrupt progress snapshot: {}", e)))
    })
    .transpose()
}
