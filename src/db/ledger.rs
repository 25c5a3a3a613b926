//! Duplicate-download ledger
//!
//! Append-only history of download initiations, keyed by MusicBrainz recording
//! id where one is known. A track without a recording id can never be flagged
//! as a duplicate; availability wins over over-blocking.

use crate::error::Result;
use crate::models::DownloadRecord;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

/// Ledger statistics
#[derive(Debug, Clone, Serialize)]
pub struct LedgerStats {
    pub total_downloads: usize,
    pub with_recording_id: usize,
    pub without_recording_id: usize,
}

/// Outcome of recording a download
#[derive(Debug)]
pub enum RecordOutcome {
    /// New ledger row written
    Recorded(DownloadRecord),
    /// This recording id was already downloaded; prior record returned
    AlreadyDownloaded(DownloadRecord),
}

/// Durable map from recording id to prior download
#[derive(Clone)]
pub struct DownloadLedger {
    db: SqlitePool,
}

type LedgerRow = (Option<String>, String, String, String, String, DateTime<Utc>);

impl DownloadLedger {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// A missing recording id is never a duplicate
    pub async fn is_duplicate(&self, recording_id: Option<&str>) -> Result<bool> {
        match recording_id {
            None => Ok(false),
            Some(id) => Ok(self.lookup(id).await?.is_some()),
        }
    }

    pub async fn lookup(&self, recording_id: &str) -> Result<Option<DownloadRecord>> {
        let row: Option<LedgerRow> = sqlx::query_as(
            "SELECT recording_id, artist, title, filename, peer_id, downloaded_at
             FROM downloads WHERE recording_id = ?",
        )
        .bind(recording_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Self::row_to_record))
    }

    /// Record a download initiation.
    ///
    /// A null recording id is still recorded for audit but contributes no
    /// future duplicate-detection power. A known recording id that already
    /// exists is not inserted twice; the prior record is returned instead.
    pub async fn record_download(
        &self,
        recording_id: Option<&str>,
        artist: &str,
        title: &str,
        filename: &str,
        peer_id: &str,
    ) -> Result<RecordOutcome> {
        if let Some(id) = recording_id {
            if let Some(prior) = self.lookup(id).await? {
                tracing::info!(
                    recording_id = %id,
                    prior_artist = %prior.artist,
                    prior_title = %prior.title,
                    downloaded_at = %prior.downloaded_at,
                    "Duplicate download suppressed"
                );
                return Ok(RecordOutcome::AlreadyDownloaded(prior));
            }
        }

        let record = DownloadRecord {
            recording_id: recording_id.map(str::to_string),
            artist: artist.to_string(),
            title: title.to_string(),
            filename: filename.to_string(),
            peer_id: peer_id.to_string(),
            downloaded_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO downloads (recording_id, artist, title, filename, peer_id, downloaded_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.recording_id)
        .bind(&record.artist)
        .bind(&record.title)
        .bind(&record.filename)
        .bind(&record.peer_id)
        .bind(record.downloaded_at)
        .execute(&self.db)
        .await?;

        tracing::info!(
            artist = %artist,
            title = %title,
            recording_id = ?recording_id,
            "Download recorded"
        );
        Ok(RecordOutcome::Recorded(record))
    }

    pub async fn all_downloads(&self) -> Result<Vec<DownloadRecord>> {
        let rows: Vec<LedgerRow> = sqlx::query_as(
            "SELECT recording_id, artist, title, filename, peer_id, downloaded_at
             FROM downloads ORDER BY id ASC",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Self::row_to_record).collect())
    }

    pub async fn stats(&self) -> Result<LedgerStats> {
        let (total, with_id): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COUNT(recording_id) FROM downloads",
        )
        .fetch_one(&self.db)
        .await?;

        Ok(LedgerStats {
            total_downloads: total as usize,
            with_recording_id: with_id as usize,
            without_recording_id: (total - with_id) as usize,
        })
    }

    fn row_to_record(row: LedgerRow) -> DownloadRecord {
        let (recording_id, artist, title, filename, peer_id, downloaded_at) = row;
        DownloadRecord {
            recording_id,
            artist,
            title,
            filename,
            peer_id,
            downloaded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    #[tokio::test]
    async fn test_null_recording_id_is_never_duplicate() {
        let ledger = DownloadLedger::new(test_pool().await);

        assert!(!ledger.is_duplicate(None).await.unwrap());

        ledger
            .record_download(None, "Artist", "Song", "a/song.mp3", "peer")
            .await
            .unwrap();

        // Recorded for audit, but still undetectable
        assert!(!ledger.is_duplicate(None).await.unwrap());
        assert_eq!(ledger.all_downloads().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_record_then_detect_duplicate() {
        let ledger = DownloadLedger::new(test_pool().await);

        assert!(!ledger.is_duplicate(Some("mbid-1")).await.unwrap());

        let outcome = ledger
            .record_download(Some("mbid-1"), "Artist", "Song", "a/song.flac", "peer")
            .await
            .unwrap();
        assert!(matches!(outcome, RecordOutcome::Recorded(_)));

        assert!(ledger.is_duplicate(Some("mbid-1")).await.unwrap());
        let prior = ledger.lookup("mbid-1").await.unwrap().unwrap();
        assert_eq!(prior.title, "Song");
    }

    #[tokio::test]
    async fn test_second_record_for_same_recording_id_is_suppressed() {
        let ledger = DownloadLedger::new(test_pool().await);

        ledger
            .record_download(Some("mbid-1"), "Artist", "Song", "a/song.flac", "peer1")
            .await
            .unwrap();
        let outcome = ledger
            .record_download(Some("mbid-1"), "Artist", "Song (re-rip)", "b/song.flac", "peer2")
            .await
            .unwrap();

        match outcome {
            RecordOutcome::AlreadyDownloaded(prior) => assert_eq!(prior.peer_id, "peer1"),
            RecordOutcome::Recorded(_) => panic!("duplicate recording id must not append"),
        }
        assert_eq!(ledger.all_downloads().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_stats_split_by_recording_id_presence() {
        let ledger = DownloadLedger::new(test_pool().await);

        ledger
            .record_download(Some("mbid-1"), "A", "One", "f1", "p")
            .await
            .unwrap();
        ledger.record_download(None, "B", "Two", "f2", "p").await.unwrap();
        ledger.record_download(None, "C", "Three", "f3", "p").await.unwrap();

        let stats = ledger.stats().await.unwrap();
        assert_eq!(stats.total_downloads, 3);
        assert_eq!(stats.with_recording_id, 1);
        assert_eq!(stats.without_recording_id, 2);
    }
}
