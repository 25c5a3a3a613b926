//! Result store
//!
//! Flat, identity-keyed storage of ranked track records. The album-grouped
//! view is computed at read time so there is only one source of truth.

use crate::error::{Error, Result};
use crate::models::{AlbumGroup, CanonicalMetadata, PeerFileOffer, TrackRecord};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;

/// Store-wide statistics for the dashboard
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_tracks: usize,
    pub tracks_with_results: usize,
    pub reviewed_tracks: usize,
    pub total_offers: usize,
}

/// Durable, keyed storage of ranked results
#[derive(Clone)]
pub struct ResultStore {
    db: SqlitePool,
}

type TrackRow = (String, String, String, DateTime<Utc>, bool, String, Option<String>);

impl ResultStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert or fully replace the record for an identity key.
    ///
    /// Re-search overwrites; it does not merge.
    pub async fn upsert(&self, record: &TrackRecord) -> Result<()> {
        let results_json = serde_json::to_string(&record.results)
            .map_err(|e| Error::Internal(format!("Serialize results failed: {}", e)))?;
        let canonical_json = record
            .canonical
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| Error::Internal(format!("Serialize canonical metadata failed: {}", e)))?;

        sqlx::query(
            r#"
            INSERT INTO track_records (identity_key, artist, title, album, searched_at, reviewed, results, canonical)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(identity_key) DO UPDATE SET
                artist = excluded.artist,
                title = excluded.title,
                album = excluded.album,
                searched_at = excluded.searched_at,
                reviewed = excluded.reviewed,
                results = excluded.results,
                canonical = excluded.canonical
            "#,
        )
        .bind(record.identity_key())
        .bind(&record.artist)
        .bind(&record.title)
        .bind(&record.album)
        .bind(record.searched_at)
        .bind(record.reviewed)
        .bind(results_json)
        .bind(canonical_json)
        .execute(&self.db)
        .await?;

        tracing::debug!(
            key = %record.identity_key(),
            results = record.results.len(),
            "Track record saved"
        );
        Ok(())
    }

    pub async fn get(&self, identity_key: &str) -> Result<Option<TrackRecord>> {
        let row: Option<TrackRow> = sqlx::query_as(
            "SELECT artist, title, album, searched_at, reviewed, results, canonical
             FROM track_records WHERE identity_key = ?",
        )
        .bind(identity_key)
        .fetch_optional(&self.db)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    /// Delete a record; returns whether it existed
    pub async fn delete(&self, identity_key: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM track_records WHERE identity_key = ?")
            .bind(identity_key)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark a record reviewed; returns whether it existed
    pub async fn set_reviewed(&self, identity_key: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE track_records SET reviewed = 1 WHERE identity_key = ?")
            .bind(identity_key)
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn contains(&self, identity_key: &str) -> Result<bool> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM track_records WHERE identity_key = ?")
                .bind(identity_key)
                .fetch_one(&self.db)
                .await?;
        Ok(count > 0)
    }

    /// Album-grouped view, computed from the flat store.
    ///
    /// Grouping key prefers the canonical album over the caller-supplied one.
    /// Groups are ordered by (artist, album).
    pub async fn grouped_by_album(&self) -> Result<Vec<AlbumGroup>> {
        let rows: Vec<TrackRow> = sqlx::query_as(
            "SELECT artist, title, album, searched_at, reviewed, results, canonical
             FROM track_records",
        )
        .fetch_all(&self.db)
        .await?;

        let mut groups: BTreeMap<(String, String), AlbumGroup> = BTreeMap::new();
        for row in rows {
            let record = Self::row_to_record(row)?;
            let key = (record.artist.clone(), record.grouping_album());
            let group = groups.entry(key.clone()).or_insert_with(|| AlbumGroup {
                artist: key.0,
                album_name: key.1,
                tracks: BTreeMap::new(),
            });
            group.tracks.insert(record.title.clone(), record);
        }

        Ok(groups.into_values().collect())
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let rows: Vec<(bool, String)> =
            sqlx::query_as("SELECT reviewed, results FROM track_records")
                .fetch_all(&self.db)
                .await?;

        let mut stats = StoreStats {
            total_tracks: rows.len(),
            tracks_with_results: 0,
            reviewed_tracks: 0,
            total_offers: 0,
        };
        for (reviewed, results_json) in rows {
            let results: Vec<PeerFileOffer> = serde_json::from_str(&results_json)
                .map_err(|e| Error::Internal(format!("Corrupt results JSON: {}", e)))?;
            if !results.is_empty() {
                stats.tracks_with_results += 1;
            }
            if reviewed {
                stats.reviewed_tracks += 1;
            }
            stats.total_offers += results.len();
        }
        Ok(stats)
    }

    fn row_to_record(row: TrackRow) -> Result<TrackRecord> {
        let (artist, title, album, searched_at, reviewed, results_json, canonical_json) = row;

        let results: Vec<PeerFileOffer> = serde_json::from_str(&results_json)
            .map_err(|e| Error::Internal(format!("Corrupt results JSON: {}", e)))?;
        let canonical: Option<CanonicalMetadata> = canonical_json
            .map(|json| serde_json::from_str(&json))
            .transpose()
            .map_err(|e| Error::Internal(format!("Corrupt canonical JSON: {}", e)))?;

        Ok(TrackRecord {
            artist,
            title,
            album,
            searched_at,
            reviewed,
            results,
            canonical,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn offer(peer: &str, score: f64) -> PeerFileOffer {
        PeerFileOffer {
            peer_id: peer.to_string(),
            filename: format!("{}\\track.flac", peer),
            size_bytes: 1000,
            bitrate_kbps: 1000,
            file_extension: "flac".to_string(),
            queue_length: 0,
            upload_speed_kbs: 200,
            has_free_slot: true,
            is_locked: false,
            duration_seconds: Some(210),
            quality_score: score,
        }
    }

    fn record(artist: &str, title: &str, album: &str, canonical_album: Option<&str>) -> TrackRecord {
        TrackRecord {
            artist: artist.to_string(),
            title: title.to_string(),
            album: album.to_string(),
            searched_at: Utc::now(),
            reviewed: false,
            results: vec![offer("peer1", 55.0)],
            canonical: canonical_album.map(|a| CanonicalMetadata {
                recording_id: format!("mbid-{}", title),
                isrc: None,
                duration_ms: Some(210_000),
                canonical_album: Some(a.to_string()),
                canonical_artist: artist.to_string(),
                match_score: 100,
            }),
        }
    }

    #[tokio::test]
    async fn test_upsert_and_get_roundtrip() {
        let store = ResultStore::new(test_pool().await);
        let rec = record("Artist", "Song", "Album", Some("Album"));

        store.upsert(&rec).await.unwrap();
        let loaded = store.get("Artist - Song").await.unwrap().unwrap();

        assert_eq!(loaded.artist, "Artist");
        assert_eq!(loaded.results.len(), 1);
        assert_eq!(loaded.canonical.as_ref().unwrap().recording_id, "mbid-Song");
    }

    #[tokio::test]
    async fn test_upsert_replaces_prior_record() {
        let store = ResultStore::new(test_pool().await);

        store.upsert(&record("Artist", "Song", "Album", None)).await.unwrap();

        let mut fresh = record("Artist", "Song", "Album", None);
        fresh.results = vec![offer("peer2", 70.0), offer("peer3", 60.0)];
        store.upsert(&fresh).await.unwrap();

        let loaded = store.get("Artist - Song").await.unwrap().unwrap();
        assert_eq!(loaded.results.len(), 2);
        assert_eq!(loaded.results[0].peer_id, "peer2");
    }

    #[tokio::test]
    async fn test_delete_and_missing_get() {
        let store = ResultStore::new(test_pool().await);
        store.upsert(&record("Artist", "Song", "", None)).await.unwrap();

        assert!(store.delete("Artist - Song").await.unwrap());
        assert!(!store.delete("Artist - Song").await.unwrap());
        assert!(store.get("Artist - Song").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_grouped_by_album_uses_canonical_name() {
        let store = ResultStore::new(test_pool().await);

        // Inconsistent caller album naming, same canonical release
        store
            .upsert(&record("Artist", "Song One", "hypnotize (deluxe)", Some("Hypnotize")))
            .await
            .unwrap();
        store
            .upsert(&record("Artist", "Song Two", "HYPNOTIZE", Some("Hypnotize")))
            .await
            .unwrap();
        store
            .upsert(&record("Other", "Song Three", "", None))
            .await
            .unwrap();

        let groups = store.grouped_by_album().await.unwrap();
        assert_eq!(groups.len(), 2);

        let hypnotize = groups.iter().find(|g| g.album_name == "Hypnotize").unwrap();
        assert_eq!(hypnotize.tracks.len(), 2);

        let unknown = groups.iter().find(|g| g.artist == "Other").unwrap();
        assert_eq!(unknown.album_name, "Unknown Album");
    }

    #[tokio::test]
    async fn test_set_reviewed_and_stats() {
        let store = ResultStore::new(test_pool().await);
        store.upsert(&record("Artist", "Song", "", None)).await.unwrap();

        let mut empty = record("Artist", "Empty", "", None);
        empty.results.clear();
        store.upsert(&empty).await.unwrap();

        assert!(store.set_reviewed("Artist - Song").await.unwrap());
        assert!(!store.set_reviewed("Nobody - Nothing").await.unwrap());

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_tracks, 2);
        assert_eq!(stats.tracks_with_results, 1);
        assert_eq!(stats.reviewed_tracks, 1);
        assert_eq!(stats.total_offers, 1);
    }
}
