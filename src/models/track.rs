//! Persisted track records, album grouping, and download ledger entries

use crate::models::PeerFileOffer;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical recording metadata from MusicBrainz
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMetadata {
    /// MusicBrainz recording MBID; the duplicate-detection key
    pub recording_id: String,
    pub isrc: Option<String>,
    pub duration_ms: Option<u64>,
    pub canonical_album: Option<String>,
    pub canonical_artist: String,
    /// MusicBrainz match confidence, 0-100
    pub match_score: u32,
}

/// Ranked search results for one track, owned by the result store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRecord {
    pub artist: String,
    pub title: String,
    pub album: String,
    pub searched_at: DateTime<Utc>,
    pub reviewed: bool,
    /// Sorted by quality score descending, length bounded by top-N
    pub results: Vec<PeerFileOffer>,
    pub canonical: Option<CanonicalMetadata>,
}

impl TrackRecord {
    pub fn identity_key(&self) -> String {
        if self.title.is_empty() {
            self.artist.clone()
        } else {
            format!("{} - {}", self.artist, self.title)
        }
    }

    /// Album name used for grouping: canonical metadata's album wins over the
    /// caller-supplied album so tracks of the same release group together even
    /// with inconsistent input naming.
    pub fn grouping_album(&self) -> String {
        self.canonical
            .as_ref()
            .and_then(|c| c.canonical_album.clone())
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| {
                if self.album.is_empty() {
                    "Unknown Album".to_string()
                } else {
                    self.album.clone()
                }
            })
    }
}

/// Read-time grouping of track records under (artist, album)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumGroup {
    pub artist: String,
    pub album_name: String,
    /// Keyed by track title for stable ordering
    pub tracks: BTreeMap<String, TrackRecord>,
}

/// One successful download initiation; append-only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub recording_id: Option<String>,
    pub artist: String,
    pub title: String,
    pub filename: String,
    pub peer_id: String,
    pub downloaded_at: DateTime<Utc>,
}
