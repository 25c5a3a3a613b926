//! Peer file offers

use serde::{Deserialize, Serialize};

/// A file made available by one peer in response to a search query.
///
/// Ephemeral until scored and merged into a [`crate::models::TrackRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerFileOffer {
    /// Peer identity (slskd username)
    pub peer_id: String,
    /// Full remote path as reported by the peer
    pub filename: String,
    pub size_bytes: u64,
    pub bitrate_kbps: u32,
    /// Lowercased extension without the dot
    pub file_extension: String,
    /// Position this download would take in the peer's upload queue
    pub queue_length: u32,
    /// Reported upload speed in KB/s
    pub upload_speed_kbs: u32,
    pub has_free_slot: bool,
    /// Peer requires a password or private share access
    pub is_locked: bool,
    /// Reported audio duration, when the peer's client supplies one
    pub duration_seconds: Option<u32>,
    /// Computed by the scoring engine; 0 until scored
    #[serde(default)]
    pub quality_score: f64,
}

impl PeerFileOffer {
    /// Filename stem: final path component without its extension
    pub fn stem(&self) -> &str {
        let base = self
            .filename
            .rsplit(['\\', '/'])
            .next()
            .unwrap_or(&self.filename);
        match base.rfind('.') {
            Some(idx) if idx > 0 => &base[..idx],
            _ => base,
        }
    }
}
