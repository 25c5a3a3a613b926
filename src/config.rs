//! Configuration for cratedigger
//!
//! Every tunable is an explicit, typed field with a documented default.
//! Resolution priority: compiled defaults → TOML config file → environment
//! variables (highest).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Search phrasing for query variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// "artist title" per track
    #[default]
    Track,
    /// "artist album" per track's album
    Album,
    /// "artist" only
    Artist,
}

/// Top-level settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub service: ServiceConfig,
    pub slskd: SlskdConfig,
    pub musicbrainz: MusicBrainzConfig,
    pub search: SearchConfig,
    pub scoring: ScoringConfig,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Bind address for the HTTP API
    pub listen_addr: String,
    /// Data directory holding the SQLite database
    pub data_dir: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:5735".to_string(),
            data_dir: default_data_dir(),
        }
    }
}

impl ServiceConfig {
    /// Path of the SQLite database inside the data directory
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("cratedigger.db")
    }
}

/// slskd connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlskdConfig {
    /// Base URL of the slskd instance
    pub url: String,
    /// API key (required for all slskd endpoints)
    pub api_key: String,
    /// URL base path prefix, normally "/"
    pub url_base: String,
}

impl Default for SlskdConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:5030".to_string(),
            api_key: String::new(),
            url_base: "/".to_string(),
        }
    }
}

/// MusicBrainz lookup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MusicBrainzConfig {
    /// Whether canonical metadata lookup is attempted at all
    pub enabled: bool,
    /// User agent sent with every request (required by MusicBrainz)
    pub user_agent: String,
    /// Minimum spacing between requests, shared across all workers
    pub min_request_interval_ms: u64,
}

impl Default for MusicBrainzConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            user_agent: format!(
                "cratedigger/{} (https://github.com/cratedigger/cratedigger)",
                env!("CARGO_PKG_VERSION")
            ),
            min_request_interval_ms: 1000,
        }
    }
}

/// Orchestration tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Concurrent item workers
    pub worker_count: usize,
    /// Default query phrasing
    pub mode: SearchMode,
    /// Fixed delay between search submit and fetch, while peer
    /// responses accumulate
    pub search_wait_secs: u64,
    /// Jitter window applied before each variant submission
    pub jitter_min_ms: u64,
    pub jitter_max_ms: u64,
    /// Attempts per query variant (submit→wait→fetch as one unit)
    pub max_attempts: u32,
    /// First backoff interval; doubles each retry
    pub backoff_base_secs: u64,
    /// Ranked results kept per track
    pub top_n: usize,
    /// Optional minimum-score cutoff applied after ranking
    pub min_score: Option<f64>,
    /// Separators that split a multi-artist credit into individual artists
    pub artist_separators: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            mode: SearchMode::Track,
            search_wait_secs: 5,
            jitter_min_ms: 500,
            jitter_max_ms: 3000,
            max_attempts: 3,
            backoff_base_secs: 1,
            top_n: 30,
            min_score: None,
            artist_separators: vec![",".to_string(), "&".to_string()],
        }
    }
}

/// Scoring thresholds and weights
///
/// Each field backs exactly one named scoring rule so the heuristics stay
/// auditable per rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Extensions rejected unconditionally (video containers)
    pub video_extensions: Vec<String>,
    /// Extensions treated as lossless audio
    pub lossless_extensions: Vec<String>,
    /// Version-indicator words penalized when present in the filename
    /// but absent from the requested title
    pub version_blacklist: Vec<String>,
    /// Hard ceiling on file size
    pub max_file_size_bytes: u64,
    /// Peer queue length at or above which an offer is rejected outright
    pub queue_hard_ceiling: u32,
    /// Peer queue length above which the step penalty applies
    pub queue_soft_threshold: u32,

    /// Penalty for a blacklisted version word
    pub blacklist_penalty: f64,
    /// Bonus when the requested title is a literal substring of the filename
    pub substring_bonus: f64,
    /// Similarity ratio tiers (edit-distance based, 0..1)
    pub similarity_high: f64,
    pub similarity_high_bonus: f64,
    pub similarity_medium: f64,
    pub similarity_medium_bonus: f64,
    pub similarity_low: f64,
    pub similarity_low_penalty: f64,

    /// Canonical duration bands, in seconds of absolute difference
    pub duration_perfect_secs: u32,
    pub duration_perfect_bonus: f64,
    pub duration_good_secs: u32,
    pub duration_good_bonus: f64,
    pub duration_acceptable_secs: u32,
    pub duration_acceptable_bonus: f64,
    pub duration_drift_secs: u32,
    pub duration_drift_penalty: f64,
    pub duration_outlier_penalty: f64,

    /// Canonical album containment bonuses
    pub album_match_bonus: f64,
    pub album_fuzzy_bonus: f64,
    pub album_fuzzy_threshold: f64,

    /// Format tiering: lossless, then bitrate thresholds in kbps
    pub lossless_bonus: f64,
    pub bitrate_high_kbps: u32,
    pub bitrate_high_bonus: f64,
    pub bitrate_medium_kbps: u32,
    pub bitrate_medium_bonus: f64,
    pub bitrate_low_penalty: f64,

    /// Availability step function
    pub free_slot_bonus: f64,
    pub short_queue_penalty: f64,
    pub long_queue_penalty: f64,

    /// Transfer speed tiers in KB/s
    pub speed_high_kbs: u32,
    pub speed_high_bonus: f64,
    pub speed_medium_kbs: u32,
    pub speed_medium_bonus: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            video_extensions: ["mkv", "mp4", "avi", "wmv", "mov", "flv", "webm", "mpg", "mpeg", "m4v"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            lossless_extensions: ["flac", "wav", "ape", "alac", "aiff", "aif"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            version_blacklist: ["instrumental", "karaoke", "cover", "live", "remix", "acapella"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_file_size_bytes: 500 * 1024 * 1024,
            queue_hard_ceiling: 25,
            queue_soft_threshold: 10,

            blacklist_penalty: -50.0,
            substring_bonus: 20.0,
            similarity_high: 0.80,
            similarity_high_bonus: 15.0,
            similarity_medium: 0.50,
            similarity_medium_bonus: 8.0,
            similarity_low: 0.25,
            similarity_low_penalty: -20.0,

            duration_perfect_secs: 2,
            duration_perfect_bonus: 25.0,
            duration_good_secs: 5,
            duration_good_bonus: 15.0,
            duration_acceptable_secs: 10,
            duration_acceptable_bonus: 5.0,
            duration_drift_secs: 30,
            duration_drift_penalty: -10.0,
            duration_outlier_penalty: -30.0,

            album_match_bonus: 15.0,
            album_fuzzy_bonus: 8.0,
            album_fuzzy_threshold: 0.70,

            lossless_bonus: 30.0,
            bitrate_high_kbps: 320,
            bitrate_high_bonus: 20.0,
            bitrate_medium_kbps: 192,
            bitrate_medium_bonus: 10.0,
            bitrate_low_penalty: -15.0,

            free_slot_bonus: 10.0,
            short_queue_penalty: -5.0,
            long_queue_penalty: -25.0,

            speed_high_kbs: 500,
            speed_high_bonus: 5.0,
            speed_medium_kbs: 100,
            speed_medium_bonus: 2.0,
        }
    }
}

/// Platform default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cratedigger"))
        .unwrap_or_else(|| PathBuf::from("./cratedigger_data"))
}

/// Platform default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cratedigger").join("config.toml"))
}

impl Settings {
    /// Load settings: defaults → TOML file (if present) → environment
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut settings = match config_path.map(Path::to_path_buf).or_else(default_config_path) {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(&path)
                    .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
                let settings: Settings = toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
                info!("Configuration loaded from {}", path.display());
                settings
            }
            _ => {
                info!("No config file found, using defaults");
                Settings::default()
            }
        };

        settings.apply_env();
        settings.validate()?;
        Ok(settings)
    }

    /// Environment variable overrides (highest priority)
    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("CRATEDIGGER_SLSKD_URL") {
            self.slskd.url = url;
        }
        if let Ok(key) = std::env::var("CRATEDIGGER_SLSKD_API_KEY") {
            self.slskd.api_key = key;
        }
        if let Ok(dir) = std::env::var("CRATEDIGGER_DATA_DIR") {
            self.service.data_dir = PathBuf::from(dir);
        }
        if let Ok(addr) = std::env::var("CRATEDIGGER_LISTEN_ADDR") {
            self.service.listen_addr = addr;
        }
    }

    /// Reject configurations that cannot work
    fn validate(&self) -> Result<()> {
        if self.search.worker_count == 0 {
            return Err(Error::Config("worker_count must be at least 1".to_string()));
        }
        if self.search.jitter_min_ms > self.search.jitter_max_ms {
            return Err(Error::Config(
                "jitter_min_ms must not exceed jitter_max_ms".to_string(),
            ));
        }
        if self.search.max_attempts == 0 {
            return Err(Error::Config("max_attempts must be at least 1".to_string()));
        }
        if self.scoring.queue_soft_threshold >= self.scoring.queue_hard_ceiling {
            return Err(Error::Config(
                "queue_soft_threshold must be below queue_hard_ceiling".to_string(),
            ));
        }
        if self.slskd.api_key.is_empty() {
            warn!("slskd API key not configured; peer searches will be rejected by slskd");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.search.worker_count, 4);
        assert_eq!(settings.search.top_n, 30);
        assert_eq!(settings.scoring.queue_hard_ceiling, 25);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [slskd]
            url = "http://10.0.0.2:5030"
            api_key = "secret"

            [search]
            worker_count = 5
            "#,
        )
        .unwrap();

        assert_eq!(settings.slskd.url, "http://10.0.0.2:5030");
        assert_eq!(settings.search.worker_count, 5);
        // Untouched sections keep their defaults
        assert_eq!(settings.search.search_wait_secs, 5);
        assert_eq!(settings.scoring.bitrate_high_kbps, 320);
    }

    #[test]
    fn test_invalid_jitter_window_rejected() {
        let mut settings = Settings::default();
        settings.search.jitter_min_ms = 5000;
        settings.search.jitter_max_ms = 500;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_queue_thresholds_ordering_enforced() {
        let mut settings = Settings::default();
        settings.scoring.queue_soft_threshold = 30;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_search_mode_roundtrip() {
        let mode: SearchMode = serde_json::from_str("\"album\"").unwrap();
        assert_eq!(mode, SearchMode::Album);
        assert_eq!(serde_json::to_string(&SearchMode::Track).unwrap(), "\"track\"");
    }

    #[test]
    fn test_load_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
            [service]
            listen_addr = "0.0.0.0:9000"

            [musicbrainz]
            enabled = false
            "#,
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.service.listen_addr, "0.0.0.0:9000");
        assert!(!settings.musicbrainz.enabled);
        assert_eq!(settings.search.worker_count, 4);
    }
}
