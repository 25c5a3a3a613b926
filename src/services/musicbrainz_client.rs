//! MusicBrainz metadata lookup
//!
//! Resolves a search item to canonical recording metadata (MBID, ISRC,
//! duration, album) via the MusicBrainz recording search API. Requests are
//! rate limited to one per `min_request_interval_ms` across all callers.
//!
//! Lookup is best effort: upstream failures and empty result sets come back
//! as `Ok(None)` so a MusicBrainz outage never blocks the search pipeline.

use crate::config::MusicBrainzConfig;
use crate::models::{CanonicalMetadata, SearchItem};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;

const MUSICBRAINZ_BASE_URL: &str = "https://musicbrainz.org/ws/2";
const SEARCH_LIMIT: u32 = 5;

/// MusicBrainz client errors
#[derive(Debug, Error)]
pub enum MBError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Seam for canonical metadata lookup, mockable in orchestrator tests.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Resolve an item to canonical metadata. `None` when no confident match
    /// exists or the upstream is unavailable.
    async fn resolve(&self, item: &SearchItem) -> Option<CanonicalMetadata>;
}

/// Rate limiter enforcing a minimum interval between requests
struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
        }
    }

    /// Wait if necessary to comply with rate limit
    async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                tracing::debug!("Rate limiting: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}

// Recording search response subset

#[derive(Debug, Deserialize)]
struct MBSearchResponse {
    #[serde(default)]
    recordings: Vec<MBRecording>,
}

#[derive(Debug, Deserialize)]
struct MBRecording {
    id: String,
    #[serde(default)]
    score: u32,
    /// Recording length in milliseconds
    length: Option<u64>,
    #[serde(rename = "artist-credit", default)]
    artist_credit: Vec<MBArtistCredit>,
    #[serde(default)]
    isrcs: Vec<String>,
    #[serde(default)]
    releases: Vec<MBRelease>,
}

#[derive(Debug, Deserialize)]
struct MBArtistCredit {
    name: String,
}

#[derive(Debug, Deserialize)]
struct MBRelease {
    title: String,
}

/// MusicBrainz API client
pub struct MusicBrainzClient {
    http_client: reqwest::Client,
    rate_limiter: Arc<RateLimiter>,
    base_url: String,
}

impl MusicBrainzClient {
    pub fn new(config: &MusicBrainzConfig) -> Result<Self, MBError> {
        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| MBError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(config.min_request_interval_ms)),
            base_url: MUSICBRAINZ_BASE_URL.to_string(),
        })
    }

    /// Search for a recording by artist, title, and optional album.
    pub async fn search_recording(&self, item: &SearchItem) -> Result<Option<CanonicalMetadata>, MBError> {
        // Rate limit
        self.rate_limiter.wait().await;

        let mut query = format!(
            "artist:\"{}\" AND recording:\"{}\"",
            escape_lucene(&item.artist),
            escape_lucene(&item.title)
        );
        if !item.album.is_empty() {
            query.push_str(&format!(" AND release:\"{}\"", escape_lucene(&item.album)));
        }

        let url = format!("{}/recording", self.base_url);

        tracing::debug!(query = %query, "Querying MusicBrainz recording search");

        let limit = SEARCH_LIMIT.to_string();
        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("query", query.as_str()),
                ("limit", limit.as_str()),
                ("fmt", "json"),
            ])
            .send()
            .await
            .map_err(|e| MBError::NetworkError(e.to_string()))?;

        let status = response.status();

        if status == 503 {
            return Err(MBError::RateLimitExceeded);
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MBError::ApiError(status.as_u16(), error_text));
        }

        let body: MBSearchResponse = response
            .json()
            .await
            .map_err(|e| MBError::ParseError(e.to_string()))?;

        Ok(extract_best_match(body))
    }
}

/// Pick the highest-score candidate and flatten it to canonical metadata.
fn extract_best_match(body: MBSearchResponse) -> Option<CanonicalMetadata> {
    let best = body.recordings.into_iter().max_by_key(|r| r.score)?;

    let canonical_artist = best
        .artist_credit
        .first()
        .map(|c| c.name.clone())
        .unwrap_or_default();

    Some(CanonicalMetadata {
        recording_id: best.id,
        isrc: best.isrcs.into_iter().next(),
        duration_ms: best.length,
        canonical_album: best.releases.into_iter().next().map(|r| r.title),
        canonical_artist,
        match_score: best.score,
    })
}

/// Escape characters with meaning in Lucene query syntax.
fn escape_lucene(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(
            ch,
            '+' | '-' | '&' | '|' | '!' | '(' | ')' | '{' | '}' | '[' | ']' | '^' | '"' | '~'
                | '*' | '?' | ':' | '\\' | '/'
        ) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[async_trait]
impl MetadataResolver for MusicBrainzClient {
    async fn resolve(&self, item: &SearchItem) -> Option<CanonicalMetadata> {
        match self.search_recording(item).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(
                    artist = %item.artist,
                    title = %item.title,
                    error = %e,
                    "MusicBrainz lookup failed, continuing without canonical metadata"
                );
                None
            }
        }
    }
}
