//! slskd peer-search client
//!
//! HTTP client for the slskd API: submit searches, collect peer responses,
//! and enqueue downloads. The [`PeerSearch`] trait is the seam the
//! orchestrator works against, so tests swap in a mock without any network.

use crate::config::SlskdConfig;
use crate::models::PeerFileOffer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Errors from the peer search network, classified by retryability.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Upstream asked us to back off (HTTP 429)
    #[error("Rate limited by peer network")]
    RateLimited,

    /// Temporary failure worth retrying (timeouts, 5xx, connection errors)
    #[error("Transient peer network error: {0}")]
    Transient(String),

    /// Failure that retrying will not fix (auth, bad request, 4xx)
    #[error("Permanent peer network error: {0}")]
    Permanent(String),
}

impl SearchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SearchError::RateLimited | SearchError::Transient(_))
    }
}

/// Handle to a submitted search, used to fetch its accumulated responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTicket {
    pub id: Uuid,
}

/// Seam for the peer search network.
#[async_trait]
pub trait PeerSearch: Send + Sync {
    /// Submit a search query; responses accumulate upstream until fetched.
    async fn submit_search(&self, query: &str) -> Result<SearchTicket, SearchError>;

    /// Fetch all peer responses collected so far for a search.
    async fn fetch_responses(&self, ticket: &SearchTicket) -> Result<Vec<PeerFileOffer>, SearchError>;

    /// Delete a finished search upstream. Best effort.
    async fn remove_search(&self, ticket: &SearchTicket) -> Result<(), SearchError>;

    /// Ask a peer to queue a file for download.
    async fn enqueue_download(&self, peer_id: &str, filename: &str, size_bytes: u64) -> Result<(), SearchError>;

    /// Whether the upstream is connected to the peer network.
    async fn is_connected(&self) -> Result<bool, SearchError>;
}

// slskd wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitSearchRequest<'a> {
    id: Uuid,
    search_text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponseEntry {
    username: String,
    #[serde(default)]
    has_free_upload_slot: bool,
    #[serde(default)]
    queue_length: u32,
    #[serde(default)]
    upload_speed: u32,
    #[serde(default)]
    files: Vec<SearchResponseFile>,
    #[serde(default)]
    locked_files: Vec<SearchResponseFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponseFile {
    filename: String,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    bit_rate: u32,
    /// Duration in seconds, reported by some clients only
    length: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DownloadRequest<'a> {
    filename: &'a str,
    size: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerState {
    state: String,
}

/// slskd HTTP API client
pub struct SlskdClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SlskdClient {
    pub fn new(config: &SlskdConfig) -> Result<Self, SearchError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SearchError::Permanent(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: api_base(&config.url, &config.url_base),
            api_key: config.api_key.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, format!("{}{}", self.base_url, path))
            .header("X-API-Key", &self.api_key)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SearchError> {
        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SearchError::RateLimited);
        }
        if status.is_server_error() {
            return Err(SearchError::Transient(format!("slskd returned {}", status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Permanent(format!("slskd returned {}: {}", status, body)));
        }
        Ok(response)
    }
}

fn classify_reqwest(e: reqwest::Error) -> SearchError {
    if e.is_timeout() || e.is_connect() {
        SearchError::Transient(e.to_string())
    } else {
        SearchError::Permanent(e.to_string())
    }
}

/// Join the instance URL and its base path into the API root.
fn api_base(url: &str, url_base: &str) -> String {
    let url = url.trim_end_matches('/');
    let base = url_base.trim_matches('/');
    if base.is_empty() {
        format!("{}/api/v0", url)
    } else {
        format!("{}/{}/api/v0", url, base)
    }
}

fn extension_of(filename: &str) -> String {
    let base = filename.rsplit(['\\', '/']).next().unwrap_or(filename);
    match base.rfind('.') {
        Some(idx) if idx > 0 => base[idx + 1..].to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Flatten one peer's response entry into per-file offers.
fn entry_to_offers(entry: SearchResponseEntry) -> Vec<PeerFileOffer> {
    let SearchResponseEntry {
        username,
        has_free_upload_slot,
        queue_length,
        upload_speed,
        files,
        locked_files,
    } = entry;

    let mut offers = Vec::with_capacity(files.len() + locked_files.len());
    let mut push = |file: SearchResponseFile, locked: bool| {
        offers.push(PeerFileOffer {
            peer_id: username.clone(),
            file_extension: extension_of(&file.filename),
            filename: file.filename,
            size_bytes: file.size,
            bitrate_kbps: file.bit_rate,
            queue_length,
            upload_speed_kbs: upload_speed / 1024,
            has_free_slot: has_free_upload_slot,
            is_locked: locked,
            duration_seconds: file.length,
            quality_score: 0.0,
        });
    };

    for file in files {
        push(file, false);
    }
    for file in locked_files {
        push(file, true);
    }

    offers
}

#[async_trait]
impl PeerSearch for SlskdClient {
    async fn submit_search(&self, query: &str) -> Result<SearchTicket, SearchError> {
        let id = Uuid::new_v4();

        tracing::debug!(search_id = %id, query = %query, "Submitting peer search");

        let response = self
            .request(reqwest::Method::POST, "/searches")
            .json(&SubmitSearchRequest { id, search_text: query })
            .send()
            .await
            .map_err(classify_reqwest)?;

        Self::check_status(response).await?;

        Ok(SearchTicket { id })
    }

    async fn fetch_responses(&self, ticket: &SearchTicket) -> Result<Vec<PeerFileOffer>, SearchError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/searches/{}/responses", ticket.id),
            )
            .send()
            .await
            .map_err(classify_reqwest)?;

        let response = Self::check_status(response).await?;

        let entries: Vec<SearchResponseEntry> = response
            .json()
            .await
            .map_err(|e| SearchError::Permanent(format!("Malformed search response: {}", e)))?;

        let offers: Vec<PeerFileOffer> = entries.into_iter().flat_map(entry_to_offers).collect();

        tracing::debug!(search_id = %ticket.id, offers = offers.len(), "Fetched peer responses");

        Ok(offers)
    }

    async fn remove_search(&self, ticket: &SearchTicket) -> Result<(), SearchError> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("/searches/{}", ticket.id))
            .send()
            .await
            .map_err(classify_reqwest)?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn enqueue_download(&self, peer_id: &str, filename: &str, size_bytes: u64) -> Result<(), SearchError> {
        tracing::info!(peer = %peer_id, filename = %filename, "Enqueuing download");

        let response = self
            .request(
                reqwest::Method::POST,
                &format!("/transfers/downloads/{}", peer_id),
            )
            .json(&vec![DownloadRequest {
                filename,
                size: size_bytes,
            }])
            .send()
            .await
            .map_err(classify_reqwest)?;

        Self::check_status(response).await?;
        Ok(())
    }

    async fn is_connected(&self) -> Result<bool, SearchError> {
        let response = self
            .request(reqwest::Method::GET, "/server")
            .send()
            .await
            .map_err(classify_reqwest)?;

        let response = Self::check_status(response).await?;

        let state: ServerState = response
            .json()
            .await
            .map_err(|e| SearchError::Permanent(format!("Malformed server state: {}", e)))?;

        Ok(state.state.contains("Connected"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_base_with_root_base() {
        assert_eq!(api_base("http://127.0.0.1:5030", "/"), "http://127.0.0.1:5030/api/v0");
    }

    #[test]
    fn test_api_base_with_path_prefix() {
        assert_eq!(
            api_base("http://host:5030/", "/slskd/"),
            "http://host:5030/slskd/api/v0"
        );
    }

    #[test]
    fn test_error_retryability() {
        assert!(SearchError::RateLimited.is_retryable());
        assert!(SearchError::Transient("timeout".into()).is_retryable());
        assert!(!SearchError::Permanent("401".into()).is_retryable());
    }

    #[test]
    fn test_extension_extraction() {
        assert_eq!(extension_of("@@music\\Artist\\01 - Track.FLAC"), "flac");
        assert_eq!(extension_of("folder/track.mp3"), "mp3");
        assert_eq!(extension_of("noext"), "");
    }

    #[test]
    fn test_entry_to_offers_flags_locked_files() {
        let entry: SearchResponseEntry = serde_json::from_value(serde_json::json!({
            "username": "collector42",
            "hasFreeUploadSlot": true,
            "queueLength": 3,
            "uploadSpeed": 512000,
            "files": [
                {"filename": "Music\\Album\\01 - Song.mp3", "size": 9000000, "bitRate": 320, "length": 211}
            ],
            "lockedFiles": [
                {"filename": "Private\\02 - Song.flac", "size": 30000000, "bitRate": 0}
            ]
        }))
        .unwrap();

        let offers = entry_to_offers(entry);
        assert_eq!(offers.len(), 2);

        assert_eq!(offers[0].peer_id, "collector42");
        assert_eq!(offers[0].file_extension, "mp3");
        assert_eq!(offers[0].queue_length, 3);
        assert_eq!(offers[0].upload_speed_kbs, 500);
        assert_eq!(offers[0].duration_seconds, Some(211));
        assert!(!offers[0].is_locked);

        assert_eq!(offers[1].file_extension, "flac");
        assert!(offers[1].is_locked);
        assert!(offers[1].duration_seconds.is_none());
    }
}
