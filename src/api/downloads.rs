//! Download initiation and duplicate-ledger API handlers
//!
//! POST /api/downloads, GET /api/duplicates/{recording_id}

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::RecordOutcome;
use crate::error::{ApiError, ApiResult};
use crate::models::DownloadRecord;
use crate::AppState;

/// POST /api/downloads request
#[derive(Debug, Deserialize)]
pub struct StartDownloadRequest {
    /// Identity key of the stored track record
    pub identity_key: String,
    pub peer_id: String,
    pub filename: String,
}

/// GET /api/duplicates/{recording_id} response
#[derive(Debug, Serialize)]
pub struct DuplicateResponse {
    pub duplicate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<DownloadRecord>,
}

/// GET /api/downloads
///
/// Full download history, oldest first.
pub async fn list_downloads(State(state): State<AppState>) -> ApiResult<Json<Vec<DownloadRecord>>> {
    Ok(Json(state.ledger.all_downloads().await?))
}

/// GET /api/duplicates/{recording_id}
pub async fn check_duplicate(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
) -> ApiResult<Json<DuplicateResponse>> {
    let record = state.ledger.lookup(&recording_id).await?;

    Ok(Json(DuplicateResponse {
        duplicate: record.is_some(),
        record,
    }))
}

/// POST /api/downloads
///
/// Ask the offering peer to queue the file, then record the download in the
/// ledger. A recording already in the ledger is refused with 409 and the date
/// of the prior download instead of being fetched twice.
pub async fn start_download(
    State(state): State<AppState>,
    Json(request): Json<StartDownloadRequest>,
) -> ApiResult<Json<DownloadRecord>> {
    let record = state
        .store
        .get(&request.identity_key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Track not found: {}", request.identity_key)))?;

    let offer = record
        .results
        .iter()
        .find(|o| o.peer_id == request.peer_id && o.filename == request.filename)
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "No stored offer from {} for {}",
                request.peer_id, request.filename
            ))
        })?;

    let recording_id = record.canonical.as_ref().map(|c| c.recording_id.as_str());

    if let Some(id) = recording_id {
        if let Some(prior) = state.ledger.lookup(id).await? {
            return Err(ApiError::Conflict(format!(
                "Already downloaded as \"{} - {}\" on {}",
                prior.artist,
                prior.title,
                prior.downloaded_at.format("%Y-%m-%d")
            )));
        }
    }

    state
        .peer
        .enqueue_download(&offer.peer_id, &offer.filename, offer.size_bytes)
        .await
        .map_err(|e| ApiError::Upstream(e.to_string()))?;

    let outcome = state
        .ledger
        .record_download(
            recording_id,
            &record.artist,
            &record.title,
            &offer.filename,
            &offer.peer_id,
        )
        .await?;

    match outcome {
        RecordOutcome::Recorded(download) => Ok(Json(download)),
        // Lost the race with a concurrent download of the same recording
        RecordOutcome::AlreadyDownloaded(prior) => Err(ApiError::Conflict(format!(
            "Already downloaded as \"{} - {}\" on {}",
            prior.artist,
            prior.title,
            prior.downloaded_at.format("%Y-%m-%d")
        ))),
    }
}

/// Build download routes
pub fn download_routes() -> Router<AppState> {
    Router::new()
        .route("/api/downloads", get(list_downloads).post(start_download))
        .route("/api/duplicates/:recording_id", get(check_duplicate))
}
