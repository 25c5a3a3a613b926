//! Result store API handlers
//!
//! GET /api/results, GET/DELETE /api/tracks/{key},
//! POST /api/tracks/{key}/reviewed, GET /api/stats

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::db::{LedgerStats, StoreStats};
use crate::error::{ApiError, ApiResult};
use crate::models::{AlbumGroup, SearchItem, TrackRecord};
use crate::AppState;

/// DELETE /api/tracks/{key} query parameters
#[derive(Debug, Deserialize)]
pub struct DeleteTrackParams {
    /// Put the deleted item back on the work queue for a re-search
    #[serde(default)]
    pub requeue: bool,
}

#[derive(Debug, Serialize)]
pub struct DeleteTrackResponse {
    pub deleted: bool,
    pub requeued: bool,
}

/// GET /api/stats response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub store: StoreStats,
    pub ledger: LedgerStats,
    pub queued: usize,
    pub watchlist: usize,
}

/// GET /api/results
///
/// Full result store as album groups, computed at read time.
pub async fn get_results(State(state): State<AppState>) -> ApiResult<Json<Vec<AlbumGroup>>> {
    Ok(Json(state.store.grouped_by_album().await?))
}

/// GET /api/tracks/{key}
pub async fn get_track(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<TrackRecord>> {
    let record = state
        .store
        .get(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Track not found: {}", key)))?;

    Ok(Json(record))
}

/// DELETE /api/tracks/{key}?requeue=
///
/// Remove a track's stored results; with `requeue`, the item goes back on the
/// work queue for a fresh search.
pub async fn delete_track(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<DeleteTrackParams>,
) -> ApiResult<Json<DeleteTrackResponse>> {
    let record = state
        .store
        .get(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Track not found: {}", key)))?;

    let deleted = state.store.delete(&key).await?;

    let mut requeued = false;
    if deleted && params.requeue {
        let item = SearchItem::new(record.artist, record.title, record.album);
        requeued = state.queue.enqueue(&[item]).await? > 0;
    }

    tracing::info!(key = %key, requeued, "Track deleted");

    Ok(Json(DeleteTrackResponse { deleted, requeued }))
}

/// POST /api/tracks/{key}/reviewed
pub async fn mark_reviewed(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<TrackRecord>> {
    if !state.store.set_reviewed(&key).await? {
        return Err(ApiError::NotFound(format!("Track not found: {}", key)));
    }

    let record = state
        .store
        .get(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Track not found: {}", key)))?;

    Ok(Json(record))
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<StatsResponse>> {
    Ok(Json(StatsResponse {
        store: state.store.stats().await?,
        ledger: state.ledger.stats().await?,
        queued: state.queue.size().await?,
        watchlist: state.watchlist.list().await?.len(),
    }))
}

/// Build result store routes
pub fn result_routes() -> Router<AppState> {
    Router::new()
        .route("/api/results", get(get_results))
        .route("/api/tracks/:key", get(get_track).delete(delete_track))
        .route("/api/tracks/:key/reviewed", post(mark_reviewed))
        .route("/api/stats", get(get_stats))
}
