//! Search batch API handlers
//!
//! POST /api/search/start, GET /api/search/status, POST /api/search/cancel

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::config::SearchMode;
use crate::error::{ApiError, ApiResult};
use crate::models::{BatchProgress, SearchItem};
use crate::AppState;

/// POST /api/search/start request
#[derive(Debug, Deserialize)]
pub struct StartSearchRequest {
    pub items: Vec<SearchItem>,
    /// Overrides the configured default search mode for this batch
    #[serde(default)]
    pub mode: Option<SearchMode>,
    /// Re-search items that already have stored results
    #[serde(default)]
    pub force: bool,
}

/// POST /api/search/start response
#[derive(Debug, Serialize)]
pub struct StartSearchResponse {
    pub enqueued: usize,
    pub skipped_existing: usize,
    pub batch_size: usize,
}

/// GET /api/search/status response
#[derive(Debug, Serialize)]
pub struct SearchStatusResponse {
    #[serde(flatten)]
    pub progress: BatchProgress,
    pub queued: usize,
}

/// POST /api/search/start
///
/// Enqueue a batch of items and kick off the orchestrator. Items already in
/// the result store are skipped unless `force` is set. Returns 409 if a batch
/// is already running.
pub async fn start_search(
    State(state): State<AppState>,
    Json(request): Json<StartSearchRequest>,
) -> ApiResult<Json<StartSearchResponse>> {
    if request.items.is_empty() {
        return Err(ApiError::BadRequest("No items to search".to_string()));
    }
    if request.items.iter().any(|item| item.artist.trim().is_empty()) {
        return Err(ApiError::BadRequest(
            "Every item needs a non-empty artist".to_string(),
        ));
    }

    if state.progress.snapshot().await.active {
        return Err(ApiError::Conflict("A search batch is already running".to_string()));
    }

    let mut accepted: Vec<SearchItem> = Vec::with_capacity(request.items.len());
    let mut skipped_existing = 0usize;
    for item in request.items {
        if !request.force && state.store.contains(&item.identity_key()).await? {
            skipped_existing += 1;
            continue;
        }
        accepted.push(item);
    }

    let enqueued = state.queue.enqueue(&accepted).await?;
    let batch_size = state.queue.size().await?;

    tracing::info!(enqueued, skipped_existing, batch_size, "Search batch requested");

    if batch_size > 0 {
        let mode = request.mode.unwrap_or(state.settings.search.mode);
        let orchestrator = state.orchestrator.clone();
        tokio::spawn(async move {
            if let Err(e) = orchestrator.run_batch(mode).await {
                tracing::error!(error = %e, "Search batch failed");
            }
        });
    }

    Ok(Json(StartSearchResponse {
        enqueued,
        skipped_existing,
        batch_size,
    }))
}

/// GET /api/search/status
pub async fn search_status(State(state): State<AppState>) -> ApiResult<Json<SearchStatusResponse>> {
    let progress = state.progress.snapshot().await;
    let queued = state.queue.size().await?;

    Ok(Json(SearchStatusResponse { progress, queued }))
}

/// POST /api/search/cancel
///
/// Request cooperative cancellation; in-flight items finish their current
/// variant, unstarted items return to the queue.
pub async fn cancel_search(State(state): State<AppState>) -> ApiResult<Json<BatchProgress>> {
    if !state.progress.snapshot().await.active {
        return Err(ApiError::BadRequest("No active search batch".to_string()));
    }

    state.progress.request_cancel().await;
    tracing::info!("Search batch cancellation requested");

    Ok(Json(state.progress.snapshot().await))
}

/// Build search batch routes
pub fn search_routes() -> Router<AppState> {
    Router::new()
        .route("/api/search/start", post(start_search))
        .route("/api/search/status", get(search_status))
        .route("/api/search/cancel", post(cancel_search))
}
