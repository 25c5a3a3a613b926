//! Watchlist API handlers
//!
//! GET /api/watchlist, DELETE /api/watchlist/{key}

use axum::{
    extract::{Path, State},
    routing::{delete, get},
    Json, Router,
};
use serde::Serialize;

use crate::db::WatchlistEntry;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct RemoveWatchResponse {
    pub removed: bool,
}

/// GET /api/watchlist
pub async fn list_watchlist(State(state): State<AppState>) -> ApiResult<Json<Vec<WatchlistEntry>>> {
    Ok(Json(state.watchlist.list().await?))
}

/// DELETE /api/watchlist/{key}
pub async fn remove_watch(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<Json<RemoveWatchResponse>> {
    if !state.watchlist.remove(&key).await? {
        return Err(ApiError::NotFound(format!("Watchlist entry not found: {}", key)));
    }

    Ok(Json(RemoveWatchResponse { removed: true }))
}

/// Build watchlist routes
pub fn watchlist_routes() -> Router<AppState> {
    Router::new()
        .route("/api/watchlist", get(list_watchlist))
        .route("/api/watchlist/:key", delete(remove_watch))
}
