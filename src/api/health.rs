//! Health check endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("ok" or "degraded")
    pub status: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Whether slskd reports a live peer-network connection
    pub peer_network_connected: bool,
}

/// GET /health
///
/// Probes the slskd server state; a reachable but disconnected (or
/// unreachable) upstream degrades the status without failing the check.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let peer_network_connected = match state.peer.is_connected().await {
        Ok(connected) => connected,
        Err(e) => {
            tracing::warn!(error = %e, "slskd health probe failed");
            false
        }
    };

    Json(HealthResponse {
        status: if peer_network_connected { "ok" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        peer_network_connected,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
