//! cratedigger - peer search orchestration and quality ranking
//!
//! Ingests (artist, title, album) work items, searches a slskd peer network
//! for each, scores the returned file offers against quality and correctness
//! heuristics (refined by MusicBrainz canonical metadata when available),
//! and persists the ranked top candidates per track. A durable ledger keyed
//! by MusicBrainz recording id prevents downloading the same recording twice.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;

pub use crate::error::{ApiError, ApiResult, Error, Result};

use crate::config::Settings;
use crate::db::{DownloadLedger, ResultStore, Watchlist, WorkQueue};
use crate::services::{MetadataResolver, PeerSearch, ScoringEngine, SearchOrchestrator};
use crate::state::ProgressTracker;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub settings: Arc<Settings>,
    pub queue: WorkQueue,
    pub store: ResultStore,
    pub ledger: DownloadLedger,
    pub watchlist: Watchlist,
    pub progress: ProgressTracker,
    pub orchestrator: SearchOrchestrator,
    pub peer: Arc<dyn PeerSearch>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the shared services over one database pool and one pair of
    /// upstream clients.
    pub fn new(
        db: SqlitePool,
        settings: Settings,
        peer: Arc<dyn PeerSearch>,
        metadata: Option<Arc<dyn MetadataResolver>>,
    ) -> Self {
        let queue = WorkQueue::new(db.clone());
        let store = ResultStore::new(db.clone());
        let ledger = DownloadLedger::new(db.clone());
        let watchlist = Watchlist::new(db.clone());
        let progress = ProgressTracker::new(db.clone());
        let scoring = Arc::new(ScoringEngine::new(settings.scoring.clone()));

        let orchestrator = SearchOrchestrator::new(
            queue.clone(),
            store.clone(),
            watchlist.clone(),
            progress.clone(),
            scoring,
            peer.clone(),
            metadata,
            settings.search.clone(),
        );

        Self {
            db,
            settings: Arc::new(settings),
            queue,
            store,
            ledger,
            watchlist,
            progress,
            orchestrator,
            peer,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::search_routes())
        .merge(api::result_routes())
        .merge(api::download_routes())
        .merge(api::watchlist_routes())
        .merge(api::health_routes())
        .with_state(state)
}
