//! cratedigger service binary

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use cratedigger::config::{default_config_path, Settings};
use cratedigger::services::{MetadataResolver, MusicBrainzClient, SlskdClient};
use cratedigger::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting cratedigger");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = default_config_path();
    let settings = Settings::load(config_path.as_deref())?;

    let db_path = settings.service.database_path();
    info!("Database: {}", db_path.display());
    let db_pool = cratedigger::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    let peer = Arc::new(
        SlskdClient::new(&settings.slskd).map_err(|e| anyhow::anyhow!("slskd client: {}", e))?,
    );

    let metadata: Option<Arc<dyn MetadataResolver>> = if settings.musicbrainz.enabled {
        let client = MusicBrainzClient::new(&settings.musicbrainz)
            .map_err(|e| anyhow::anyhow!("MusicBrainz client: {}", e))?;
        Some(Arc::new(client))
    } else {
        warn!("MusicBrainz lookup disabled; scoring proceeds without canonical metadata");
        None
    };

    let listen_addr = settings.service.listen_addr.clone();
    let state = AppState::new(db_pool, settings, peer, metadata);

    // Report the last known batch state after a restart
    state.progress.restore().await;

    let app = cratedigger::build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!("Listening on http://{}", listen_addr);
    info!("Health check: http://{}/health", listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
