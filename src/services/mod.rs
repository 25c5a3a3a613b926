//! Business logic services

pub mod musicbrainz_client;
pub mod orchestrator;
pub mod query_builder;
pub mod scoring;
pub mod slskd_client;

pub use musicbrainz_client::{MetadataResolver, MusicBrainzClient};
pub use orchestrator::SearchOrchestrator;
pub use scoring::ScoringEngine;
pub use slskd_client::{PeerSearch, SearchError, SlskdClient};
