//! Data models for search items, peer offers, and persisted records

pub mod item;
pub mod offer;
pub mod progress;
pub mod track;

pub use item::{QueryVariant, SearchItem, VariantKind};
pub use offer::PeerFileOffer;
pub use progress::BatchProgress;
pub use track::{AlbumGroup, CanonicalMetadata, DownloadRecord, TrackRecord};
