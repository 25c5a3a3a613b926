//! Work items and derived query variants

use serde::{Deserialize, Serialize};

/// One track to search for. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    pub artist: String,
    pub title: String,
    /// May be empty when the caller has no album information
    #[serde(default)]
    pub album: String,
}

impl SearchItem {
    pub fn new(artist: impl Into<String>, title: impl Into<String>, album: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            title: title.into(),
            album: album.into(),
        }
    }

    /// Identity key used for queue dedup and result storage.
    ///
    /// `"artist - title"`, or just `"artist"` when the title is empty.
    pub fn identity_key(&self) -> String {
        if self.title.is_empty() {
            self.artist.clone()
        } else {
            format!("{} - {}", self.artist, self.title)
        }
    }
}

/// Provenance of a query variant's text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    /// Text as supplied by the caller
    Original,
    /// Script-transliterated form, added when it differs from the original
    Romanized,
}

/// One phrasing of a search query derived from a single item.
///
/// Never persisted; rebuilt deterministically on every orchestrator pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryVariant {
    pub query_text: String,
    pub display_label: String,
    pub kind: VariantKind,
}
