//! Query variant construction
//!
//! Derives the concrete search phrasings for one work item: one variant per
//! candidate artist (multi-artist credits are split so collaboration tracks
//! indexed under a single contributor are still found), plus a transliterated
//! second variant whenever the ASCII form of the text differs from the
//! original.

use crate::config::SearchMode;
use crate::models::{QueryVariant, SearchItem, VariantKind};
use any_ascii::any_ascii;

/// Split a multi-artist credit on the configured separators.
///
/// Returns the trimmed individual artists, original order preserved,
/// duplicates removed. A credit with no separator comes back as-is.
pub fn split_artists(artist: &str, separators: &[String]) -> Vec<String> {
    let mut parts = vec![artist.to_string()];
    for sep in separators {
        parts = parts
            .iter()
            .flat_map(|part| part.split(sep.as_str()))
            .map(str::to_string)
            .collect();
    }

    let mut artists = Vec::new();
    for part in parts {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !artists.iter().any(|a: &String| a == trimmed) {
            artists.push(trimmed.to_string());
        }
    }

    if artists.is_empty() {
        artists.push(artist.trim().to_string());
    }
    artists
}

/// Build the ordered query variants for an item under a search mode.
///
/// Deterministic: the same item and mode always produce the same variants in
/// the same order.
pub fn build_variants(item: &SearchItem, mode: SearchMode, separators: &[String]) -> Vec<QueryVariant> {
    let mut variants = Vec::new();

    for artist in split_artists(&item.artist, separators) {
        let query_text = match mode {
            SearchMode::Track if !item.title.is_empty() => format!("{} {}", artist, item.title),
            SearchMode::Album if !item.album.is_empty() => format!("{} {}", artist, item.album),
            // No title/album to phrase with - fall back to the artist alone
            _ => artist.clone(),
        };

        push_unique(
            &mut variants,
            QueryVariant {
                display_label: query_text.clone(),
                query_text,
                kind: VariantKind::Original,
            },
        );
    }

    // Secondary transliterated variants follow all originals
    let romanized: Vec<QueryVariant> = variants
        .iter()
        .filter_map(|variant| {
            let ascii = any_ascii(&variant.query_text);
            let ascii = ascii.trim();
            if ascii.is_empty() || ascii == variant.query_text {
                return None;
            }
            Some(QueryVariant {
                query_text: ascii.to_string(),
                display_label: format!("{} (romanized)", variant.display_label),
                kind: VariantKind::Romanized,
            })
        })
        .collect();
    for variant in romanized {
        push_unique(&mut variants, variant);
    }

    variants
}

fn push_unique(variants: &mut Vec<QueryVariant>, candidate: QueryVariant) {
    if !variants.iter().any(|v| v.query_text == candidate.query_text) {
        variants.push(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separators() -> Vec<String> {
        vec![",".to_string(), "&".to_string()]
    }

    #[test]
    fn test_split_single_artist_unchanged() {
        assert_eq!(split_artists("Radiohead", &separators()), vec!["Radiohead"]);
    }

    #[test]
    fn test_split_multi_artist_credit() {
        assert_eq!(
            split_artists("Artist A, Artist B & Artist C", &separators()),
            vec!["Artist A", "Artist B", "Artist C"]
        );
    }

    #[test]
    fn test_split_removes_duplicates() {
        assert_eq!(
            split_artists("Artist A & Artist A", &separators()),
            vec!["Artist A"]
        );
    }

    #[test]
    fn test_track_mode_variant_text() {
        let item = SearchItem::new("Artist A", "Song X", "Album Y");
        let variants = build_variants(&item, SearchMode::Track, &separators());
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].query_text, "Artist A Song X");
        assert_eq!(variants[0].kind, VariantKind::Original);
    }

    #[test]
    fn test_album_mode_falls_back_without_album() {
        let item = SearchItem::new("Artist A", "Song X", "");
        let variants = build_variants(&item, SearchMode::Album, &separators());
        assert_eq!(variants[0].query_text, "Artist A");
    }

    #[test]
    fn test_multi_artist_produces_variant_per_artist() {
        let item = SearchItem::new("Artist A & Artist B", "Song X", "");
        let variants = build_variants(&item, SearchMode::Track, &separators());
        assert_eq!(
            variants.iter().map(|v| v.query_text.as_str()).collect::<Vec<_>>(),
            vec!["Artist A Song X", "Artist B Song X"]
        );
    }

    #[test]
    fn test_non_latin_text_adds_romanized_variant() {
        let item = SearchItem::new("Кино", "Группа крови", "");
        let variants = build_variants(&item, SearchMode::Track, &separators());
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].kind, VariantKind::Original);
        assert_eq!(variants[1].kind, VariantKind::Romanized);
        assert!(variants[1].query_text.is_ascii());
    }

    #[test]
    fn test_latin_text_gets_no_romanized_variant() {
        let item = SearchItem::new("Artist A", "Song X", "");
        let variants = build_variants(&item, SearchMode::Track, &separators());
        assert_eq!(variants.len(), 1);
    }

    #[test]
    fn test_variants_are_deterministic() {
        let item = SearchItem::new("Кино & Artist B", "Песня", "");
        let first = build_variants(&item, SearchMode::Track, &separators());
        let second = build_variants(&item, SearchMode::Track, &separators());
        assert_eq!(first, second);
    }
}
