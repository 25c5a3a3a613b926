//! Offer scoring engine
//!
//! Pure: identical inputs always produce identical output; no I/O, no clock.
//! Hard filters are separate from scoring: an offer that fails them never
//! reaches a ranked set regardless of how it would have scored. The score
//! itself is the sum of an ordered list of named rules, each independently
//! testable against its thresholds in [`ScoringConfig`].

use crate::config::ScoringConfig;
use crate::models::{CanonicalMetadata, PeerFileOffer};
use strsim::normalized_levenshtein;

/// Scoring engine over a fixed threshold configuration
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Unconditional admit/reject rules, applied before scoring.
    ///
    /// Rejects: locked peer share, video container extension, file size over
    /// the ceiling, or a peer queue at/above the hard ceiling.
    pub fn passes_hard_filters(&self, offer: &PeerFileOffer) -> bool {
        if offer.is_locked {
            return false;
        }
        if self
            .config
            .video_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(&offer.file_extension))
        {
            return false;
        }
        if offer.size_bytes > self.config.max_file_size_bytes {
            return false;
        }
        if offer.queue_length >= self.config.queue_hard_ceiling {
            return false;
        }
        true
    }

    /// Score an offer against the requested title and optional canonical
    /// metadata. Returns (score, admitted); `admitted` reflects the hard
    /// filters only. Negative scores are allowed and simply rank low.
    pub fn score(
        &self,
        offer: &PeerFileOffer,
        requested_title: &str,
        canonical: Option<&CanonicalMetadata>,
    ) -> (f64, bool) {
        let score = self.name_relevance(offer, requested_title)
            + self.duration_match(offer, canonical)
            + self.album_match(offer, canonical)
            + self.format_tier(offer)
            + self.availability(offer)
            + self.transfer_speed(offer);

        (score, self.passes_hard_filters(offer))
    }

    /// Rule 1: filename relevance to the requested title.
    ///
    /// A version-indicator word (live, remix, ...) present in the filename but
    /// absent from the requested title short-circuits into the blacklist
    /// penalty. Otherwise: literal-substring bonus plus a tiered
    /// edit-distance-ratio bonus, with a penalty below the mismatch floor.
    fn name_relevance(&self, offer: &PeerFileOffer, requested_title: &str) -> f64 {
        let title_norm = normalize(requested_title);
        let stem_norm = normalize(offer.stem());

        let stem_tokens: Vec<&str> = stem_norm.split_whitespace().collect();
        let title_tokens: Vec<&str> = title_norm.split_whitespace().collect();
        let blacklisted = self.config.version_blacklist.iter().any(|word| {
            stem_tokens.iter().any(|t| t.eq_ignore_ascii_case(word))
                && !title_tokens.iter().any(|t| t.eq_ignore_ascii_case(word))
        });
        if blacklisted {
            return self.config.blacklist_penalty;
        }

        let mut score = 0.0;
        if !title_norm.is_empty() && stem_norm.contains(&title_norm) {
            score += self.config.substring_bonus;
        }

        let ratio = normalized_levenshtein(&title_norm, &stem_norm);
        if ratio >= self.config.similarity_high {
            score += self.config.similarity_high_bonus;
        } else if ratio >= self.config.similarity_medium {
            score += self.config.similarity_medium_bonus;
        } else if ratio < self.config.similarity_low {
            score += self.config.similarity_low_penalty;
        }

        score
    }

    /// Rule 2: agreement with the canonical recording duration.
    ///
    /// Banded on absolute difference in seconds; past the widest band the
    /// offer is most likely an alternate version or edit.
    fn duration_match(&self, offer: &PeerFileOffer, canonical: Option<&CanonicalMetadata>) -> f64 {
        let (Some(canonical_ms), Some(offer_secs)) = (
            canonical.and_then(|c| c.duration_ms),
            offer.duration_seconds,
        ) else {
            return 0.0;
        };

        let canonical_secs = canonical_ms as f64 / 1000.0;
        let diff = (offer_secs as f64 - canonical_secs).abs();

        if diff <= self.config.duration_perfect_secs as f64 {
            self.config.duration_perfect_bonus
        } else if diff <= self.config.duration_good_secs as f64 {
            self.config.duration_good_bonus
        } else if diff <= self.config.duration_acceptable_secs as f64 {
            self.config.duration_acceptable_bonus
        } else if diff <= self.config.duration_drift_secs as f64 {
            self.config.duration_drift_penalty
        } else {
            self.config.duration_outlier_penalty
        }
    }

    /// Rule 3: canonical album name appearing in the offer's path.
    ///
    /// Checked against the full path, since peers usually carry the album in
    /// the directory component rather than the filename.
    fn album_match(&self, offer: &PeerFileOffer, canonical: Option<&CanonicalMetadata>) -> f64 {
        let Some(album) = canonical.and_then(|c| c.canonical_album.as_deref()) else {
            return 0.0;
        };
        let album_norm = normalize(album);
        if album_norm.is_empty() {
            return 0.0;
        }

        let path_norm = normalize(&offer.filename);
        if path_norm.contains(&album_norm) {
            return self.config.album_match_bonus;
        }

        let best = offer
            .filename
            .split(['\\', '/'])
            .map(|component| normalized_levenshtein(&album_norm, &normalize(component)))
            .fold(0.0_f64, f64::max);
        if best >= self.config.album_fuzzy_threshold {
            self.config.album_fuzzy_bonus
        } else {
            0.0
        }
    }

    /// Rule 4: format and bitrate tier.
    ///
    /// Lossless takes the top tier; sub-192 lossy audio is penalized rather
    /// than mildly rewarded so it ranks below absent-bitrate unknowns.
    fn format_tier(&self, offer: &PeerFileOffer) -> f64 {
        if self
            .config
            .lossless_extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(&offer.file_extension))
        {
            self.config.lossless_bonus
        } else if offer.bitrate_kbps >= self.config.bitrate_high_kbps {
            self.config.bitrate_high_bonus
        } else if offer.bitrate_kbps >= self.config.bitrate_medium_kbps {
            self.config.bitrate_medium_bonus
        } else {
            self.config.bitrate_low_penalty
        }
    }

    /// Rule 5: availability as a step function of the peer's queue.
    ///
    /// Moderate waits are tolerable; long ones make the offer effectively
    /// useless, hence the step rather than a linear slope.
    fn availability(&self, offer: &PeerFileOffer) -> f64 {
        if offer.queue_length == 0 {
            self.config.free_slot_bonus
        } else if offer.queue_length <= self.config.queue_soft_threshold {
            self.config.short_queue_penalty
        } else {
            self.config.long_queue_penalty
        }
    }

    /// Rule 6: minor tiered bonus for reported upload speed
    fn transfer_speed(&self, offer: &PeerFileOffer) -> f64 {
        if offer.upload_speed_kbs >= self.config.speed_high_kbs {
            self.config.speed_high_bonus
        } else if offer.upload_speed_kbs >= self.config.speed_medium_kbs {
            self.config.speed_medium_bonus
        } else {
            0.0
        }
    }
}

/// Normalize for comparison: lowercase, every non-alphanumeric run collapsed
/// to a single space. Handles `_`/`-` separators, parentheses, and path noise
/// in one pass.
fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
        } else {
            pending_space = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ScoringEngine {
        ScoringEngine::new(ScoringConfig::default())
    }

    fn offer(filename: &str) -> PeerFileOffer {
        PeerFileOffer {
            peer_id: "peer".to_string(),
            filename: filename.to_string(),
            size_bytes: 10 * 1024 * 1024,
            bitrate_kbps: 320,
            file_extension: filename.rsplit('.').next().unwrap_or("").to_lowercase(),
            queue_length: 0,
            upload_speed_kbs: 0,
            has_free_slot: true,
            is_locked: false,
            duration_seconds: None,
            quality_score: 0.0,
        }
    }

    fn canonical(duration_ms: Option<u64>, album: Option<&str>) -> CanonicalMetadata {
        CanonicalMetadata {
            recording_id: "mbid".to_string(),
            isrc: None,
            duration_ms,
            canonical_album: album.map(str::to_string),
            canonical_artist: "Artist".to_string(),
            match_score: 100,
        }
    }

    #[test]
    fn test_normalize_collapses_separators_and_case() {
        assert_eq!(normalize("Artist_-_Lonely   Day (Live)"), "artist lonely day live");
        assert_eq!(normalize("01. Track"), "01 track");
    }

    #[test]
    fn test_hard_filter_rejects_locked_offer() {
        let mut o = offer("Artist - Song.flac");
        o.is_locked = true;
        assert!(!engine().passes_hard_filters(&o));
    }

    #[test]
    fn test_hard_filter_rejects_video_extension() {
        let o = offer("Artist - Song (Official Video).mp4");
        assert!(!engine().passes_hard_filters(&o));
    }

    #[test]
    fn test_hard_filter_rejects_oversized_file() {
        let mut o = offer("Artist - Song.flac");
        o.size_bytes = 600 * 1024 * 1024;
        assert!(!engine().passes_hard_filters(&o));
    }

    #[test]
    fn test_hard_filter_rejects_extreme_queue() {
        let mut o = offer("Artist - Song.flac");
        o.queue_length = 50;
        assert!(!engine().passes_hard_filters(&o));

        o.queue_length = 0;
        assert!(engine().passes_hard_filters(&o));
    }

    #[test]
    fn test_score_is_deterministic() {
        let e = engine();
        let o = offer("Artist - Lonely Day.mp3");
        let meta = canonical(Some(210_000), Some("Hypnotize"));

        let first = e.score(&o, "Lonely Day", Some(&meta));
        let second = e.score(&o, "Lonely Day", Some(&meta));
        assert_eq!(first, second);
    }

    #[test]
    fn test_blacklist_word_in_filename_only_applies_penalty() {
        let e = engine();
        let o = offer("Artist - Lonely Day (Live).mp3");
        let clean = offer("Artist - Lonely Day.mp3");

        let (penalized, _) = e.score(&o, "Lonely Day", None);
        let (baseline, _) = e.score(&clean, "Lonely Day", None);
        // The whole name rule collapses to the fixed penalty
        assert!(penalized <= baseline + e.config.blacklist_penalty);
    }

    #[test]
    fn test_blacklist_word_shared_with_title_is_not_penalized() {
        let e = engine();
        let o = offer("Artist - Live Wire.mp3");
        let (score, _) = e.score(&o, "Live Wire", None);
        // Substring and high-similarity bonuses both land
        assert!(score > e.config.substring_bonus);
    }

    #[test]
    fn test_substring_and_similarity_bonuses() {
        let e = engine();
        let exact = offer("Lonely Day.mp3");
        let unrelated = offer("Completely Different Thing Entirely.mp3");

        let (exact_score, _) = e.score(&exact, "Lonely Day", None);
        let (unrelated_score, _) = e.score(&unrelated, "Lonely Day", None);

        assert!(exact_score >= e.config.substring_bonus + e.config.similarity_high_bonus);
        assert!(unrelated_score < exact_score);
    }

    #[test]
    fn test_low_similarity_penalty_applies() {
        let e = engine();
        let o = offer("zzzzzzzzzzzzzzzzzzzzzzzzzzzzzz.mp3");
        let (with_penalty, _) = e.score(&o, "Lonely Day", None);
        let near = offer("Lonely Day.mp3");
        let (without_penalty, _) = e.score(&near, "Lonely Day", None);
        assert!(with_penalty < without_penalty);
        assert!(
            with_penalty
                <= e.config.similarity_low_penalty
                    + e.config.bitrate_high_bonus
                    + e.config.free_slot_bonus
        );
    }

    #[test]
    fn test_duration_perfect_band() {
        let e = engine();
        let mut o = offer("Artist - Lonely Day.mp3");
        o.duration_seconds = Some(211);
        let meta = canonical(Some(210_000), None);

        let (with_duration, _) = e.score(&o, "Lonely Day", Some(&meta));
        o.duration_seconds = None;
        let (without_duration, _) = e.score(&o, "Lonely Day", Some(&meta));

        assert_eq!(with_duration - without_duration, e.config.duration_perfect_bonus);
    }

    #[test]
    fn test_duration_outlier_penalty() {
        let e = engine();
        let mut o = offer("Artist - Lonely Day.mp3");
        o.duration_seconds = Some(260); // 50s off - probable alternate edit
        let meta = canonical(Some(210_000), None);

        o.duration_seconds = Some(260);
        let (outlier, _) = e.score(&o, "Lonely Day", Some(&meta));
        o.duration_seconds = None;
        let (neutral, _) = e.score(&o, "Lonely Day", Some(&meta));

        assert_eq!(outlier - neutral, e.config.duration_outlier_penalty);
    }

    #[test]
    fn test_duration_ignored_without_canonical_metadata() {
        let e = engine();
        let mut o = offer("Artist - Lonely Day.mp3");
        o.duration_seconds = Some(211);

        let (with_meta_absent, _) = e.score(&o, "Lonely Day", None);
        o.duration_seconds = None;
        let (without_duration, _) = e.score(&o, "Lonely Day", None);
        assert_eq!(with_meta_absent, without_duration);
    }

    #[test]
    fn test_album_containment_in_directory_component() {
        let e = engine();
        let o = offer("music\\System Of A Down\\Hypnotize (2005)\\03 - Lonely Day.mp3");
        let meta = canonical(None, Some("Hypnotize"));

        let plain = offer("music\\System Of A Down\\misc\\03 - Lonely Day.mp3");
        let (with_album, _) = e.score(&o, "Lonely Day", Some(&meta));
        let (without_album, _) = e.score(&plain, "Lonely Day", Some(&meta));

        assert_eq!(with_album - without_album, e.config.album_match_bonus);
    }

    #[test]
    fn test_format_tier_lossless_beats_low_bitrate() {
        let e = engine();
        let lossless = offer("Artist - Lonely Day.flac");
        let mut low = offer("Artist - Lonely Day.mp3");
        low.bitrate_kbps = 128;

        let (lossless_score, lossless_ok) = e.score(&lossless, "Lonely Day", None);
        let (low_score, low_ok) = e.score(&low, "Lonely Day", None);

        // Low bitrate is penalized, not rejected
        assert!(lossless_ok && low_ok);
        assert_eq!(
            lossless_score - low_score,
            e.config.lossless_bonus - e.config.bitrate_low_penalty
        );
    }

    #[test]
    fn test_availability_step_function() {
        let e = engine();
        let free = offer("Artist - Lonely Day.mp3");
        let mut short = offer("Artist - Lonely Day.mp3");
        short.queue_length = 3;
        let mut long = offer("Artist - Lonely Day.mp3");
        long.queue_length = 15;

        let (free_score, _) = e.score(&free, "Lonely Day", None);
        let (short_score, _) = e.score(&short, "Lonely Day", None);
        let (long_score, _) = e.score(&long, "Lonely Day", None);

        assert_eq!(free_score - short_score, e.config.free_slot_bonus - e.config.short_queue_penalty);
        assert_eq!(short_score - long_score, e.config.short_queue_penalty - e.config.long_queue_penalty);
    }

    #[test]
    fn test_transfer_speed_tiers() {
        let e = engine();
        let mut fast = offer("Artist - Lonely Day.mp3");
        fast.upload_speed_kbs = 800;
        let mut medium = offer("Artist - Lonely Day.mp3");
        medium.upload_speed_kbs = 150;
        let slow = offer("Artist - Lonely Day.mp3");

        let (fast_score, _) = e.score(&fast, "Lonely Day", None);
        let (medium_score, _) = e.score(&medium, "Lonely Day", None);
        let (slow_score, _) = e.score(&slow, "Lonely Day", None);

        assert_eq!(fast_score - slow_score, e.config.speed_high_bonus);
        assert_eq!(medium_score - slow_score, e.config.speed_medium_bonus);
    }
}
