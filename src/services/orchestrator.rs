//! Search orchestration
//!
//! Drains the work queue and processes the batch through a bounded worker
//! pool. Per item: best-effort canonical metadata lookup, query variant
//! generation, sequential variant searches with jittered pacing and
//! retry/backoff, then scoring, dedup, ranking, and persistence.
//!
//! Cancellation is cooperative: it is checked before each item starts and at
//! every variant boundary. An in-flight variant finishes; items the pool never
//! started go back onto the queue for a future run.

use crate::config::{SearchConfig, SearchMode};
use crate::db::{ResultStore, Watchlist, WorkQueue};
use crate::error::{Error, Result};
use crate::models::{CanonicalMetadata, PeerFileOffer, SearchItem, TrackRecord};
use crate::services::musicbrainz_client::MetadataResolver;
use crate::services::query_builder;
use crate::services::scoring::ScoringEngine;
use crate::services::slskd_client::{PeerSearch, SearchError};
use crate::state::ProgressTracker;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use rand::Rng;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Top-level coordinator for one search batch at a time
#[derive(Clone)]
pub struct SearchOrchestrator {
    queue: WorkQueue,
    store: ResultStore,
    watchlist: Watchlist,
    progress: ProgressTracker,
    scoring: Arc<ScoringEngine>,
    peer: Arc<dyn PeerSearch>,
    metadata: Option<Arc<dyn MetadataResolver>>,
    config: SearchConfig,
}

impl SearchOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: WorkQueue,
        store: ResultStore,
        watchlist: Watchlist,
        progress: ProgressTracker,
        scoring: Arc<ScoringEngine>,
        peer: Arc<dyn PeerSearch>,
        metadata: Option<Arc<dyn MetadataResolver>>,
        config: SearchConfig,
    ) -> Self {
        Self {
            queue,
            store,
            watchlist,
            progress,
            scoring,
            peer,
            metadata,
            config,
        }
    }

    /// Drain the queue and process the batch to completion.
    ///
    /// Returns the number of items drained. Fails without touching the queue
    /// contents if another batch is already active.
    pub async fn run_batch(&self, mode: SearchMode) -> Result<usize> {
        let items = self.queue.dequeue_all().await?;
        if items.is_empty() {
            return Ok(0);
        }
        let total = items.len();

        let Some(cancel) = self.progress.begin(total).await else {
            // Another batch owns the progress state; put the drain back
            self.queue.enqueue(&items).await?;
            return Err(Error::InvalidInput(
                "a search batch is already running".to_string(),
            ));
        };

        tracing::info!(total, workers = self.config.worker_count, "Starting search batch");

        let skipped: Vec<SearchItem> = stream::iter(items)
            .map(|item| {
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return Some(item);
                    }
                    if let Err(e) = self.process_item(&item, mode, &cancel).await {
                        tracing::error!(item = %item.identity_key(), error = %e, "Item processing failed");
                        self.progress
                            .record_error(format!("{}: {}", item.identity_key(), e))
                            .await;
                    }
                    self.progress.item_completed().await;
                    None
                }
            })
            .buffer_unordered(self.config.worker_count)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect();

        if !skipped.is_empty() {
            tracing::info!(skipped = skipped.len(), "Returning unstarted items to the queue");
            self.queue.enqueue(&skipped).await?;
        }

        self.progress.finish().await;
        Ok(total)
    }

    /// Process one item: metadata, variants, search, score, rank, persist.
    async fn process_item(
        &self,
        item: &SearchItem,
        mode: SearchMode,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let key = item.identity_key();
        self.progress.set_current(&key).await;

        // Best effort; absence only disables metadata-dependent scoring terms
        let canonical = match &self.metadata {
            Some(resolver) => resolver.resolve(item).await,
            None => None,
        };

        let variants = query_builder::build_variants(item, mode, &self.config.artist_separators);

        let mut admitted: Vec<PeerFileOffer> = Vec::new();
        for variant in &variants {
            if cancel.is_cancelled() {
                break;
            }
            self.jitter_delay().await;

            match self.run_variant(&variant.query_text).await {
                Ok(offers) => {
                    admitted.extend(self.score_offers(offers, &item.title, canonical.as_ref()));
                }
                Err(e) => {
                    tracing::warn!(
                        item = %key,
                        variant = %variant.display_label,
                        error = %e,
                        "Query variant abandoned"
                    );
                    self.progress
                        .record_error(format!("{}: variant \"{}\" failed: {}", key, variant.display_label, e))
                        .await;
                }
            }
        }

        let results = self.rank(admitted);

        if results.is_empty() {
            self.progress.record_error(format!("No results for {}", key)).await;
        }

        let record = TrackRecord {
            artist: item.artist.clone(),
            title: item.title.clone(),
            album: item.album.clone(),
            searched_at: Utc::now(),
            reviewed: false,
            results,
            canonical,
        };
        self.store.upsert(&record).await?;

        // A best offer stuck behind other downloads is worth re-checking later
        if let Some(best) = record.results.first() {
            if best.queue_length > 0 {
                self.watchlist.register(item, &best.peer_id, best.queue_length).await?;
            }
        }

        tracing::debug!(item = %key, results = record.results.len(), "Item persisted");
        Ok(())
    }

    /// One variant as a retryable unit: submit, wait for peer responses to
    /// accumulate, fetch. Up to `max_attempts` attempts with exponential
    /// backoff; permanent errors are not retried.
    async fn run_variant(&self, query: &str) -> std::result::Result<Vec<PeerFileOffer>, SearchError> {
        let mut backoff = Duration::from_secs(self.config.backoff_base_secs);
        let mut attempt = 1u32;

        loop {
            match self.try_variant(query).await {
                Ok(offers) => return Ok(offers),
                Err(e) if e.is_retryable() && attempt < self.config.max_attempts => {
                    tracing::warn!(
                        query = %query,
                        attempt,
                        backoff_secs = backoff.as_secs(),
                        error = %e,
                        "Search attempt failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_variant(&self, query: &str) -> std::result::Result<Vec<PeerFileOffer>, SearchError> {
        let ticket = self.peer.submit_search(query).await?;

        // Fixed accumulation window; peer responses keep arriving upstream and
        // a fetch sees whatever has landed so far
        tokio::time::sleep(Duration::from_secs(self.config.search_wait_secs)).await;

        let offers = self.peer.fetch_responses(&ticket).await?;

        if let Err(e) = self.peer.remove_search(&ticket).await {
            tracing::debug!(search_id = %ticket.id, error = %e, "Failed to clean up finished search");
        }

        Ok(offers)
    }

    /// Apply hard filters and attach quality scores.
    fn score_offers(
        &self,
        offers: Vec<PeerFileOffer>,
        requested_title: &str,
        canonical: Option<&CanonicalMetadata>,
    ) -> Vec<PeerFileOffer> {
        offers
            .into_iter()
            .filter(|offer| self.scoring.passes_hard_filters(offer))
            .map(|mut offer| {
                let (score, _) = self.scoring.score(&offer, requested_title, canonical);
                offer.quality_score = score;
                offer
            })
            .collect()
    }

    /// Dedup by (peer, filename) keeping the first occurrence, order by score
    /// descending with (queue length, peer id) tiebreaks, bound to top-N, and
    /// apply the optional minimum-score cutoff.
    fn rank(&self, mut offers: Vec<PeerFileOffer>) -> Vec<PeerFileOffer> {
        let mut seen: HashSet<(String, String)> = HashSet::new();
        offers.retain(|o| seen.insert((o.peer_id.clone(), o.filename.clone())));

        offers.sort_by(|a, b| {
            b.quality_score
                .partial_cmp(&a.quality_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.queue_length.cmp(&b.queue_length))
                .then_with(|| a.peer_id.cmp(&b.peer_id))
        });

        offers.truncate(self.config.top_n);

        if let Some(min_score) = self.config.min_score {
            offers.retain(|o| o.quality_score >= min_score);
        }

        offers
    }

    /// Randomized pause before each variant submission, within the configured
    /// window, to stay off upstream rate limiters.
    async fn jitter_delay(&self) {
        let (min, max) = (self.config.jitter_min_ms, self.config.jitter_max_ms);
        let ms = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}
