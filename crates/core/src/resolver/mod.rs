//! Candidate resolution: turn a free-text query into one catalog entry.
//!
//! [`CandidateResolver::resolve`] runs a single tick (fetch a snapshot, score
//! every entry, keep the best). [`CandidateResolver::spawn_polling`] repeats
//! it on a fixed interval until a candidate is found or the loop is
//! cancelled. Results leave the loop only through a channel, so the owner of
//! the transaction stays the only writer of its state.

mod config;

pub use config::ResolverConfig;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::catalog::CatalogSource;
use crate::metrics;
use crate::textmatch::{select_best, ScoredEntry, SimilarityEnsemble};

/// Result of one resolution tick.
#[derive(Debug, Clone)]
pub enum ResolveOutcome {
    /// A candidate was selected.
    Found(ScoredEntry),
    /// The snapshot had entries but none was eligible.
    NotFound,
    /// Nothing to match against yet (fetch failed or empty catalog).
    NotYet(String),
}

impl ResolveOutcome {
    /// Short label used for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            ResolveOutcome::Found(_) => "found",
            ResolveOutcome::NotFound => "not_found",
            ResolveOutcome::NotYet(_) => "not_yet",
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, ResolveOutcome::Found(_))
    }
}

/// Selects the best catalog entry for a query.
pub struct CandidateResolver {
    catalog: Arc<dyn CatalogSource>,
    ensemble: SimilarityEnsemble,
    min_score: f64,
}

impl CandidateResolver {
    /// Create a resolver with no score floor.
    pub fn new(catalog: Arc<dyn CatalogSource>, ensemble: SimilarityEnsemble) -> Self {
        Self {
            catalog,
            ensemble,
            min_score: 0.0,
        }
    }

    /// Require at least `min_score` blended score to accept a candidate.
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score.clamp(0.0, 1.0);
        self
    }

    /// Run one resolution tick against a fresh snapshot.
    pub async fn resolve(&self, query: &str) -> ResolveOutcome {
        let snapshot = match self.catalog.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!(source = %self.catalog.name(), error = %e, "Catalog fetch failed");
                return ResolveOutcome::NotYet(e.to_string());
            }
        };

        if snapshot.is_empty() {
            return ResolveOutcome::NotYet("catalog is empty".to_string());
        }

        match select_best(&self.ensemble, query, &snapshot.entries) {
            Some(best) if best.score.blended >= self.min_score => {
                debug!(
                    entry_id = %best.entry.entry_id,
                    score = best.score.blended,
                    candidates = snapshot.len(),
                    "Selected candidate"
                );
                ResolveOutcome::Found(best)
            }
            Some(best) => {
                debug!(
                    entry_id = %best.entry.entry_id,
                    score = best.score.blended,
                    min_score = self.min_score,
                    "Best candidate below score floor"
                );
                ResolveOutcome::NotFound
            }
            None => ResolveOutcome::NotFound,
        }
    }

    /// Spawn the resolution poll loop.
    ///
    /// The first tick runs after `initial_delay`, later ticks every
    /// `interval`. Each outcome is passed through `wrap` and sent on `tx`.
    /// The loop ends after sending a [`ResolveOutcome::Found`], when `token`
    /// is cancelled, or when the receiver is gone. A tick that completes
    /// after cancellation is dropped without being sent.
    pub fn spawn_polling<M, F>(
        self: Arc<Self>,
        query: String,
        interval: Duration,
        initial_delay: Duration,
        mut token: CancelToken,
        tx: mpsc::Sender<M>,
        wrap: F,
    ) -> JoinHandle<()>
    where
        M: Send + 'static,
        F: Fn(ResolveOutcome) -> M + Send + 'static,
    {
        tokio::spawn(async move {
            info!(query = %query, "Resolution loop started");

            if !initial_delay.is_zero() {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("Resolution loop cancelled before first tick");
                        return;
                    }
                    _ = tokio::time::sleep(initial_delay) => {}
                }
            }

            loop {
                if token.is_cancelled() {
                    break;
                }

                let outcome = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    outcome = self.resolve(&query) => outcome,
                };

                // The tick may have finished in the same instant cancellation
                // was requested.
                if token.is_cancelled() {
                    debug!(outcome = outcome.label(), "Discarding tick result after cancellation");
                    break;
                }

                metrics::RESOLUTION_TICKS
                    .with_label_values(&[outcome.label()])
                    .inc();
                if let ResolveOutcome::Found(ref best) = outcome {
                    metrics::MATCH_SCORE
                        .with_label_values(&[])
                        .observe(best.score.blended);
                }

                let found = outcome.is_found();
                if tx.send(wrap(outcome)).await.is_err() {
                    warn!("Resolution result receiver dropped");
                    break;
                }
                if found {
                    break;
                }

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
            }

            info!(query = %query, "Resolution loop stopped");
        })
    }
}
