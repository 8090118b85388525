//! Best-candidate selection over a catalog snapshot.

use serde::{Deserialize, Serialize};

use crate::catalog::CatalogEntry;

use super::normalize::normalize;
use super::similarity::{ScoreBreakdown, SimilarityEnsemble};

/// A catalog entry together with the score that made it win.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntry {
    pub entry: CatalogEntry,
    pub score: ScoreBreakdown,
}

/// Pick the entry whose combined label best matches `query`.
///
/// Entries whose combined label normalizes to nothing are skipped. Only a
/// strictly greater blended score replaces the current best, so the first
/// of several equal maxima wins. Returns `None` when no entry was eligible.
pub fn select_best<'a, I>(ensemble: &SimilarityEnsemble, query: &str, entries: I) -> Option<ScoredEntry>
where
    I: IntoIterator<Item = &'a CatalogEntry>,
{
    let query = normalize(query);
    let mut best: Option<ScoredEntry> = None;

    for entry in entries {
        let label = normalize(&entry.combined_label());
        if label.is_empty() {
            continue;
        }

        let score = ensemble.score_normalized(&query, &label);
        let better = match &best {
            Some(current) => score.blended > current.score.blended,
            None => true,
        };

        if better {
            best = Some(ScoredEntry {
                entry: entry.clone(),
                score,
            });
        }
    }

    best
}
