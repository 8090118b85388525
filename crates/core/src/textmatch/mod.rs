//! Fuzzy text matching used to pick a catalog entry from a free-text query.
//!
//! ```text
//! query ──normalize──┐
//!                    ├──► SimilarityEnsemble ──► ScoreBreakdown ──► select_best
//! label ──normalize──┘
//! ```
//!
//! Everything here is pure and synchronous; the resolver calls it once per
//! poll tick against a fresh snapshot.

mod config;
mod normalize;
mod selector;
mod similarity;

pub use config::MatchingConfig;
pub use normalize::normalize;
pub use selector::{select_best, ScoredEntry};
pub use similarity::{
    levenshtein, ngram_jaccard, token_jaccard, transposition_distance, BlendWeights,
    ScoreBreakdown, SimilarityEnsemble,
};
