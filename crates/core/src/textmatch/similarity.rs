//! Multi-metric similarity ensemble.
//!
//! Four independent signals are computed on normalized text and blended into
//! one ranking score:
//! 1. Levenshtein edit distance (insert/delete/substitute)
//! 2. Transposition-aware edit distance (optimal string alignment)
//! 3. Token-set Jaccard overlap
//! 4. Character n-gram Jaccard overlap

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::normalize::normalize;

/// Per-signal weights used by the blend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlendWeights {
    /// Weight for the plain edit-distance similarity.
    #[serde(default = "default_edit_weight")]
    pub edit: f64,
    /// Weight for the transposition-aware edit-distance similarity.
    #[serde(default = "default_transposition_weight")]
    pub transposition: f64,
    /// Weight for token-set Jaccard.
    #[serde(default = "default_token_weight")]
    pub token: f64,
    /// Weight for character n-gram Jaccard.
    #[serde(default = "default_ngram_weight")]
    pub ngram: f64,
}

fn default_edit_weight() -> f64 {
    0.35
}

fn default_transposition_weight() -> f64 {
    0.35
}

fn default_token_weight() -> f64 {
    0.20
}

fn default_ngram_weight() -> f64 {
    0.10
}

impl Default for BlendWeights {
    fn default() -> Self {
        Self {
            edit: default_edit_weight(),
            transposition: default_transposition_weight(),
            token: default_token_weight(),
            ngram: default_ngram_weight(),
        }
    }
}

impl BlendWeights {
    /// Sum of all weights.
    pub fn total(&self) -> f64 {
        self.edit + self.transposition + self.token + self.ngram
    }
}

/// The four component similarities plus the blended score, all in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub edit: f64,
    pub transposition: f64,
    pub token_jaccard: f64,
    pub ngram_jaccard: f64,
    pub blended: f64,
}

/// Computes [`ScoreBreakdown`]s between a query and candidate labels.
#[derive(Debug, Clone)]
pub struct SimilarityEnsemble {
    weights: BlendWeights,
    ngram_size: usize,
}

impl Default for SimilarityEnsemble {
    fn default() -> Self {
        Self::new()
    }
}

impl SimilarityEnsemble {
    /// Create an ensemble with the default weights and bigrams.
    pub fn new() -> Self {
        Self {
            weights: BlendWeights::default(),
            ngram_size: 2,
        }
    }

    /// Create an ensemble with custom weights and n-gram size.
    pub fn with_weights(weights: BlendWeights, ngram_size: usize) -> Self {
        Self {
            weights,
            ngram_size: ngram_size.max(1),
        }
    }

    pub fn weights(&self) -> &BlendWeights {
        &self.weights
    }

    /// Score a raw query against a raw candidate label.
    pub fn score(&self, query: &str, label: &str) -> ScoreBreakdown {
        self.score_normalized(&normalize(query), &normalize(label))
    }

    /// Score two strings that are already normalized.
    pub fn score_normalized(&self, a: &str, b: &str) -> ScoreBreakdown {
        if a == b {
            return self.blend(1.0, 1.0, 1.0, 1.0);
        }

        let a_chars: Vec<char> = a.chars().collect();
        let b_chars: Vec<char> = b.chars().collect();
        let max_len = a_chars.len().max(b_chars.len());

        let edit = distance_similarity(levenshtein(&a_chars, &b_chars), max_len);
        let transposition =
            distance_similarity(transposition_distance(&a_chars, &b_chars), max_len);
        let token_jaccard = token_jaccard(a, b);
        let ngram_jaccard = ngram_jaccard(&a_chars, &b_chars, self.ngram_size);

        self.blend(edit, transposition, token_jaccard, ngram_jaccard)
    }

    fn blend(&self, edit: f64, transposition: f64, token: f64, ngram: f64) -> ScoreBreakdown {
        let blended = edit * self.weights.edit
            + transposition * self.weights.transposition
            + token * self.weights.token
            + ngram * self.weights.ngram;

        ScoreBreakdown {
            edit,
            transposition,
            token_jaccard: token,
            ngram_jaccard: ngram,
            blended,
        }
    }
}

/// `1 - distance / max_len`, or 1 when both strings are empty.
fn distance_similarity(distance: usize, max_len: usize) -> f64 {
    if max_len == 0 {
        return 1.0;
    }
    1.0 - distance as f64 / max_len as f64
}

/// Classic Levenshtein distance with unit costs.
pub fn levenshtein(a: &[char], b: &[char]) -> usize {
    let a_len = a.len();
    let b_len = b.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut matrix = vec![vec![0usize; b_len + 1]; a_len + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, val) in matrix[0].iter_mut().enumerate() {
        *val = j;
    }

    for (i, a_char) in a.iter().enumerate() {
        for (j, b_char) in b.iter().enumerate() {
            let cost = if a_char == b_char { 0 } else { 1 };
            matrix[i + 1][j + 1] = (matrix[i][j + 1] + 1)
                .min(matrix[i + 1][j] + 1)
                .min(matrix[i][j] + cost);
        }
    }

    matrix[a_len][b_len]
}

/// Levenshtein distance plus unit-cost adjacent transposition
/// (optimal string alignment variant of Damerau-Levenshtein).
pub fn transposition_distance(a: &[char], b: &[char]) -> usize {
    let a_len = a.len();
    let b_len = b.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut matrix = vec![vec![0usize; b_len + 1]; a_len + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, val) in matrix[0].iter_mut().enumerate() {
        *val = j;
    }

    for i in 1..=a_len {
        for j in 1..=b_len {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            let mut best = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);

            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                best = best.min(matrix[i - 2][j - 2] + 1);
            }

            matrix[i][j] = best;
        }
    }

    matrix[a_len][b_len]
}

/// Jaccard similarity of whitespace-separated token sets; 1 when both are empty.
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let set_a: HashSet<&str> = a.split_whitespace().collect();
    let set_b: HashSet<&str> = b.split_whitespace().collect();

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.len() + set_b.len() - intersection;

    if union == 0 {
        return 1.0;
    }
    intersection as f64 / union as f64
}

/// Jaccard similarity of character n-gram sets; 0 if either side is shorter than `n`.
pub fn ngram_jaccard(a: &[char], b: &[char], n: usize) -> f64 {
    if n == 0 || a.len() < n || b.len() < n {
        return 0.0;
    }

    let grams_a: HashSet<&[char]> = a.windows(n).collect();
    let grams_b: HashSet<&[char]> = b.windows(n).collect();

    let intersection = grams_a.intersection(&grams_b).count();
    let union = grams_a.len() + grams_b.len() - intersection;

    if union == 0 {
        return 1.0;
    }
    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_levenshtein_basics() {
        assert_eq!(levenshtein(&chars(""), &chars("abc")), 3);
        assert_eq!(levenshtein(&chars("abc"), &chars("")), 3);
        assert_eq!(levenshtein(&chars("abc"), &chars("abc")), 0);
        assert_eq!(levenshtein(&chars("kitten"), &chars("sitting")), 3);
    }

    #[test]
    fn test_levenshtein_counts_swap_as_two() {
        assert_eq!(levenshtein(&chars("ab"), &chars("ba")), 2);
    }

    #[test]
    fn test_transposition_distance_counts_swap_as_one() {
        assert_eq!(transposition_distance(&chars("ab"), &chars("ba")), 1);
        assert_eq!(transposition_distance(&chars("deluxe"), &chars("deluex")), 1);
        assert_eq!(transposition_distance(&chars(""), &chars("abc")), 3);
        assert_eq!(transposition_distance(&chars("abc"), &chars("abc")), 0);
    }

    #[test]
    fn test_transposition_never_exceeds_levenshtein() {
        let pairs = [("ca", "abc"), ("model x", "modle x"), ("abcdef", "badcfe")];
        for (a, b) in pairs {
            assert!(transposition_distance(&chars(a), &chars(b)) <= levenshtein(&chars(a), &chars(b)));
        }
    }

    #[test]
    fn test_token_jaccard() {
        assert!(approx(token_jaccard("", ""), 1.0));
        assert!(approx(token_jaccard("a", ""), 0.0));
        assert!(approx(token_jaccard("model x", "model y"), 1.0 / 3.0));
        assert!(approx(token_jaccard("a b", "b a"), 1.0));
    }

    #[test]
    fn test_ngram_jaccard() {
        assert!(approx(ngram_jaccard(&chars("a"), &chars("abc"), 2), 0.0));
        assert!(approx(ngram_jaccard(&chars(""), &chars(""), 2), 0.0));
        // ab,bc vs ab,bd -> 1 shared of 3
        assert!(approx(ngram_jaccard(&chars("abc"), &chars("abd"), 2), 1.0 / 3.0));
    }

    #[test]
    fn test_identical_strings_score_one() {
        let ensemble = SimilarityEnsemble::new();
        for s in ["Model X Deluxe", "x", "۲۰۷", "a b c"] {
            let score = ensemble.score(s, s);
            assert!(approx(score.blended, 1.0), "score({:?}) = {}", s, score.blended);
        }
    }

    #[test]
    fn test_normalization_applied_before_scoring() {
        let ensemble = SimilarityEnsemble::new();
        let score = ensemble.score("MODEL-X", "model x");
        assert!(approx(score.blended, 1.0));
    }

    #[test]
    fn test_blend_uses_weights() {
        let ensemble = SimilarityEnsemble::new();
        let score = ensemble.score("model x", "model y");
        let expected = score.edit * 0.35
            + score.transposition * 0.35
            + score.token_jaccard * 0.20
            + score.ngram_jaccard * 0.10;
        assert!(approx(score.blended, expected));
        assert!(score.blended > 0.0 && score.blended < 1.0);
    }

    #[test]
    fn test_scores_are_bounded() {
        let ensemble = SimilarityEnsemble::new();
        let pairs = [("", "abc"), ("abc", ""), ("abc", "xyz"), ("a", "b")];
        for (a, b) in pairs {
            let s = ensemble.score(a, b);
            for v in [s.edit, s.transposition, s.token_jaccard, s.ngram_jaccard, s.blended] {
                assert!((0.0..=1.0).contains(&v), "{} out of range for {:?}", v, (a, b));
            }
        }
    }

    #[test]
    fn test_closer_spelling_scores_higher() {
        let ensemble = SimilarityEnsemble::new();
        let near = ensemble.score("model x delux", "Model X Deluxe Trim");
        let far = ensemble.score("model x delux", "Model Y Base");
        assert!(near.blended > far.blended);
    }

    #[test]
    fn test_custom_weights() {
        let weights = BlendWeights {
            edit: 1.0,
            transposition: 0.0,
            token: 0.0,
            ngram: 0.0,
        };
        let ensemble = SimilarityEnsemble::with_weights(weights, 2);
        let score = ensemble.score("abcd", "abce");
        assert!(approx(score.blended, 0.75));
        assert!(approx(ensemble.weights().total(), 1.0));
    }
}
