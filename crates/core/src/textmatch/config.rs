//! Matching configuration.

use serde::{Deserialize, Serialize};

use super::similarity::{BlendWeights, SimilarityEnsemble};

/// Configuration for the similarity ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Blend weights; should sum to 1.0.
    #[serde(default)]
    pub weights: BlendWeights,

    /// Character n-gram size for the n-gram overlap signal.
    #[serde(default = "default_ngram_size")]
    pub ngram_size: usize,
}

fn default_ngram_size() -> usize {
    2
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            weights: BlendWeights::default(),
            ngram_size: default_ngram_size(),
        }
    }
}

impl MatchingConfig {
    /// Build the ensemble described by this config.
    pub fn ensemble(&self) -> SimilarityEnsemble {
        SimilarityEnsemble::with_weights(self.weights, self.ngram_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MatchingConfig::default();
        assert_eq!(config.ngram_size, 2);
        assert!((config.weights.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_deserialize_partial_weights() {
        let toml = r#"
            ngram_size = 3

            [weights]
            token = 0.5
        "#;
        let config: MatchingConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.ngram_size, 3);
        assert_eq!(config.weights.token, 0.5);
        assert_eq!(config.weights.edit, 0.35);
    }
}
