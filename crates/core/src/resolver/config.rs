//! Resolver configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the candidate resolver poll loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Delay between catalog polls (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Minimum blended score a candidate needs to be accepted (0.0-1.0).
    /// 0.0 accepts whatever scores best.
    #[serde(default)]
    pub min_score: f64,
}

fn default_poll_interval() -> u64 {
    2500
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            min_score: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResolverConfig::default();
        assert_eq!(config.poll_interval_ms, 2500);
        assert_eq!(config.min_score, 0.0);
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            poll_interval_ms = 1000
            min_score = 0.6
        "#;
        let config: ResolverConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.min_score, 0.6);
    }
}
