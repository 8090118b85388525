//! Challenge solving configuration.

use serde::{Deserialize, Serialize};

use crate::backoff::DelayRange;

/// Configuration for automatic challenge solving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeConfig {
    /// Run the solver chain automatically.
    /// When disabled, every artifact is surfaced for manual input.
    #[serde(default = "default_auto_solve")]
    pub auto_solve: bool,

    /// Capability names in the order they are tried.
    /// Empty means registration order.
    #[serde(default)]
    pub capability_order: Vec<String>,

    /// Per-capability call timeout (milliseconds).
    #[serde(default = "default_capability_timeout")]
    pub capability_timeout_ms: u64,

    /// How many times the whole chain is run before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay between chain attempts.
    #[serde(default = "default_retry_delay")]
    pub retry_delay: DelayRange,
}

fn default_auto_solve() -> bool {
    true
}

fn default_capability_timeout() -> u64 {
    15_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> DelayRange {
    DelayRange::fixed(500)
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        Self {
            auto_solve: default_auto_solve(),
            capability_order: Vec::new(),
            capability_timeout_ms: default_capability_timeout(),
            max_attempts: default_max_attempts(),
            retry_delay: default_retry_delay(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ChallengeConfig::default();
        assert!(config.auto_solve);
        assert!(config.capability_order.is_empty());
        assert_eq!(config.capability_timeout_ms, 15_000);
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.retry_delay, DelayRange::new(500, 500));
    }

    #[test]
    fn test_deserialize_full() {
        let toml = r#"
            auto_solve = false
            capability_order = ["solver-2", "solver-1"]
            capability_timeout_ms = 5000
            max_attempts = 5

            [retry_delay]
            min_ms = 100
            max_ms = 900
        "#;
        let config: ChallengeConfig = toml::from_str(toml).unwrap();
        assert!(!config.auto_solve);
        assert_eq!(config.capability_order, vec!["solver-2", "solver-1"]);
        assert_eq!(config.capability_timeout_ms, 5000);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.retry_delay, DelayRange::new(100, 900));
    }
}
