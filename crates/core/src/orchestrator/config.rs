//! Orchestrator configuration.

use serde::{Deserialize, Serialize};

use crate::backoff::{BackoffPolicy, DelayRange};

/// Configuration for the transaction orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Randomised pause before each artifact fetch and each submission.
    #[serde(default = "default_request_delay")]
    pub request_delay: DelayRange,

    /// Backoff after a failed artifact or context fetch.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff: DelayRange,

    /// Backoff after upstream rejected a submission.
    #[serde(default = "default_submit_failed_backoff")]
    pub submit_failed_backoff: DelayRange,

    /// Backoff before restarting from resolution after an internal fault.
    #[serde(default = "default_fault_restart_backoff")]
    pub fault_restart_backoff: DelayRange,

    /// Growth factor applied to a backoff window per consecutive attempt.
    /// 1.0 keeps every window flat.
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound for any grown backoff window (milliseconds).
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,

    /// Capacity of the status event channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_request_delay() -> DelayRange {
    DelayRange::new(50, 200)
}

fn default_retry_backoff() -> DelayRange {
    DelayRange::new(500, 2000)
}

fn default_submit_failed_backoff() -> DelayRange {
    DelayRange::new(1000, 3000)
}

fn default_fault_restart_backoff() -> DelayRange {
    DelayRange::new(500, 2000)
}

fn default_backoff_multiplier() -> f64 {
    1.0
}

fn default_max_backoff() -> u64 {
    30_000 // 30 seconds
}

fn default_event_capacity() -> usize {
    256
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            request_delay: default_request_delay(),
            retry_backoff: default_retry_backoff(),
            submit_failed_backoff: default_submit_failed_backoff(),
            fault_restart_backoff: default_fault_restart_backoff(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl OrchestratorConfig {
    fn policy(&self, range: DelayRange) -> BackoffPolicy {
        BackoffPolicy::growing(range, self.backoff_multiplier, self.max_backoff_ms)
    }

    pub fn retry_policy(&self) -> BackoffPolicy {
        self.policy(self.retry_backoff)
    }

    pub fn submit_failed_policy(&self) -> BackoffPolicy {
        self.policy(self.submit_failed_backoff)
    }

    pub fn fault_restart_policy(&self) -> BackoffPolicy {
        self.policy(self.fault_restart_backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.request_delay, DelayRange::new(50, 200));
        assert_eq!(config.retry_backoff, DelayRange::new(500, 2000));
        assert_eq!(config.submit_failed_backoff, DelayRange::new(1000, 3000));
        assert_eq!(config.fault_restart_backoff, DelayRange::new(500, 2000));
        assert_eq!(config.backoff_multiplier, 1.0);
        assert_eq!(config.max_backoff_ms, 30_000);
    }

    #[test]
    fn test_deserialize_minimal() {
        let toml = r#"
            [submit_failed_backoff]
            min_ms = 10
            max_ms = 20
        "#;
        let config: OrchestratorConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.submit_failed_backoff, DelayRange::new(10, 20));
        assert_eq!(config.retry_backoff, DelayRange::new(500, 2000));
    }

    #[test]
    fn test_policies_follow_multiplier() {
        let config = OrchestratorConfig {
            backoff_multiplier: 2.0,
            max_backoff_ms: 5000,
            ..Default::default()
        };
        let policy = config.submit_failed_policy();
        assert_eq!(policy.window(1), DelayRange::new(1000, 3000));
        assert_eq!(policy.window(2), DelayRange::new(2000, 5000));
    }
}
