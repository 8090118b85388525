//! Error types for challenge solving.

use thiserror::Error;

/// Errors that can occur while solving a challenge.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChallengeError {
    /// The chain has no capability to try.
    #[error("no solving capabilities configured")]
    NoCapabilities,

    /// A capability reported a failure.
    #[error("capability {name} failed: {reason}")]
    Capability { name: String, reason: String },

    /// A capability did not answer within its timeout.
    #[error("capability {name} timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },

    /// A capability answered with nothing usable.
    #[error("capability {name} returned an empty answer")]
    InvalidAnswer { name: String },

    /// Every capability in the chain failed.
    #[error("all {attempted} capabilities failed")]
    AllFailed { attempted: usize },

    /// The chain failed on every retry.
    #[error("challenge unsolved after {attempts} attempts")]
    Exhausted { attempts: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ChallengeError::Timeout {
            name: "solver-1".to_string(),
            timeout_ms: 15000,
        };
        assert_eq!(err.to_string(), "capability solver-1 timed out after 15000ms");

        let err = ChallengeError::Exhausted { attempts: 3 };
        assert_eq!(err.to_string(), "challenge unsolved after 3 attempts");
    }
}
