//! Code relay data types.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of asking the relay for the latest code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodePoll {
    Code(String),
    NotYetAvailable,
}

/// A code delivered out of band for a recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneTimeCode {
    pub recipient: String,
    pub code: String,
    pub received_at: DateTime<Utc>,
}

/// Result of an issuance request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuanceOutcome {
    /// Upstream accepted the request; the cooldown restarts now.
    Accepted,
    /// Rejected locally without contacting upstream.
    Cooldown { remaining: Duration },
}

impl IssuanceOutcome {
    /// Remaining cooldown rounded up to whole seconds (0 when accepted).
    pub fn remaining_secs(&self) -> u64 {
        match self {
            IssuanceOutcome::Accepted => 0,
            IssuanceOutcome::Cooldown { remaining } => ceil_secs(*remaining),
        }
    }
}

pub(crate) fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_secs_rounds_up() {
        let outcome = IssuanceOutcome::Cooldown {
            remaining: Duration::from_millis(1001),
        };
        assert_eq!(outcome.remaining_secs(), 2);

        let outcome = IssuanceOutcome::Cooldown {
            remaining: Duration::from_secs(30),
        };
        assert_eq!(outcome.remaining_secs(), 30);
        assert_eq!(IssuanceOutcome::Accepted.remaining_secs(), 0);
    }
}
