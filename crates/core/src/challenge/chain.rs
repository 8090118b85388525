//! Ordered fallback over solving capabilities.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::backoff::BackoffPolicy;
use crate::metrics;

use super::error::ChallengeError;
use super::traits::SolvingCapability;
use super::types::{ChallengeArtifact, SolvedChallenge};

/// Tries capabilities in order until one returns a usable answer.
#[derive(Clone)]
pub struct ChallengeSolverChain {
    capabilities: Vec<Arc<dyn SolvingCapability>>,
    timeout: Duration,
}

impl std::fmt::Debug for ChallengeSolverChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChallengeSolverChain")
            .field("capabilities", &self.capability_names())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ChallengeSolverChain {
    /// Chain over `capabilities` in the given order.
    pub fn new(capabilities: Vec<Arc<dyn SolvingCapability>>, timeout: Duration) -> Self {
        Self {
            capabilities,
            timeout,
        }
    }

    /// Chain built from a registry of capabilities and an ordering by name.
    ///
    /// An empty `order` keeps registry order. Names with no registered
    /// capability are logged and skipped.
    pub fn from_registry(
        order: &[String],
        registry: Vec<Arc<dyn SolvingCapability>>,
        timeout: Duration,
    ) -> Self {
        if order.is_empty() {
            return Self::new(registry, timeout);
        }

        let mut capabilities = Vec::with_capacity(order.len());
        for name in order {
            match registry.iter().find(|c| c.name() == name) {
                Some(capability) => capabilities.push(Arc::clone(capability)),
                None => warn!(capability = %name, "Unknown solving capability in order, skipping"),
            }
        }

        Self::new(capabilities, timeout)
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Capability names in the order they are tried.
    pub fn capability_names(&self) -> Vec<String> {
        self.capabilities
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Run the chain once.
    ///
    /// Returns the first non-empty answer, trimmed and lower-cased. Fails only
    /// when every capability failed, timed out or answered empty.
    pub async fn solve(&self, artifact: &ChallengeArtifact) -> Result<SolvedChallenge, ChallengeError> {
        if self.capabilities.is_empty() {
            return Err(ChallengeError::NoCapabilities);
        }

        for capability in &self.capabilities {
            let name = capability.name();
            match self.try_capability(capability.as_ref(), artifact).await {
                Ok(answer) => {
                    metrics::CHALLENGE_SOLVES
                        .with_label_values(&[name, "success"])
                        .inc();
                    info!(capability = %name, "Challenge solved");
                    return Ok(SolvedChallenge {
                        answer,
                        capability: name.to_string(),
                        attempt: 1,
                    });
                }
                Err(e) => {
                    let result = match e {
                        ChallengeError::Timeout { .. } => "timeout",
                        ChallengeError::InvalidAnswer { .. } => "invalid",
                        _ => "error",
                    };
                    metrics::CHALLENGE_SOLVES
                        .with_label_values(&[name, result])
                        .inc();
                    warn!(capability = %name, error = %e, "Solving capability failed, trying next");
                }
            }
        }

        Err(ChallengeError::AllFailed {
            attempted: self.capabilities.len(),
        })
    }

    /// Run the chain up to `max_attempts` times.
    ///
    /// Waits `backoff.delay(attempt)` between attempts, never after the last.
    pub async fn solve_with_retries(
        &self,
        artifact: &ChallengeArtifact,
        max_attempts: u32,
        backoff: &BackoffPolicy,
    ) -> Result<SolvedChallenge, ChallengeError> {
        let max_attempts = max_attempts.max(1);

        for attempt in 1..=max_attempts {
            match self.solve(artifact).await {
                Ok(mut solved) => {
                    solved.attempt = attempt;
                    return Ok(solved);
                }
                Err(ChallengeError::NoCapabilities) => return Err(ChallengeError::NoCapabilities),
                Err(e) => {
                    debug!(attempt, max_attempts, error = %e, "Challenge attempt failed");
                    if attempt < max_attempts {
                        tokio::time::sleep(backoff.delay(attempt)).await;
                    }
                }
            }
        }

        Err(ChallengeError::Exhausted {
            attempts: max_attempts,
        })
    }

    async fn try_capability(
        &self,
        capability: &dyn SolvingCapability,
        artifact: &ChallengeArtifact,
    ) -> Result<String, ChallengeError> {
        let name = capability.name().to_string();
        let answer = tokio::time::timeout(self.timeout, capability.solve(artifact))
            .await
            .map_err(|_| ChallengeError::Timeout {
                name: name.clone(),
                timeout_ms: self.timeout.as_millis() as u64,
            })??;

        let answer = answer.trim().to_lowercase();
        if answer.is_empty() {
            return Err(ChallengeError::InvalidAnswer { name });
        }
        Ok(answer)
    }
}
