//! Mock solving capability for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::challenge::{ChallengeArtifact, ChallengeError, SolvingCapability};

/// Mock implementation of the SolvingCapability trait.
///
/// Queued responses are returned first, then the default response.
/// Every call records the token of the artifact it was given.
#[derive(Debug)]
pub struct MockSolvingCapability {
    name: String,
    queued: Arc<RwLock<VecDeque<Result<String, ChallengeError>>>>,
    default_response: Arc<RwLock<Result<String, ChallengeError>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockSolvingCapability {
    fn with_default(name: &str, default_response: Result<String, ChallengeError>) -> Self {
        Self {
            name: name.to_string(),
            queued: Arc::new(RwLock::new(VecDeque::new())),
            default_response: Arc::new(RwLock::new(default_response)),
            delay: Arc::new(RwLock::new(None)),
            calls: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Capability that always answers `answer`.
    pub fn with_answer(name: &str, answer: &str) -> Self {
        Self::with_default(name, Ok(answer.to_string()))
    }

    /// Capability that always fails with `reason`.
    pub fn failing(name: &str, reason: &str) -> Self {
        Self::with_default(
            name,
            Err(ChallengeError::Capability {
                name: name.to_string(),
                reason: reason.to_string(),
            }),
        )
    }

    /// Queue a response returned before the default one.
    pub async fn push_response(&self, response: Result<String, ChallengeError>) {
        self.queued.write().await.push_back(response);
    }

    /// Replace the default response.
    pub async fn set_default_response(&self, response: Result<String, ChallengeError>) {
        *self.default_response.write().await = response;
    }

    /// Delay every call by `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    pub async fn call_count(&self) -> usize {
        self.calls.read().await.len()
    }

    /// Artifact tokens this capability was asked to solve, in order.
    pub async fn solved_tokens(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl SolvingCapability for MockSolvingCapability {
    fn name(&self) -> &str {
        &self.name
    }

    async fn solve(&self, artifact: &ChallengeArtifact) -> Result<String, ChallengeError> {
        self.calls.write().await.push(artifact.token.clone());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(response) = self.queued.write().await.pop_front() {
            return response;
        }
        self.default_response.read().await.clone()
    }
}
