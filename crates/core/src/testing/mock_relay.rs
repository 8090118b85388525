//! Mock code relay for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::relay::{CodePoll, CodeRelay, RelayError};

/// Mock implementation of the CodeRelay trait.
///
/// Queued results are returned one per poll. Once the queue is empty the
/// relay answers with the sticky code if one is set, else "not yet".
#[derive(Debug, Default)]
pub struct MockCodeRelay {
    queued: Arc<RwLock<VecDeque<Result<CodePoll, RelayError>>>>,
    sticky_code: Arc<RwLock<Option<String>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    polls: Arc<RwLock<Vec<String>>>,
}

impl MockCodeRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a delivered code.
    pub async fn push_code(&self, code: &str) {
        self.queued
            .write()
            .await
            .push_back(Ok(CodePoll::Code(code.to_string())));
    }

    /// Queue a "not yet available" answer.
    pub async fn push_not_yet(&self) {
        self.queued.write().await.push_back(Ok(CodePoll::NotYetAvailable));
    }

    /// Queue a failure.
    pub async fn push_error(&self, error: RelayError) {
        self.queued.write().await.push_back(Err(error));
    }

    /// Code returned whenever the queue is empty.
    pub async fn set_sticky_code(&self, code: Option<&str>) {
        *self.sticky_code.write().await = code.map(str::to_string);
    }

    /// Delay every poll by `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Recipients polled so far, in order.
    pub async fn polled_recipients(&self) -> Vec<String> {
        self.polls.read().await.clone()
    }

    pub async fn poll_count(&self) -> usize {
        self.polls.read().await.len()
    }
}

#[async_trait]
impl CodeRelay for MockCodeRelay {
    fn name(&self) -> &str {
        "mock"
    }

    async fn poll_issued_code(&self, recipient_id: &str) -> Result<CodePoll, RelayError> {
        self.polls.write().await.push(recipient_id.to_string());

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(result) = self.queued.write().await.pop_front() {
            return result;
        }

        match self.sticky_code.read().await.clone() {
            Some(code) => Ok(CodePoll::Code(code)),
            None => Ok(CodePoll::NotYetAvailable),
        }
    }
}
