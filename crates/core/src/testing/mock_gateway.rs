//! Mock transaction gateway for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::catalog::CatalogEntry;
use crate::challenge::ChallengeArtifact;
use crate::gateway::{
    GatewayError, SubmissionPayload, SubmissionReceipt, TransactionContext, TransactionGateway,
};

use super::fixtures;

/// A recorded artifact fetch for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedArtifactRequest {
    pub entry_id: String,
    pub continuation: Option<String>,
    /// Token of the artifact that was returned, if any.
    pub issued_token: Option<String>,
}

/// A recorded issuance request for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedIssuance {
    pub recipient_id: String,
    pub entry_id: String,
}

/// Mock implementation of the TransactionGateway trait.
///
/// Provides controllable behavior for testing:
/// - Issue numbered challenge artifacts (`tok-1`, `tok-2`, ...)
/// - Return a configurable transaction context
/// - Replay queued submission results (default: accepted)
/// - Record every call, inject failures, delays and panics
#[derive(Debug)]
pub struct MockTransactionGateway {
    artifact_requests: Arc<RwLock<Vec<RecordedArtifactRequest>>>,
    artifact_errors: Arc<RwLock<VecDeque<GatewayError>>>,
    artifact_delay: Arc<RwLock<Option<Duration>>>,
    panic_on_next_artifact: Arc<RwLock<bool>>,

    context: Arc<RwLock<TransactionContext>>,
    context_errors: Arc<RwLock<VecDeque<GatewayError>>>,
    context_requests: Arc<RwLock<usize>>,

    issuances: Arc<RwLock<Vec<RecordedIssuance>>>,
    next_issuance_error: Arc<RwLock<Option<GatewayError>>>,
    issuance_delay: Arc<RwLock<Option<Duration>>>,

    submissions: Arc<RwLock<Vec<SubmissionPayload>>>,
    submit_responses: Arc<RwLock<VecDeque<Result<SubmissionReceipt, GatewayError>>>>,
    submit_delay: Arc<RwLock<Option<Duration>>>,
}

impl Default for MockTransactionGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransactionGateway {
    pub fn new() -> Self {
        Self {
            artifact_requests: Arc::new(RwLock::new(Vec::new())),
            artifact_errors: Arc::new(RwLock::new(VecDeque::new())),
            artifact_delay: Arc::new(RwLock::new(None)),
            panic_on_next_artifact: Arc::new(RwLock::new(false)),
            context: Arc::new(RwLock::new(fixtures::transaction_context())),
            context_errors: Arc::new(RwLock::new(VecDeque::new())),
            context_requests: Arc::new(RwLock::new(0)),
            issuances: Arc::new(RwLock::new(Vec::new())),
            next_issuance_error: Arc::new(RwLock::new(None)),
            issuance_delay: Arc::new(RwLock::new(None)),
            submissions: Arc::new(RwLock::new(Vec::new())),
            submit_responses: Arc::new(RwLock::new(VecDeque::new())),
            submit_delay: Arc::new(RwLock::new(None)),
        }
    }

    // --- artifacts ---

    /// Queue a failure for an upcoming artifact fetch.
    pub async fn push_artifact_error(&self, error: GatewayError) {
        self.artifact_errors.write().await.push_back(error);
    }

    /// Delay every artifact fetch by `delay`.
    pub async fn set_artifact_delay(&self, delay: Option<Duration>) {
        *self.artifact_delay.write().await = delay;
    }

    /// Panic inside the next artifact fetch.
    pub async fn panic_on_next_artifact(&self) {
        *self.panic_on_next_artifact.write().await = true;
    }

    pub async fn artifact_requests(&self) -> Vec<RecordedArtifactRequest> {
        self.artifact_requests.read().await.clone()
    }

    /// Tokens of all artifacts issued so far.
    pub async fn issued_tokens(&self) -> Vec<String> {
        self.artifact_requests
            .read()
            .await
            .iter()
            .filter_map(|r| r.issued_token.clone())
            .collect()
    }

    // --- context ---

    pub async fn set_context(&self, context: TransactionContext) {
        *self.context.write().await = context;
    }

    /// Queue a failure for an upcoming context fetch.
    pub async fn push_context_error(&self, error: GatewayError) {
        self.context_errors.write().await.push_back(error);
    }

    pub async fn context_request_count(&self) -> usize {
        *self.context_requests.read().await
    }

    // --- issuance ---

    pub async fn issuance_requests(&self) -> Vec<RecordedIssuance> {
        self.issuances.read().await.clone()
    }

    /// Make the next issuance request fail.
    pub async fn set_next_issuance_error(&self, error: GatewayError) {
        *self.next_issuance_error.write().await = Some(error);
    }

    /// Delay every issuance request by `delay`.
    pub async fn set_issuance_delay(&self, delay: Duration) {
        *self.issuance_delay.write().await = Some(delay);
    }

    // --- submission ---

    /// Queue a submission result; once the queue is empty submissions succeed.
    pub async fn push_submit_response(&self, response: Result<SubmissionReceipt, GatewayError>) {
        self.submit_responses.write().await.push_back(response);
    }

    /// Delay every submission by `delay`.
    pub async fn set_submit_delay(&self, delay: Duration) {
        *self.submit_delay.write().await = Some(delay);
    }

    pub async fn submissions(&self) -> Vec<SubmissionPayload> {
        self.submissions.read().await.clone()
    }
}

async fn maybe_sleep(delay: &RwLock<Option<Duration>>) {
    let delay = *delay.read().await;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl TransactionGateway for MockTransactionGateway {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_challenge_artifact(
        &self,
        entry_id: &str,
        continuation: Option<&str>,
    ) -> Result<ChallengeArtifact, GatewayError> {
        let index = {
            let mut requests = self.artifact_requests.write().await;
            requests.push(RecordedArtifactRequest {
                entry_id: entry_id.to_string(),
                continuation: continuation.map(str::to_string),
                issued_token: None,
            });
            requests.len() - 1
        };

        maybe_sleep(&self.artifact_delay).await;

        {
            let mut panic_flag = self.panic_on_next_artifact.write().await;
            if *panic_flag {
                *panic_flag = false;
                drop(panic_flag);
                panic!("mock gateway: injected artifact panic");
            }
        }

        if let Some(error) = self.artifact_errors.write().await.pop_front() {
            return Err(error);
        }

        let token = {
            let issued = self.issued_tokens().await.len();
            format!("tok-{}", issued + 1)
        };
        if let Some(request) = self.artifact_requests.write().await.get_mut(index) {
            request.issued_token = Some(token.clone());
        }

        Ok(fixtures::artifact(&token))
    }

    async fn fetch_transaction_context(
        &self,
        _entry: &CatalogEntry,
    ) -> Result<TransactionContext, GatewayError> {
        *self.context_requests.write().await += 1;

        if let Some(error) = self.context_errors.write().await.pop_front() {
            return Err(error);
        }
        Ok(self.context.read().await.clone())
    }

    async fn request_code_issuance(
        &self,
        recipient_id: &str,
        entry_id: &str,
    ) -> Result<(), GatewayError> {
        maybe_sleep(&self.issuance_delay).await;

        if let Some(error) = self.next_issuance_error.write().await.take() {
            return Err(error);
        }

        self.issuances.write().await.push(RecordedIssuance {
            recipient_id: recipient_id.to_string(),
            entry_id: entry_id.to_string(),
        });
        Ok(())
    }

    async fn submit_transaction(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, GatewayError> {
        self.submissions.write().await.push(payload.clone());

        maybe_sleep(&self.submit_delay).await;

        match self.submit_responses.write().await.pop_front() {
            Some(response) => response,
            None => Ok(SubmissionReceipt::accepted("redirect-token")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_artifacts_are_numbered_and_recorded() {
        let gateway = MockTransactionGateway::new();

        let first = gateway.fetch_challenge_artifact("e1", None).await.unwrap();
        gateway
            .push_artifact_error(GatewayError::Request("reset".to_string()))
            .await;
        assert!(gateway
            .fetch_challenge_artifact("e1", Some(&first.token))
            .await
            .is_err());
        let second = gateway
            .fetch_challenge_artifact("e1", Some(&first.token))
            .await
            .unwrap();

        assert_eq!(first.token, "tok-1");
        assert_eq!(second.token, "tok-2");

        let requests = gateway.artifact_requests().await;
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].continuation.as_deref(), Some("tok-1"));
        assert!(requests[1].issued_token.is_none());
        assert_eq!(gateway.issued_tokens().await, vec!["tok-1", "tok-2"]);
    }

    #[tokio::test]
    async fn test_submit_defaults_to_success() {
        let gateway = MockTransactionGateway::new();
        gateway
            .push_submit_response(Ok(SubmissionReceipt::rejected("sold out")))
            .await;

        let payload = fixtures::submission_payload();
        let first = gateway.submit_transaction(&payload).await.unwrap();
        assert!(first.success_token().is_none());
        let second = gateway.submit_transaction(&payload).await.unwrap();
        assert_eq!(second.success_token(), Some("redirect-token"));
        assert_eq!(gateway.submissions().await.len(), 2);
    }
}
