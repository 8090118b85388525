//! Upstream transaction gateway.
//!
//! The gateway wraps the multi-step purchase API: challenge artifacts, the
//! per-transaction context, code issuance and the final submission. The wire
//! format belongs to the implementation; the orchestrator only sees these
//! types.

mod types;

pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

use crate::catalog::CatalogEntry;
use crate::challenge::ChallengeArtifact;

/// Errors that can occur while talking to the transaction gateway.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Network or transport failure.
    #[error("gateway request failed: {0}")]
    Request(String),

    /// Upstream refused the request for a business reason.
    #[error("rejected by upstream: {0}")]
    Rejected(String),

    /// Upstream answered but the body could not be understood.
    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),
}

/// The upstream transaction API.
#[async_trait]
pub trait TransactionGateway: Send + Sync {
    /// Name of this gateway for logging.
    fn name(&self) -> &str;

    /// Fetch a new challenge for an entry.
    ///
    /// `continuation` is the token of the previous artifact, if any.
    async fn fetch_challenge_artifact(
        &self,
        entry_id: &str,
        continuation: Option<&str>,
    ) -> Result<ChallengeArtifact, GatewayError>;

    /// Fetch the request-scoped identifiers for an entry.
    async fn fetch_transaction_context(
        &self,
        entry: &CatalogEntry,
    ) -> Result<TransactionContext, GatewayError>;

    /// Ask upstream to send a one-time code to `recipient_id`.
    async fn request_code_issuance(
        &self,
        recipient_id: &str,
        entry_id: &str,
    ) -> Result<(), GatewayError>;

    /// Submit the transaction.
    async fn submit_transaction(
        &self,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, GatewayError>;
}
