//! Types for the transaction orchestrator.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::catalog::CatalogEntry;
use crate::events::Severity;

/// Phase of the active transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionPhase {
    /// No active transaction.
    #[default]
    Idle,
    /// Polling the catalog for a matching candidate.
    Resolving,
    /// Waiting for a challenge answer and a one-time code.
    AcquiringArtifacts,
    /// Both values present; waiting for (auto or manual) confirmation.
    ReadyToSubmit,
    /// Submission in flight.
    Submitting,
    /// Last submission was rejected; backing off before a fresh round.
    SubmissionFailed,
    /// Upstream accepted the submission.
    Completed,
}

impl TransactionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionPhase::Idle => "idle",
            TransactionPhase::Resolving => "resolving",
            TransactionPhase::AcquiringArtifacts => "acquiring_artifacts",
            TransactionPhase::ReadyToSubmit => "ready_to_submit",
            TransactionPhase::Submitting => "submitting",
            TransactionPhase::SubmissionFailed => "submission_failed",
            TransactionPhase::Completed => "completed",
        }
    }

    /// True when no further work happens without operator action.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionPhase::Idle | TransactionPhase::Completed)
    }
}

impl std::fmt::Display for TransactionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced to the operator.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionError {
    /// A network call failed; retried automatically.
    #[error("transient fetch error: {reason}")]
    TransientFetchError { reason: String },

    /// Automatic challenge solving gave up; manual input needed.
    #[error("challenge acquisition failed: {reason}")]
    ChallengeAcquisitionFailed { reason: String },

    /// A code was requested too recently.
    #[error("code cooldown active, {remaining_secs}s remaining")]
    CodeCooldownActive { remaining_secs: u64 },

    /// Upstream rejected the submission; retried with backoff.
    #[error("submission rejected: {reason}")]
    SubmissionRejected { reason: String },

    /// Required context was missing at submission; the transaction was reset.
    #[error("incomplete transaction state: {missing}")]
    IncompleteTransactionState { missing: String },
}

impl TransactionError {
    /// Severity used when surfacing this error.
    pub fn severity(&self) -> Severity {
        match self {
            TransactionError::TransientFetchError { .. } => Severity::Warn,
            TransactionError::ChallengeAcquisitionFailed { .. } => Severity::Warn,
            TransactionError::CodeCooldownActive { .. } => Severity::Info,
            TransactionError::SubmissionRejected { .. } => Severity::Error,
            TransactionError::IncompleteTransactionState { .. } => Severity::Error,
        }
    }

    /// Whether the orchestrator keeps going on its own after this error.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransactionError::IncompleteTransactionState { .. })
    }
}

/// Errors returned by the orchestrator handle.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The orchestrator task is gone.
    #[error("orchestrator is not running")]
    NotRunning,

    /// The command does not apply to the current phase.
    #[error("invalid transaction phase: expected {expected}, got {actual}")]
    InvalidPhase {
        expected: String,
        actual: TransactionPhase,
    },

    /// A submission is in flight; the command must wait for its result.
    #[error("a submission is in flight")]
    SubmissionInFlight,

    /// The query is empty after normalization.
    #[error("query is empty")]
    EmptyQuery,

    /// The supplied value is empty.
    #[error("empty value for {0}")]
    EmptyValue(&'static str),

    /// No transaction has a resolved candidate yet.
    #[error("no active transaction")]
    NoActiveTransaction,

    /// The answer was given for an artifact that is no longer held.
    #[error("challenge {supplied} is stale (current: {current:?})")]
    StaleArtifact { supplied: u64, current: Option<u64> },

    /// Requesting a one-time code failed.
    #[error("code request failed: {0}")]
    CodeRequest(String),
}

/// Point-in-time view of the orchestrator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransactionSnapshot {
    pub phase: TransactionPhase,
    /// Id of the active transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<CatalogEntry>,
    /// Serial of the challenge artifact currently held.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_serial: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub challenge_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub has_context: bool,
    pub code_requested: bool,
    pub submission_in_flight: bool,
    /// Submissions attempted in this transaction.
    pub submission_attempts: u32,
    /// Redirect token of a completed transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_token: Option<String>,
}
