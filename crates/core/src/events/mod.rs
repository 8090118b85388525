//! Status events exposed to an interface layer.
//!
//! The orchestrator is the only producer. Consumers subscribe to an
//! [`EventBroadcaster`]; a slow consumer lags and loses the oldest events
//! instead of blocking the orchestrator.

mod broadcaster;

pub use broadcaster::EventBroadcaster;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::CatalogEntry;
use crate::challenge::ChallengeArtifact;
use crate::orchestrator::{TransactionError, TransactionPhase};
use crate::textmatch::ScoreBreakdown;

/// How an operator message should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warn,
    Error,
}

/// Something the operator may want to know about.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusEvent {
    /// The resolver selected a catalog entry.
    CandidateResolved {
        transaction_id: Uuid,
        entry: CatalogEntry,
        score: ScoreBreakdown,
    },
    /// The catalog had entries but none matched.
    CandidateNotFound { query: String },
    /// The transaction moved to a new phase.
    PhaseChanged {
        from: TransactionPhase,
        to: TransactionPhase,
    },
    /// A new challenge artifact is held; older answers are void.
    ChallengeIssued {
        serial: u64,
        artifact: ChallengeArtifact,
    },
    /// The solver chain answered the current artifact.
    ChallengeSolved { serial: u64, capability: String },
    /// A one-time code arrived from the relay.
    CodeReceived { code: String },
    /// Free-form operator message.
    Message {
        severity: Severity,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<TransactionError>,
    },
}

/// A status event with the time it was emitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: StatusEvent,
}
