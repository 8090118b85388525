//! Transaction orchestrator.
//!
//! Drives one transaction through its phases:
//! - **Resolving**: poll the catalog until a candidate matches the query
//! - **AcquiringArtifacts**: fetch and solve a challenge, collect a one-time code
//! - **Submitting**: send the transaction upstream, retrying on rejection
//!
//! All state lives in a single actor task; [`OrchestratorHandle`] talks to it
//! over a queue.

mod config;
mod runner;
mod state;
mod types;

pub use config::OrchestratorConfig;
pub use runner::{Collaborators, OrchestratorHandle, TransactionOrchestrator};
pub use state::{FillSource, TransactionState};
pub use types::{OrchestratorError, TransactionError, TransactionPhase, TransactionSnapshot};
