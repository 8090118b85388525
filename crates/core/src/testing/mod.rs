//! Testing utilities and mock implementations.
//!
//! This module provides mock implementations of every collaborator trait,
//! allowing the orchestrator to be exercised end to end without any
//! upstream service.
//!
//! # Example
//!
//! ```rust,ignore
//! use dropwatch_core::testing::{fixtures, MockCatalogSource, MockCodeRelay, MockTransactionGateway};
//!
//! let catalog = MockCatalogSource::new();
//! let gateway = MockTransactionGateway::new();
//! let relay = MockCodeRelay::new();
//!
//! // Configure mock responses
//! catalog.set_entries(vec![fixtures::catalog_entry("1", "Model X", "Deluxe")]).await;
//! relay.push_code("48213").await;
//! ```

mod mock_catalog;
mod mock_gateway;
mod mock_relay;
mod mock_solver;

pub use mock_catalog::MockCatalogSource;
pub use mock_gateway::{MockTransactionGateway, RecordedArtifactRequest, RecordedIssuance};
pub use mock_relay::MockCodeRelay;
pub use mock_solver::MockSolvingCapability;

/// Test fixtures and helper functions.
pub mod fixtures {
    use uuid::Uuid;

    use crate::catalog::{CatalogEntry, CatalogSnapshot};
    use crate::challenge::ChallengeArtifact;
    use crate::gateway::{SubmissionPayload, TransactionContext};

    /// Create a catalog entry with a couple of numeric attributes.
    pub fn catalog_entry(id: &str, primary: &str, secondary: &str) -> CatalogEntry {
        let mut entry = CatalogEntry::new(id, primary, secondary);
        entry.attributes = serde_json::json!({
            "circulation_id": format!("circ-{}", id),
            "price": 1_000_000,
        });
        entry
    }

    /// Snapshot with the sample entries used across tests.
    pub fn sample_snapshot() -> CatalogSnapshot {
        CatalogSnapshot::new(vec![
            catalog_entry("1", "Model X", "Deluxe Trim"),
            catalog_entry("2", "Model Y", "Base"),
        ])
    }

    /// Markup challenge artifact with the given token.
    pub fn artifact(token: &str) -> ChallengeArtifact {
        ChallengeArtifact::markup(token, format!("<svg data-token=\"{}\"/>", token))
    }

    /// Transaction context with fixed identifiers.
    pub fn transaction_context() -> TransactionContext {
        TransactionContext {
            color_id: "3".to_string(),
            usage_id: "1".to_string(),
            partner_id: "1024".to_string(),
            partner_record: serde_json::json!({ "title": "Mock partner", "city": "Tehran" }),
        }
    }

    /// A complete submission payload.
    pub fn submission_payload() -> SubmissionPayload {
        let context = transaction_context();
        SubmissionPayload {
            request_id: Uuid::new_v4(),
            entry_id: "1".to_string(),
            color_id: context.color_id,
            usage_id: context.usage_id,
            partner_id: context.partner_id,
            partner_record: context.partner_record,
            code: "48213".to_string(),
            challenge_answer: "ab12".to_string(),
            challenge_token: "tok-1".to_string(),
            quantity: 1,
        }
    }
}
