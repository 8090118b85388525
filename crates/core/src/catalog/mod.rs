//! Upstream catalog abstraction.
//!
//! A [`CatalogSource`] returns the whole list of currently purchasable entries
//! in one call. Snapshots are never mutated; the next poll supersedes them.

mod types;

pub use types::*;

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while fetching a catalog snapshot.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Network or transport failure.
    #[error("catalog request failed: {0}")]
    Request(String),

    /// Upstream answered but the body could not be understood.
    #[error("invalid catalog response: {0}")]
    InvalidResponse(String),
}

/// Source of catalog snapshots.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Name of this source for logging.
    fn name(&self) -> &str;

    /// Fetch the full catalog as it is right now. No side effects expected.
    async fn fetch_snapshot(&self) -> Result<CatalogSnapshot, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CatalogError::Request("connection reset".to_string());
        assert_eq!(err.to_string(), "catalog request failed: connection reset");

        let err = CatalogError::InvalidResponse("missing field".to_string());
        assert_eq!(err.to_string(), "invalid catalog response: missing field");
    }
}
