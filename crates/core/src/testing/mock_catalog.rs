//! Mock catalog source for testing.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::catalog::{CatalogEntry, CatalogError, CatalogSnapshot, CatalogSource};

/// Mock implementation of the CatalogSource trait.
///
/// Provides controllable behavior for testing:
/// - Return a configurable list of entries
/// - Count fetches for assertions
/// - Simulate failures and slow fetches
///
/// # Example
///
/// ```rust,ignore
/// let catalog = MockCatalogSource::new();
/// catalog.set_entries(vec![fixtures::catalog_entry("1", "Model X", "Deluxe")]).await;
///
/// let snapshot = catalog.fetch_snapshot().await?;
/// assert_eq!(snapshot.len(), 1);
/// assert_eq!(catalog.fetch_count().await, 1);
/// ```
#[derive(Debug, Default)]
pub struct MockCatalogSource {
    entries: Arc<RwLock<Vec<CatalogEntry>>>,
    next_error: Arc<RwLock<Option<CatalogError>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    fetches: Arc<RwLock<usize>>,
}

impl MockCatalogSource {
    /// Create a mock with an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the entries returned by subsequent fetches.
    pub async fn set_entries(&self, entries: Vec<CatalogEntry>) {
        *self.entries.write().await = entries;
    }

    /// Make the next fetch fail.
    pub async fn set_next_error(&self, error: CatalogError) {
        *self.next_error.write().await = Some(error);
    }

    /// Delay every fetch by `delay`.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Number of fetches started so far.
    pub async fn fetch_count(&self) -> usize {
        *self.fetches.read().await
    }
}

#[async_trait]
impl CatalogSource for MockCatalogSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_snapshot(&self) -> Result<CatalogSnapshot, CatalogError> {
        *self.fetches.write().await += 1;

        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }

        Ok(CatalogSnapshot::new(self.entries.read().await.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    #[tokio::test]
    async fn test_fetch_and_error_injection() {
        let catalog = MockCatalogSource::new();
        catalog
            .set_entries(vec![fixtures::catalog_entry("1", "Model X", "")])
            .await;
        catalog
            .set_next_error(CatalogError::Request("boom".to_string()))
            .await;

        assert!(catalog.fetch_snapshot().await.is_err());
        assert_eq!(catalog.fetch_snapshot().await.unwrap().len(), 1);
        assert_eq!(catalog.fetch_count().await, 2);
    }
}
