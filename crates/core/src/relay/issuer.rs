//! Rate-limited code issuance.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::types::IssuanceOutcome;
use super::RelayError;
use crate::gateway::TransactionGateway;
use crate::metrics;
use crate::settings::SettingsStore;

/// Sends issuance requests upstream at most once per cooldown window.
///
/// The window is tracked by one persisted timestamp shared by every
/// recipient. Concurrent callers are serialised, so two requests racing
/// inside the window produce one upstream call and one `Cooldown`.
pub struct CodeIssuer {
    gateway: Arc<dyn TransactionGateway>,
    settings: Arc<dyn SettingsStore>,
    cooldown: Duration,
    lock: Mutex<()>,
}

impl CodeIssuer {
    pub fn new(
        gateway: Arc<dyn TransactionGateway>,
        settings: Arc<dyn SettingsStore>,
        cooldown: Duration,
    ) -> Self {
        Self {
            gateway,
            settings,
            cooldown,
            lock: Mutex::new(()),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Request a code for `recipient_id`, unless the cooldown is active.
    ///
    /// The timestamp is recorded only after upstream confirmed the request.
    pub async fn request_issuance(
        &self,
        recipient_id: &str,
        entry_id: &str,
    ) -> Result<IssuanceOutcome, RelayError> {
        let _guard = self.lock.lock().await;

        if let Some(remaining) = self.remaining_cooldown_at(Utc::now())? {
            metrics::CODE_ISSUANCE.with_label_values(&["cooldown"]).inc();
            info!(
                remaining_secs = remaining.as_secs(),
                "Code issuance skipped, cooldown active"
            );
            return Ok(IssuanceOutcome::Cooldown { remaining });
        }

        if let Err(e) = self
            .gateway
            .request_code_issuance(recipient_id, entry_id)
            .await
        {
            metrics::CODE_ISSUANCE.with_label_values(&["error"]).inc();
            warn!(error = %e, "Code issuance request failed");
            return Err(e.into());
        }

        self.settings.record_code_issuance(Utc::now())?;
        metrics::CODE_ISSUANCE.with_label_values(&["accepted"]).inc();
        info!(gateway = %self.gateway.name(), "Code issuance accepted");
        Ok(IssuanceOutcome::Accepted)
    }

    /// Time left before another issuance is allowed.
    pub fn remaining_cooldown(&self) -> Result<Option<Duration>, RelayError> {
        self.remaining_cooldown_at(Utc::now())
    }

    /// Time left at `now` before another issuance is allowed.
    pub fn remaining_cooldown_at(&self, now: DateTime<Utc>) -> Result<Option<Duration>, RelayError> {
        let Some(last) = self.settings.last_code_issuance()? else {
            return Ok(None);
        };

        // A timestamp in the future counts as "just now".
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        if elapsed >= self.cooldown {
            Ok(None)
        } else {
            Ok(Some(self.cooldown - elapsed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::GatewayError;
    use crate::settings::MemorySettingsStore;
    use crate::testing::MockTransactionGateway;

    fn issuer(
        gateway: &Arc<MockTransactionGateway>,
        settings: &Arc<MemorySettingsStore>,
        cooldown: Duration,
    ) -> CodeIssuer {
        CodeIssuer::new(gateway.clone(), settings.clone(), cooldown)
    }

    #[tokio::test]
    async fn test_second_request_within_window_is_cooldown() {
        let gateway = Arc::new(MockTransactionGateway::new());
        let settings = Arc::new(MemorySettingsStore::new());
        let issuer = issuer(&gateway, &settings, Duration::from_secs(300));

        let first = issuer.request_issuance("0912", "entry-1").await.unwrap();
        assert_eq!(first, IssuanceOutcome::Accepted);

        let second = issuer.request_issuance("0912", "entry-1").await.unwrap();
        match second {
            IssuanceOutcome::Cooldown { remaining } => {
                assert!(remaining > Duration::ZERO);
                assert!(remaining <= Duration::from_secs(300));
            }
            other => panic!("expected cooldown, got {:?}", other),
        }

        assert_eq!(gateway.issuance_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_cooldown_is_shared_across_recipients() {
        let gateway = Arc::new(MockTransactionGateway::new());
        let settings = Arc::new(MemorySettingsStore::new());
        let issuer = issuer(&gateway, &settings, Duration::from_secs(300));

        issuer.request_issuance("0912", "entry-1").await.unwrap();
        let other = issuer.request_issuance("0935", "entry-1").await.unwrap();
        assert!(matches!(other, IssuanceOutcome::Cooldown { .. }));
        assert_eq!(gateway.issuance_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_requests_issue_once() {
        let gateway = Arc::new(MockTransactionGateway::new());
        gateway.set_issuance_delay(Duration::from_millis(30)).await;
        let settings = Arc::new(MemorySettingsStore::new());
        let issuer = Arc::new(issuer(&gateway, &settings, Duration::from_secs(300)));

        let a = {
            let issuer = issuer.clone();
            tokio::spawn(async move { issuer.request_issuance("0912", "e").await.unwrap() })
        };
        let b = {
            let issuer = issuer.clone();
            tokio::spawn(async move { issuer.request_issuance("0912", "e").await.unwrap() })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let accepted = results
            .iter()
            .filter(|r| **r == IssuanceOutcome::Accepted)
            .count();
        assert_eq!(accepted, 1);
        assert_eq!(gateway.issuance_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_failed_request_does_not_start_cooldown() {
        let gateway = Arc::new(MockTransactionGateway::new());
        gateway
            .set_next_issuance_error(GatewayError::Rejected("too many requests".to_string()))
            .await;
        let settings = Arc::new(MemorySettingsStore::new());
        let issuer = issuer(&gateway, &settings, Duration::from_secs(300));

        assert!(issuer.request_issuance("0912", "e").await.is_err());
        assert!(settings.last_code_issuance().unwrap().is_none());
        assert!(issuer.remaining_cooldown().unwrap().is_none());

        let retry = issuer.request_issuance("0912", "e").await.unwrap();
        assert_eq!(retry, IssuanceOutcome::Accepted);
    }

    #[test]
    fn test_remaining_cooldown_from_persisted_timestamp() {
        let gateway = Arc::new(MockTransactionGateway::new());
        let now = Utc::now();
        let settings = Arc::new(MemorySettingsStore::with_last_issuance(
            now - chrono::Duration::seconds(100),
        ));
        let issuer = issuer(&gateway, &settings, Duration::from_secs(300));

        let remaining = issuer.remaining_cooldown_at(now).unwrap().unwrap();
        assert_eq!(remaining, Duration::from_secs(200));

        let later = now + chrono::Duration::seconds(250);
        assert!(issuer.remaining_cooldown_at(later).unwrap().is_none());
    }
}
