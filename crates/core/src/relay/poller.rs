//! Fixed-interval polling of the code relay.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::types::{CodePoll, OneTimeCode};
use super::{CodeRelay, RelayError};
use crate::cancel::CancelToken;
use crate::metrics;

/// Polls a [`CodeRelay`] for one recipient.
pub struct CodeRelayPoller {
    relay: Arc<dyn CodeRelay>,
    recipient_id: String,
    interval: Duration,
}

impl CodeRelayPoller {
    pub fn new(relay: Arc<dyn CodeRelay>, recipient_id: impl Into<String>, interval: Duration) -> Self {
        Self {
            relay,
            recipient_id: recipient_id.into(),
            interval,
        }
    }

    pub fn recipient_id(&self) -> &str {
        &self.recipient_id
    }

    /// Ask the relay once.
    pub async fn poll_once(&self) -> Result<Option<OneTimeCode>, RelayError> {
        let poll = self.relay.poll_issued_code(&self.recipient_id).await;
        let label = match &poll {
            Ok(CodePoll::Code(_)) => "code",
            Ok(CodePoll::NotYetAvailable) => "not_yet",
            Err(_) => "error",
        };
        metrics::RELAY_POLLS.with_label_values(&[label]).inc();

        match poll? {
            CodePoll::Code(code) => {
                let code = code.trim().to_string();
                if code.is_empty() {
                    return Ok(None);
                }
                Ok(Some(OneTimeCode {
                    recipient: self.recipient_id.clone(),
                    code,
                    received_at: Utc::now(),
                }))
            }
            CodePoll::NotYetAvailable => Ok(None),
        }
    }

    /// Spawn the poll loop.
    ///
    /// Polls immediately, then every interval. Each new code is passed through
    /// `wrap` and sent on `tx`; a code identical to the previous one is not
    /// sent again. Relay errors are logged and polling continues. The loop
    /// ends when `token` is cancelled or the receiver is gone, and drops any
    /// result that arrives after cancellation.
    pub fn spawn<M, F>(
        self: Arc<Self>,
        mut token: CancelToken,
        tx: mpsc::Sender<M>,
        wrap: F,
    ) -> JoinHandle<()>
    where
        M: Send + 'static,
        F: Fn(OneTimeCode) -> M + Send + 'static,
    {
        tokio::spawn(async move {
            info!(relay = %self.relay.name(), "Code relay polling started");
            let mut last_code: Option<String> = None;

            loop {
                if token.is_cancelled() {
                    break;
                }

                let result = tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    result = self.poll_once() => result,
                };

                if token.is_cancelled() {
                    debug!("Discarding relay poll result after cancellation");
                    break;
                }

                match result {
                    Ok(Some(code)) if last_code.as_deref() != Some(code.code.as_str()) => {
                        last_code = Some(code.code.clone());
                        if tx.send(wrap(code)).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Code relay poll failed"),
                }

                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(self.interval) => {}
                }
            }

            info!("Code relay polling stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use crate::testing::MockCodeRelay;

    #[tokio::test]
    async fn test_poll_once() {
        let relay = Arc::new(MockCodeRelay::new());
        let poller = CodeRelayPoller::new(relay.clone(), "0912", Duration::from_millis(10));

        assert!(poller.poll_once().await.unwrap().is_none());

        relay.push_code("12345").await;
        let code = poller.poll_once().await.unwrap().unwrap();
        assert_eq!(code.code, "12345");
        assert_eq!(code.recipient, "0912");
        assert_eq!(relay.polled_recipients().await, vec!["0912", "0912"]);
    }

    #[tokio::test]
    async fn test_loop_dedupes_and_survives_errors() {
        let relay = Arc::new(MockCodeRelay::new());
        relay.push_error(RelayError::Request("connection refused".to_string())).await;
        relay.push_code("1111").await;
        relay.push_code("1111").await;
        relay.push_code("2222").await;

        let poller = Arc::new(CodeRelayPoller::new(relay.clone(), "0912", Duration::from_millis(5)));
        let (handle, token) = cancel_pair();
        let (tx, mut rx) = mpsc::channel(8);
        let task = poller.spawn(token, tx, |code| code.code);

        assert_eq!(rx.recv().await.unwrap(), "1111");
        assert_eq!(rx.recv().await.unwrap(), "2222");

        handle.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_cancel_mid_poll_drops_result() {
        let relay = Arc::new(MockCodeRelay::new());
        relay.push_code("9999").await;
        relay.set_delay(Duration::from_millis(100)).await;

        let poller = Arc::new(CodeRelayPoller::new(relay.clone(), "0912", Duration::from_millis(5)));
        let (handle, token) = cancel_pair();
        let (tx, mut rx) = mpsc::channel::<OneTimeCode>(8);
        let task = poller.spawn(token, tx, |code| code);

        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.cancel();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(rx.recv().await.is_none());
    }
}
