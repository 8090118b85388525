//! Fan-out of status events.

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use super::{Severity, StatusEnvelope, StatusEvent};
use crate::orchestrator::TransactionError;

/// Broadcaster for status events using a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<StatusEnvelope>,
}

impl EventBroadcaster {
    /// Create a new broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Broadcast an event to all subscribers.
    pub fn emit(&self, event: StatusEvent) {
        // Ignore send errors - they just mean no one is listening
        let _ = self.sender.send(StatusEnvelope {
            timestamp: Utc::now(),
            event,
        });
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEnvelope> {
        self.sender.subscribe()
    }

    /// Log and broadcast an operator message.
    pub fn message(&self, severity: Severity, text: impl Into<String>) {
        let text = text.into();
        match severity {
            Severity::Info | Severity::Success => info!("{}", text),
            Severity::Warn => warn!("{}", text),
            Severity::Error => error!("{}", text),
        }
        self.emit(StatusEvent::Message {
            severity,
            text,
            error: None,
        });
    }

    /// Log and broadcast an operator-facing error.
    pub fn report(&self, err: TransactionError) {
        let severity = err.severity();
        let text = err.to_string();
        match severity {
            Severity::Info | Severity::Success => info!(retryable = err.is_retryable(), "{}", text),
            Severity::Warn => warn!(retryable = err.is_retryable(), "{}", text),
            Severity::Error => error!(retryable = err.is_retryable(), "{}", text),
        }
        self.emit(StatusEvent::Message {
            severity,
            text,
            error: Some(err),
        });
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_without_subscribers_is_ok() {
        let events = EventBroadcaster::new(4);
        events.message(Severity::Info, "nobody listening");
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let events = EventBroadcaster::new(4);
        let mut rx = events.subscribe();

        events.report(TransactionError::CodeCooldownActive { remaining_secs: 10 });

        let envelope = rx.recv().await.unwrap();
        match envelope.event {
            StatusEvent::Message {
                severity, error, ..
            } => {
                assert_eq!(severity, Severity::Info);
                assert_eq!(
                    error,
                    Some(TransactionError::CodeCooldownActive { remaining_secs: 10 })
                );
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
