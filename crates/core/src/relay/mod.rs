//! One-time-code acquisition.
//!
//! Two independent halves:
//! - [`CodeIssuer`] asks upstream to send a code, rate-limited by a single
//!   persisted cooldown timestamp.
//! - [`CodeRelayPoller`] polls a relay (a [`CodeRelay`]) until the delivered
//!   code shows up.

mod config;
mod http;
mod issuer;
mod poller;
mod types;

pub use config::{HttpRelayConfig, RelayConfig};
pub use http::HttpCodeRelay;
pub use issuer::CodeIssuer;
pub use poller::CodeRelayPoller;
pub use types::{CodePoll, IssuanceOutcome, OneTimeCode};

use async_trait::async_trait;
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::settings::SettingsError;

/// Errors from code issuance or relay polling.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Relay could not be reached.
    #[error("relay request failed: {0}")]
    Request(String),

    /// Relay answered with something unexpected.
    #[error("invalid relay response: {0}")]
    InvalidResponse(String),

    /// Upstream refused or failed the issuance request.
    #[error("code issuance failed: {0}")]
    Issuance(#[from] GatewayError),

    /// Cooldown timestamp could not be read or written.
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
}

/// A relay that exposes the latest code delivered to a recipient.
#[async_trait]
pub trait CodeRelay: Send + Sync {
    /// Name of this relay for logging.
    fn name(&self) -> &str;

    /// Latest code for `recipient_id`, if one has arrived.
    async fn poll_issued_code(&self, recipient_id: &str) -> Result<CodePoll, RelayError>;
}
