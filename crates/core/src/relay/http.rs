//! HTTP client for an operator-run code relay.
//!
//! The relay exposes `GET {base_url}/get-sms/{recipient}` and answers with
//! `{"success": bool, "smsCode": string?, "message": string?}`. A 404 means
//! nothing has arrived yet.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::config::HttpRelayConfig;
use super::types::CodePoll;
use super::{CodeRelay, RelayError};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    sms_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// [`CodeRelay`] backed by the relay HTTP API.
pub struct HttpCodeRelay {
    client: Client,
    base_url: String,
}

impl HttpCodeRelay {
    /// Create a client for the given relay.
    pub fn new(config: &HttpRelayConfig) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RelayError::Request(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn code_url(&self, recipient_id: &str) -> String {
        format!(
            "{}/get-sms/{}",
            self.base_url,
            urlencoding::encode(recipient_id)
        )
    }
}

/// Interpret a relay response body.
fn parse_relay_body(body: &str) -> Result<CodePoll, RelayError> {
    let response: RelayResponse = serde_json::from_str(body)
        .map_err(|e| RelayError::InvalidResponse(format!("failed to parse response: {}", e)))?;

    match response.sms_code {
        Some(code) if response.success && !code.trim().is_empty() => Ok(CodePoll::Code(code)),
        _ => {
            if let Some(message) = response.message {
                debug!(message = %message, "Relay has no code yet");
            }
            Ok(CodePoll::NotYetAvailable)
        }
    }
}

#[async_trait]
impl CodeRelay for HttpCodeRelay {
    fn name(&self) -> &str {
        "http"
    }

    async fn poll_issued_code(&self, recipient_id: &str) -> Result<CodePoll, RelayError> {
        let url = self.code_url(recipient_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RelayError::Request(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(CodePoll::NotYetAvailable);
        }

        let body = response
            .text()
            .await
            .map_err(|e| RelayError::Request(e.to_string()))?;

        if !status.is_success() {
            return Err(RelayError::Request(format!(
                "HTTP {}: {}",
                status,
                body.chars().take(200).collect::<String>()
            )));
        }

        parse_relay_body(&body)
    }
}
