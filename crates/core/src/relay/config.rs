//! Code relay configuration.

use serde::{Deserialize, Serialize};

/// Configuration for one-time-code issuance and relay polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Identifier the code is sent to (e.g. a phone number).
    #[serde(default)]
    pub recipient_id: String,

    /// Delay between relay polls (milliseconds).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Minimum time between two successful issuance requests (seconds).
    #[serde(default = "default_cooldown")]
    pub issuance_cooldown_secs: u64,

    /// Built-in HTTP relay client. Leave unset to supply a custom relay.
    #[serde(default)]
    pub http: Option<HttpRelayConfig>,
}

/// Settings for [`super::HttpCodeRelay`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRelayConfig {
    /// Base URL of the relay service.
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_poll_interval() -> u64 {
    1500
}

fn default_cooldown() -> u64 {
    300 // 5 minutes
}

fn default_timeout() -> u64 {
    10
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            recipient_id: String::new(),
            poll_interval_ms: default_poll_interval(),
            issuance_cooldown_secs: default_cooldown(),
            http: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RelayConfig::default();
        assert!(config.recipient_id.is_empty());
        assert_eq!(config.poll_interval_ms, 1500);
        assert_eq!(config.issuance_cooldown_secs, 300);
        assert!(config.http.is_none());
    }

    #[test]
    fn test_deserialize_with_http() {
        let toml = r#"
            recipient_id = "09120000000"

            [http]
            base_url = "http://relay.local:8080"
        "#;
        let config: RelayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.recipient_id, "09120000000");
        let http = config.http.unwrap();
        assert_eq!(http.base_url, "http://relay.local:8080");
        assert_eq!(http.timeout_secs, 10);
    }
}
