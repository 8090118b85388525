use serde::{Deserialize, Serialize};

use crate::challenge::ChallengeConfig;
use crate::logging::LoggingConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::relay::RelayConfig;
use crate::resolver::ResolverConfig;
use crate::settings::SettingsConfig;
use crate::textmatch::MatchingConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub challenge: ChallengeConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::DelayRange;
    use crate::logging::LogFormat;
    use crate::settings::SettingsBackend;

    #[test]
    fn test_deserialize_empty_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.resolver.poll_interval_ms, 2500);
        assert_eq!(config.matching.ngram_size, 2);
        assert!(config.challenge.auto_solve);
        assert_eq!(config.relay.issuance_cooldown_secs, 300);
        assert_eq!(config.orchestrator.retry_backoff, DelayRange::new(500, 2000));
        assert_eq!(config.settings.backend, SettingsBackend::Sqlite);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[resolver]
poll_interval_ms = 1000
min_score = 0.5

[matching.weights]
edit = 0.25
transposition = 0.25
token = 0.25
ngram = 0.25

[challenge]
auto_solve = false
capability_order = ["remote", "local"]

[relay]
recipient_id = "09120000000"

[relay.http]
base_url = "http://relay.local:8080"

[orchestrator.submit_failed_backoff]
min_ms = 2000
max_ms = 4000

[settings]
backend = "memory"

[logging]
level = "debug"
format = "json"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.resolver.min_score, 0.5);
        assert_eq!(config.matching.weights.ngram, 0.25);
        assert!(!config.challenge.auto_solve);
        assert_eq!(config.challenge.capability_order, vec!["remote", "local"]);
        assert_eq!(config.relay.recipient_id, "09120000000");
        assert!(config.relay.http.is_some());
        assert_eq!(
            config.orchestrator.submit_failed_backoff,
            DelayRange::new(2000, 4000)
        );
        assert_eq!(config.settings.backend, SettingsBackend::Memory);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let toml = r#"
[settings]
backend = "redis"
"#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }
}
