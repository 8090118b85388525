use crate::backoff::DelayRange;

use super::{types::Config, ConfigError};

/// Tolerance for the blend weights summing to 1.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

fn invalid(message: String) -> ConfigError {
    ConfigError::ValidationError(message)
}

fn check_range(name: &str, range: &DelayRange) -> Result<(), ConfigError> {
    if !range.is_valid() {
        return Err(invalid(format!(
            "{} has min_ms {} greater than max_ms {}",
            name, range.min_ms, range.max_ms
        )));
    }
    Ok(())
}

fn check_positive(name: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(invalid(format!("{} must be greater than 0", name)));
    }
    Ok(())
}

/// Validate configuration
/// Currently validates:
/// - Every delay range has min <= max
/// - Poll intervals, timeouts and the cooldown are positive
/// - Blend weights are non-negative and sum to 1
/// - min_score is within [0, 1]
/// - A relay recipient is configured
/// - At least one solve attempt is allowed
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Resolver
    check_positive("resolver.poll_interval_ms", config.resolver.poll_interval_ms)?;
    if !(0.0..=1.0).contains(&config.resolver.min_score) {
        return Err(invalid(format!(
            "resolver.min_score must be within [0, 1], got {}",
            config.resolver.min_score
        )));
    }

    // Matching
    let weights = &config.matching.weights;
    for (name, value) in [
        ("edit", weights.edit),
        ("transposition", weights.transposition),
        ("token", weights.token),
        ("ngram", weights.ngram),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(invalid(format!(
                "matching.weights.{} must be non-negative, got {}",
                name, value
            )));
        }
    }
    if (weights.total() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(invalid(format!(
            "matching.weights must sum to 1.0, got {}",
            weights.total()
        )));
    }
    if config.matching.ngram_size == 0 {
        return Err(invalid("matching.ngram_size must be greater than 0".to_string()));
    }

    // Challenge
    if config.challenge.max_attempts == 0 {
        return Err(invalid("challenge.max_attempts must be at least 1".to_string()));
    }
    check_positive(
        "challenge.capability_timeout_ms",
        config.challenge.capability_timeout_ms,
    )?;
    check_range("challenge.retry_delay", &config.challenge.retry_delay)?;

    // Relay
    if config.relay.recipient_id.trim().is_empty() {
        return Err(invalid("relay.recipient_id cannot be empty".to_string()));
    }
    check_positive("relay.poll_interval_ms", config.relay.poll_interval_ms)?;
    check_positive("relay.issuance_cooldown_secs", config.relay.issuance_cooldown_secs)?;
    if let Some(http) = &config.relay.http {
        if http.base_url.trim().is_empty() {
            return Err(invalid("relay.http.base_url cannot be empty".to_string()));
        }
        check_positive("relay.http.timeout_secs", http.timeout_secs)?;
    }

    // Orchestrator
    let orchestrator = &config.orchestrator;
    check_range("orchestrator.request_delay", &orchestrator.request_delay)?;
    check_range("orchestrator.retry_backoff", &orchestrator.retry_backoff)?;
    check_range(
        "orchestrator.submit_failed_backoff",
        &orchestrator.submit_failed_backoff,
    )?;
    check_range(
        "orchestrator.fault_restart_backoff",
        &orchestrator.fault_restart_backoff,
    )?;
    if !orchestrator.backoff_multiplier.is_finite() || orchestrator.backoff_multiplier < 1.0 {
        return Err(invalid(format!(
            "orchestrator.backoff_multiplier must be at least 1.0, got {}",
            orchestrator.backoff_multiplier
        )));
    }
    if orchestrator.event_capacity == 0 {
        return Err(invalid(
            "orchestrator.event_capacity must be greater than 0".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.relay.recipient_id = "09120000000".to_string();
        config
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_missing_recipient_fails() {
        let config = Config::default();
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("recipient_id"));
    }

    #[test]
    fn test_validate_inverted_range_fails() {
        let mut config = valid_config();
        config.orchestrator.submit_failed_backoff = DelayRange::new(3000, 1000);
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("submit_failed_backoff"));
    }

    #[test]
    fn test_validate_weights_must_sum_to_one() {
        let mut config = valid_config();
        config.matching.weights.ngram = 0.5;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("sum to 1.0"));
    }

    #[test]
    fn test_validate_negative_weight_fails() {
        let mut config = valid_config();
        config.matching.weights.edit = -0.15;
        config.matching.weights.transposition = 0.85;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("matching.weights.edit"));
    }

    #[test]
    fn test_validate_zero_attempts_fails() {
        let mut config = valid_config();
        config.challenge.max_attempts = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_min_score_bounds() {
        let mut config = valid_config();
        config.resolver.min_score = 1.5;
        assert!(validate_config(&config).is_err());

        config.resolver.min_score = 1.0;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_zero_interval_fails() {
        let mut config = valid_config();
        config.relay.poll_interval_ms = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("relay.poll_interval_ms"));
    }
}
