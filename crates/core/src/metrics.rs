//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Candidate resolution (poll ticks by outcome, match scores)
//! - Challenge solving (attempts per capability)
//! - One-time codes (issuance requests, relay polls)
//! - Submissions and orchestrator restarts

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// =============================================================================
// Resolution Metrics
// =============================================================================

/// Resolver poll ticks by outcome.
pub static RESOLUTION_TICKS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dropwatch_resolution_ticks_total",
            "Total candidate resolution poll ticks",
        ),
        &["outcome"], // "found", "not_found", "not_yet"
    )
    .unwrap()
});

/// Blended score of resolved candidates.
pub static MATCH_SCORE: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "dropwatch_match_score",
            "Distribution of blended scores of resolved candidates",
        )
        .buckets(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 0.95, 1.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Challenge Metrics
// =============================================================================

/// Challenge solve attempts by capability and result.
pub static CHALLENGE_SOLVES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dropwatch_challenge_solves_total",
            "Total challenge solve attempts per capability",
        ),
        &["capability", "result"], // result: "success", "error", "timeout", "invalid"
    )
    .unwrap()
});

// =============================================================================
// One-time Code Metrics
// =============================================================================

/// Code issuance requests by result.
pub static CODE_ISSUANCE: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "dropwatch_code_issuance_total",
            "Total one-time code issuance requests",
        ),
        &["result"], // "accepted", "cooldown", "error"
    )
    .unwrap()
});

/// Relay polls by result.
pub static RELAY_POLLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dropwatch_relay_polls_total", "Total code relay polls"),
        &["result"], // "code", "not_yet", "error"
    )
    .unwrap()
});

// =============================================================================
// Submission Metrics
// =============================================================================

/// Submissions by result.
pub static SUBMISSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("dropwatch_submissions_total", "Total transaction submissions"),
        &["result"], // "completed", "rejected", "incomplete"
    )
    .unwrap()
});

/// Orchestrator restarts after an internal fault.
pub static FAULT_RESTARTS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "dropwatch_fault_restarts_total",
        "Total orchestrator restarts after an internal fault",
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Resolution
        Box::new(RESOLUTION_TICKS.clone()),
        Box::new(MATCH_SCORE.clone()),
        // Challenge
        Box::new(CHALLENGE_SOLVES.clone()),
        // Codes
        Box::new(CODE_ISSUANCE.clone()),
        Box::new(RELAY_POLLS.clone()),
        // Submission
        Box::new(SUBMISSIONS.clone()),
        Box::new(FAULT_RESTARTS.clone()),
    ]
}

/// Register every core metric in `registry`.
pub fn register_metrics(registry: &Registry) -> Result<(), prometheus::Error> {
    for metric in all_metrics() {
        registry.register(metric)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        let registry = Registry::new();
        register_metrics(&registry).unwrap();

        RESOLUTION_TICKS.with_label_values(&["found"]).inc();
        let families = registry.gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "dropwatch_resolution_ticks_total"));
    }

    #[test]
    fn test_double_registration_is_error() {
        let registry = Registry::new();
        register_metrics(&registry).unwrap();
        assert!(register_metrics(&registry).is_err());
    }
}
