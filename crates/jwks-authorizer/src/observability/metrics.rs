//! Metrics definitions for the authorizer.
//!
//! All metrics follow Prometheus naming conventions:
//! - `authorizer_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded:
//! - `effect`: Allow, Deny
//! - `reason`: `none` or one of the `AuthorizerError::kind` labels
//! - `status`: success, error
//!
//! Token contents, key ids and resources never appear in labels.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize the Prometheus metrics recorder and return the handle
/// for serving metrics via HTTP.
///
/// Must be called before any metrics are recorded.
///
/// # Errors
///
/// Returns error if the recorder fails to install (e.g., already installed).
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Decisions are local work except for the occasional refresh
        .set_buckets_for_metric(
            Matcher::Prefix("authorizer_decision".to_string()),
            &[
                0.0005, 0.001, 0.002, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
                2.500,
            ],
        )
        .map_err(|e| format!("Failed to set decision buckets: {e}"))?
        // Refreshes are two sequential HTTP round trips
        .set_buckets_for_metric(
            Matcher::Prefix("authorizer_jwks_refresh".to_string()),
            &[0.010, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000],
        )
        .map_err(|e| format!("Failed to set JWKS refresh buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Decision Metrics
// ============================================================================

/// Record one authorization decision.
///
/// Metric: `authorizer_decisions_total`, `authorizer_decision_duration_seconds`
/// Labels: `effect`, `reason`
pub fn record_decision(effect: &str, reason: &str, duration: Duration) {
    histogram!("authorizer_decision_duration_seconds",
        "effect" => effect.to_string()
    )
    .record(duration.as_secs_f64());

    counter!("authorizer_decisions_total",
        "effect" => effect.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

// ============================================================================
// JWKS Metrics
// ============================================================================

/// Record a key set refresh attempt.
///
/// Metric: `authorizer_jwks_refresh_total`, `authorizer_jwks_refresh_duration_seconds`
/// Labels: `status`
pub fn record_jwks_refresh(status: &str, duration: Duration) {
    histogram!("authorizer_jwks_refresh_duration_seconds").record(duration.as_secs_f64());

    counter!("authorizer_jwks_refresh_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Set the number of keys in the cached key set.
///
/// Metric: `authorizer_jwks_cache_keys`
pub fn set_jwks_cache_keys(count: usize) {
    gauge!("authorizer_jwks_cache_keys").set(count as f64);
}
