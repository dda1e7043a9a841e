//! Metrics definitions for the identity service.
//!
//! All metrics follow Prometheus naming conventions:
//! - `identity_` prefix
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Cardinality
//!
//! Labels are bounded to prevent cardinality explosion:
//! - `kind`: 2 values (admin, system)
//! - `status`: bounded per metric (success, error, rejected, ...)
//! - `reason`: bounded by `VerifyError::reason`
//! - `provider`: 2 values (xinchuan-auth, mobile-be)

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Install the global Prometheus recorder.
///
/// Fails if a recorder is already installed in this process.
pub fn init_metrics_recorder() -> Result<PrometheusHandle, String> {
    PrometheusBuilder::new()
        // Issuance is one RSA signature plus one insert
        .set_buckets_for_metric(
            Matcher::Prefix("identity_token_issuance".to_string()),
            &[
                0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
            ],
        )
        .map_err(|e| format!("Failed to set token issuance buckets: {e}"))?
        // Outbound calls to providers and the SMS gateway
        .set_buckets_for_metric(
            Matcher::Suffix("upstream_duration_seconds".to_string()),
            &[
                0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.000,
            ],
        )
        .map_err(|e| format!("Failed to set upstream duration buckets: {e}"))?
        .install_recorder()
        .map_err(|e| format!("Failed to install Prometheus recorder: {e}"))
}

// ============================================================================
// Token Metrics
// ============================================================================

/// Record token issuance duration and outcome
///
/// Metric: `identity_token_issuance_duration_seconds`, `identity_token_issuance_total`
/// Labels: `kind`, `status`
pub fn record_token_issuance(kind: &str, status: &str, duration: Duration) {
    histogram!("identity_token_issuance_duration_seconds", "kind" => kind.to_string(), "status" => status.to_string())
        .record(duration.as_secs_f64());

    counter!("identity_token_issuance_total", "kind" => kind.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record token verification result
///
/// Metric: `identity_token_verifications_total`
/// Labels: `status`, `reason`
pub fn record_token_verification(status: &str, reason: Option<&str>) {
    let reason = reason.unwrap_or("none");
    counter!("identity_token_verifications_total", "status" => status.to_string(), "reason" => reason.to_string())
        .increment(1);
}

/// Record token revocation (logout)
///
/// Metric: `identity_token_revocations_total`
/// Labels: `kind`, `status` (revoked, not_found)
pub fn record_token_revocation(kind: &str, status: &str) {
    counter!("identity_token_revocations_total", "kind" => kind.to_string(), "status" => status.to_string())
        .increment(1);
}

// ============================================================================
// Upstream Metrics
// ============================================================================

/// Record an identity provider exchange
///
/// Metric: `identity_provider_exchanges_total`, `identity_provider_upstream_duration_seconds`
/// Labels: `provider`, `status` (success, rejected, unreachable, malformed)
pub fn record_provider_exchange(provider: &str, status: &str, duration: Duration) {
    histogram!("identity_provider_upstream_duration_seconds", "provider" => provider.to_string())
        .record(duration.as_secs_f64());

    counter!("identity_provider_exchanges_total", "provider" => provider.to_string(), "status" => status.to_string())
        .increment(1);
}

/// Record an SMS gateway token fetch
///
/// Metric: `identity_gateway_token_fetches_total`
/// Labels: `status` (success, auth_failure, unreachable, invalid_response)
pub fn record_gateway_token_fetch(status: &str) {
    counter!("identity_gateway_token_fetches_total", "status" => status.to_string()).increment(1);
}

/// Record an SMS send attempt
///
/// Metric: `identity_sms_sends_total`, `identity_sms_upstream_duration_seconds`
/// Labels: `status` (success, send_failure, auth_failure, unreachable, invalid_response)
pub fn record_sms_send(status: &str, duration: Duration) {
    histogram!("identity_sms_upstream_duration_seconds").record(duration.as_secs_f64());

    counter!("identity_sms_sends_total", "status" => status.to_string()).increment(1);
}
