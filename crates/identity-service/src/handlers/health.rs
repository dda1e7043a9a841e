use axum::extract::State;
use metrics_exporter_prometheus::PrometheusHandle;

/// Liveness probe
///
/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}

/// Prometheus scrape endpoint
///
/// GET /metrics
pub async fn metrics_handler(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}
