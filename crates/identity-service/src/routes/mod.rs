//! HTTP routes for the identity service.

use crate::handlers::{admin_handler, auth_handler, health, jwks_handler, system_handler};
use crate::handlers::auth_handler::AppState;
use crate::middleware::auth::{require_admin, require_system};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Build the application routes.
///
/// - `/.well-known/jwks.json` - public key discovery
/// - `POST /auth/admin` - admin login via an identity provider
/// - `GET`/`DELETE /auth/admin` - admin profile / logout (admin token)
/// - `POST /auth/system` - system login with secret key
/// - `GET`/`DELETE /auth/system` - system profile / logout (system token)
/// - `/health`, `/metrics` - operational endpoints
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let admin_session = get(admin_handler::handle_get_admin)
        .delete(admin_handler::handle_admin_logout)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let system_session = get(system_handler::handle_get_system)
        .delete(system_handler::handle_system_logout)
        .route_layer(middleware::from_fn_with_state(state.clone(), require_system));

    let app_routes = Router::new()
        .route("/.well-known/jwks.json", get(jwks_handler::handle_get_jwks))
        .route(
            "/auth/admin",
            post(auth_handler::handle_admin_login).merge(admin_session),
        )
        .route(
            "/auth/system",
            post(auth_handler::handle_system_login).merge(system_session),
        )
        .route("/health", get(health::health_check))
        .with_state(state);

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(health::metrics_handler))
        .with_state(metrics_handle);

    app_routes
        .merge(metrics_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
}
