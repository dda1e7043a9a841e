use crate::errors::ApiError;
use crate::models::{Principal, System};
use crate::services::AuthenticatedPrincipal;
use axum::{extract::State, http::StatusCode, Extension, Json};
use std::sync::Arc;
use tracing::instrument;

use super::auth_handler::AppState;

/// Return the authenticated system
///
/// GET /auth/system
#[instrument(skip_all)]
pub async fn handle_get_system(
    Extension(authenticated): Extension<AuthenticatedPrincipal>,
) -> Result<Json<System>, ApiError> {
    match authenticated.principal {
        Principal::System(system) => Ok(Json(system)),
        Principal::Admin(_) => Err(ApiError::Forbidden),
    }
}

/// Revoke the presented system token
///
/// DELETE /auth/system
#[instrument(skip_all)]
pub async fn handle_system_logout(
    State(state): State<Arc<AppState>>,
    Extension(authenticated): Extension<AuthenticatedPrincipal>,
) -> Result<StatusCode, ApiError> {
    state.issuer.revoke(&authenticated).await?;
    Ok(StatusCode::NO_CONTENT)
}
