use crate::errors::ApiError;
use crate::models::{Admin, Principal};
use crate::services::AuthenticatedPrincipal;
use axum::{extract::State, http::StatusCode, Extension, Json};
use std::sync::Arc;
use tracing::instrument;

use super::auth_handler::AppState;

/// Return the authenticated admin
///
/// GET /auth/admin
#[instrument(skip_all)]
pub async fn handle_get_admin(
    Extension(authenticated): Extension<AuthenticatedPrincipal>,
) -> Result<Json<Admin>, ApiError> {
    match authenticated.principal {
        Principal::Admin(admin) => Ok(Json(admin)),
        Principal::System(_) => Err(ApiError::Forbidden),
    }
}

/// Log the admin out by revoking the presented token
///
/// DELETE /auth/admin
#[instrument(skip_all)]
pub async fn handle_admin_logout(
    State(state): State<Arc<AppState>>,
    Extension(authenticated): Extension<AuthenticatedPrincipal>,
) -> Result<StatusCode, ApiError> {
    state.issuer.revoke(&authenticated).await?;
    Ok(StatusCode::NO_CONTENT)
}
