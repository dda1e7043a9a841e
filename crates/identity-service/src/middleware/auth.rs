//! Bearer token authentication for protected routes.
//!
//! Each request moves from unauthenticated to either authenticated (the
//! verified principal is attached to the request extensions) or rejected.
//! A missing or non-bearer `Authorization` header is `AuthenticationRequired`;
//! a bearer token that fails verification is `InvalidToken` with the
//! verifier's reason.

use crate::errors::ApiError;
use crate::handlers::auth_handler::AppState;
use crate::models::SubjectKind;
use crate::services::AuthenticatedPrincipal;
use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::instrument;

/// Pull the token out of `Authorization: Bearer <token>`.
///
/// Returns `None` when the header is absent, not UTF-8, uses another scheme,
/// or carries an empty token.
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<AuthenticatedPrincipal, ApiError> {
    let token = extract_bearer_token(headers).ok_or_else(|| {
        tracing::debug!(target: "identity.middleware", "Request without bearer token");
        ApiError::AuthenticationRequired
    })?;

    Ok(state.verifier.verify(token).await?)
}

/// Accept only admin principals.
#[instrument(skip_all)]
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    require_kind(&state, SubjectKind::Admin, req, next).await
}

/// Accept only system principals.
#[instrument(skip_all)]
pub async fn require_system(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    require_kind(&state, SubjectKind::System, req, next).await
}

async fn require_kind(
    state: &AppState,
    kind: SubjectKind,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let authenticated = authenticate(state, req.headers()).await?;

    if authenticated.principal.kind() != kind {
        tracing::debug!(
            target: "identity.middleware",
            required = %kind,
            actual = %authenticated.principal.kind(),
            "Principal kind not allowed on this route"
        );
        return Err(ApiError::Forbidden);
    }

    req.extensions_mut().insert(authenticated);
    Ok(next.run(req).await)
}
