use crate::config::Config;
use crate::crypto::{self, KeyManager};
use crate::errors::ApiError;
use crate::models::{Principal, TokenResponse};
use crate::observability::hash_for_correlation;
use crate::repositories::PrincipalDirectory;
use crate::services::{Every8dClient, IdentityProvider, TokenIssuer, TokenVerifier};
use axum::{extract::State, Json};
use chrono::{Duration, Utc};
use common::secret::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub keys: Arc<KeyManager>,
    pub issuer: TokenIssuer,
    pub verifier: TokenVerifier,
    pub directory: Arc<dyn PrincipalDirectory>,
    /// Configured identity providers, keyed by provider id.
    pub providers: HashMap<&'static str, Arc<dyn IdentityProvider>>,
    /// SMS gateway client, when configured.
    pub sms: Option<Arc<Every8dClient>>,
}

impl AppState {
    fn token_expiry(&self) -> chrono::DateTime<Utc> {
        Utc::now() + Duration::seconds(self.config.access_token_ttl_seconds)
    }

    async fn issue_response(&self, principal: &Principal) -> Result<TokenResponse, ApiError> {
        let issued = self.issuer.issue(principal, self.token_expiry()).await?;
        let expires_at = issued.expires_at();
        Ok(TokenResponse::bearer(issued.token, expires_at))
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminLoginRequest {
    pub provider: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct SystemLoginRequest {
    pub system_id: String,
    pub secret_key: SecretString,
}

/// Handle admin login through an external identity provider
///
/// POST /auth/admin
#[instrument(skip_all, fields(provider))]
pub async fn handle_admin_login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AdminLoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    tracing::Span::current().record("provider", payload.provider.as_str());

    let provider = state
        .providers
        .get(payload.provider.as_str())
        .ok_or_else(|| ApiError::UnsupportedProvider(payload.provider.clone()))?;

    let identity = provider.exchange_for_identity(&payload.code).await?;

    let admin = state
        .directory
        .find_admin_by_provider(identity.provider, &identity.provider_subject_id)
        .await?
        .filter(|admin| admin.is_active())
        .ok_or_else(|| {
            tracing::debug!(
                target: "identity.auth",
                provider = identity.provider,
                subject = %hash_for_correlation(&identity.provider_subject_id),
                "No active admin linked to external identity"
            );
            ApiError::InvalidCredentials
        })?;

    let response = state.issue_response(&Principal::Admin(admin)).await?;
    Ok(Json(response))
}

/// Handle system login with a system id and secret key
///
/// POST /auth/system
#[instrument(skip_all)]
pub async fn handle_system_login(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SystemLoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let credentials = state
        .directory
        .find_system_credentials(&payload.system_id)
        .await?;

    // Always run bcrypt, even for unknown ids
    let stored_hash = credentials.as_ref().map(|c| c.secret_hash.as_str());
    let secret_valid = crypto::verify_secret(payload.secret_key.expose_secret(), stored_hash);

    let system = match credentials {
        Some(credentials) if secret_valid => credentials.system,
        _ => {
            tracing::debug!(
                target: "identity.auth",
                system = %hash_for_correlation(&payload.system_id),
                "System login rejected"
            );
            return Err(ApiError::InvalidCredentials);
        }
    };

    let response = state.issue_response(&Principal::System(system)).await?;
    Ok(Json(response))
}
