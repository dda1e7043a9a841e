//! External identity provider clients.
//!
//! Both providers exchange a one-shot credential artifact for an
//! [`ExternalIdentity`]. Nothing is retried here; a transient failure is
//! reported as `ProviderUnreachable` and the caller decides what to do.

use crate::config::{MobileBackendConfig, XinchuanAuthConfig};
use crate::errors::ProviderError;
use crate::models::{ExternalIdentity, PROVIDER_MOBILE_BACKEND, PROVIDER_XINCHUAN_AUTH};
use crate::observability::hash_for_correlation;
use crate::observability::metrics::record_provider_exchange;
use async_trait::async_trait;
use common::secret::ExposeSecret;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Capability shared by every configured identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider id as stored in `admins.provider`.
    fn provider(&self) -> &'static str;

    /// Exchange a provider-issued artifact for the identity it asserts.
    async fn exchange_for_identity(&self, artifact: &str)
        -> Result<ExternalIdentity, ProviderError>;
}

/// Build the outbound HTTP client shared by providers and the SMS gateway.
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .build()
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}

// ============================================================================
// Primary provider
// ============================================================================

/// OAuth-style authorization code exchange against Xinchuan Auth.
#[derive(Clone)]
pub struct XinchuanAuthClient {
    client: Client,
    config: XinchuanAuthConfig,
}

#[derive(Deserialize)]
struct XinchuanTokenResponse {
    user: Map<String, Value>,
}

impl XinchuanAuthClient {
    pub fn new(client: Client, config: XinchuanAuthConfig) -> Self {
        Self { client, config }
    }

    async fn exchange(&self, code: &str) -> Result<ExternalIdentity, ProviderError> {
        let url = join_url(&self.config.base_url, "/oauth/token");
        let form = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", self.config.callback.as_str()),
        ];

        let response = self
            .client
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| unreachable(PROVIDER_XINCHUAN_AUTH, &e))?;

        let body: XinchuanTokenResponse =
            read_success_body(PROVIDER_XINCHUAN_AUTH, response).await?;

        identity_from_attributes(PROVIDER_XINCHUAN_AUTH, body.user)
    }
}

#[async_trait]
impl IdentityProvider for XinchuanAuthClient {
    fn provider(&self) -> &'static str {
        PROVIDER_XINCHUAN_AUTH
    }

    #[instrument(skip_all, fields(provider = PROVIDER_XINCHUAN_AUTH))]
    async fn exchange_for_identity(
        &self,
        artifact: &str,
    ) -> Result<ExternalIdentity, ProviderError> {
        let start = Instant::now();
        let result = self.exchange(artifact).await;
        observe(PROVIDER_XINCHUAN_AUTH, start, &result);
        result
    }
}

// ============================================================================
// Secondary provider
// ============================================================================

/// Token verification against the mobile backend, authenticated by a shared secret.
#[derive(Clone)]
pub struct MobileBackendClient {
    client: Client,
    config: MobileBackendConfig,
}

impl MobileBackendClient {
    pub fn new(client: Client, config: MobileBackendConfig) -> Self {
        Self { client, config }
    }

    async fn exchange(&self, token: &str) -> Result<ExternalIdentity, ProviderError> {
        let url = join_url(&self.config.base_url, "/auth/verify");

        let response = self
            .client
            .post(&url)
            .header("X-Api-Secret", self.config.secret.expose_secret())
            .json(&serde_json::json!({ "token": token }))
            .send()
            .await
            .map_err(|e| unreachable(PROVIDER_MOBILE_BACKEND, &e))?;

        let attributes: Map<String, Value> =
            read_success_body(PROVIDER_MOBILE_BACKEND, response).await?;

        identity_from_attributes(PROVIDER_MOBILE_BACKEND, attributes)
    }
}

#[async_trait]
impl IdentityProvider for MobileBackendClient {
    fn provider(&self) -> &'static str {
        PROVIDER_MOBILE_BACKEND
    }

    #[instrument(skip_all, fields(provider = PROVIDER_MOBILE_BACKEND))]
    async fn exchange_for_identity(
        &self,
        artifact: &str,
    ) -> Result<ExternalIdentity, ProviderError> {
        let start = Instant::now();
        let result = self.exchange(artifact).await;
        observe(PROVIDER_MOBILE_BACKEND, start, &result);
        result
    }
}

// ============================================================================
// Response handling
// ============================================================================

#[derive(Deserialize)]
struct ProviderErrorBody {
    error: Option<String>,
    error_description: Option<String>,
}

fn unreachable(provider: &'static str, error: &reqwest::Error) -> ProviderError {
    warn!(target: "identity.provider", provider, error = %error, "Identity provider request failed");
    ProviderError::ProviderUnreachable(format!("{} is unavailable", provider))
}

/// Map the status code and decode a 2xx body.
async fn read_success_body<T: serde::de::DeserializeOwned>(
    provider: &'static str,
    response: Response,
) -> Result<T, ProviderError> {
    let status = response.status();

    if status.is_server_error() {
        warn!(target: "identity.provider", provider, status = %status, "Identity provider returned server error");
        return Err(ProviderError::ProviderUnreachable(format!(
            "{} returned {}",
            provider, status
        )));
    }

    if status.is_client_error() {
        let body = response.text().await.unwrap_or_default();
        let reason = serde_json::from_str::<ProviderErrorBody>(&body)
            .ok()
            .and_then(|b| b.error_description.or(b.error))
            .unwrap_or_else(|| status.to_string());
        debug!(target: "identity.provider", provider, status = %status, "Identity provider rejected credential");
        return Err(ProviderError::ProviderRejected(reason));
    }

    if !status.is_success() {
        return Err(ProviderError::MalformedResponse(format!(
            "Unexpected status {}",
            status
        )));
    }

    let body = response.text().await.map_err(|e| unreachable(provider, &e))?;
    serde_json::from_str(&body).map_err(|e| {
        warn!(target: "identity.provider", provider, error = %e, "Failed to parse identity provider response");
        ProviderError::MalformedResponse(format!("Undecodable response from {}", provider))
    })
}

/// Pull the subject id out of the provider's profile attributes.
///
/// Providers report ids either as strings or as integers.
fn identity_from_attributes(
    provider: &'static str,
    attributes: Map<String, Value>,
) -> Result<ExternalIdentity, ProviderError> {
    let provider_subject_id = match attributes.get("id") {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => {
            return Err(ProviderError::MalformedResponse(format!(
                "{} response carries no subject id",
                provider
            )))
        }
    };

    debug!(
        target: "identity.provider",
        provider,
        subject = %hash_for_correlation(&provider_subject_id),
        "Identity exchange succeeded"
    );

    Ok(ExternalIdentity {
        provider,
        provider_subject_id,
        attributes,
    })
}

fn observe(
    provider: &'static str,
    start: Instant,
    result: &Result<ExternalIdentity, ProviderError>,
) {
    let status = match result {
        Ok(_) => "success",
        Err(ProviderError::ProviderRejected(_)) => "rejected",
        Err(ProviderError::ProviderUnreachable(_)) => "unreachable",
        Err(ProviderError::MalformedResponse(_)) => "malformed",
    };
    record_provider_exchange(provider, status, start.elapsed());
}
