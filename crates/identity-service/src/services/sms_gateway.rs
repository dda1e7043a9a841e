//! Every8d SMS gateway client.
//!
//! The gateway authenticates with an opaque bearer token obtained from a
//! username/password exchange. The token is cached in a
//! [`TokenCache`](common::token_cache::TokenCache), probed before each send,
//! and re-fetched when the gateway reports it stale.
//!
//! # Endpoints
//!
//! - `POST /API21/HTTP/ConnectionHandler.ashx` with `VerifyType: 1`: token exchange
//! - `POST /API21/HTTP/ConnectionHandler.ashx` with `VerifyType: 2`: token probe
//! - `POST /API21/HTTP/SendSMS.ashx` (form `MSG`, `DEST`): send

use crate::config::Every8dConfig;
use crate::errors::GatewayError;
use crate::observability::metrics::{record_gateway_token_fetch, record_sms_send};
use crate::services::identity_provider::join_url;
use async_trait::async_trait;
use common::secret::{ExposeSecret, SecretString};
use common::token_cache::{CachedToken, TokenCache, TokenSource};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, instrument, warn};

const CONNECTION_PATH: &str = "/API21/HTTP/ConnectionHandler.ashx";
const SEND_PATH: &str = "/API21/HTTP/SendSMS.ashx";

/// Status code the gateway uses for a rejected account or token.
const CREDENTIAL_ERROR_CODE: &str = "-2";

/// Human-readable message for a gateway status code.
///
/// Returns `None` for codes outside the gateway's documented table; callers
/// fall back to the message text the gateway sent.
pub fn map_error_code(code: &str) -> Option<&'static str> {
    let message = match code {
        "-300" => "Username and password not provided",
        "-27" => "Destination number required",
        "-5" => "Length of SMS is exceed the maximum length.",
        "-4" => "SMS has been retried for over 24-hour.",
        "-3" => "Invalid mobile number or mobile number is set as black list.",
        "-2" => "API account or password error.",
        "-1" => "Invalid parameter error.",
        "101" | "107" => "Reported from Mobile Carrier: Failed to send SMS due to poor signal or mobile is off-line or mobile error.",
        "102" => "Reported from Mobile Carrier: Failed to send SMS due to mobile network error or error of bas station.",
        "103" => "Reported from Mobile Carrier: Failed due to invalid mobile number.",
        "104" => "Reported from Mobile Carrier: The mobile number is in blacklist.",
        "105" => "Reported from Mobile Carrier: Failed due to mobile/handset error.",
        "106" => "Reported from Mobile Carrier: Unexpected error.",
        "301" => "Out of credit。",
        "500" => "Failed to send international message, please check if internal call is permitted.",
        _ => return None,
    };
    Some(message)
}

/// Gateway acknowledgement of an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Batch id assigned by the gateway.
    pub batch_id: String,
}

// ============================================================================
// Token source
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ConnectionResponse {
    result: bool,
    #[serde(default)]
    status: Value,
    #[serde(default)]
    msg: String,
}

impl ConnectionResponse {
    fn status_code(&self) -> String {
        match &self.status {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Username/password exchange and token probe against the gateway.
pub struct Every8dAuth {
    client: Client,
    base_url: String,
    username: String,
    password: SecretString,
}

impl Every8dAuth {
    pub fn new(client: Client, config: &Every8dConfig) -> Self {
        Self {
            client,
            base_url: config.base_url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        }
    }

    async fn exchange(&self) -> Result<SecretString, GatewayError> {
        let response = self
            .client
            .post(join_url(&self.base_url, CONNECTION_PATH))
            .json(&serde_json::json!({
                "HandlerType": 3,
                "VerifyType": 1,
                "UID": self.username,
                "PWD": self.password.expose_secret(),
            }))
            .send()
            .await
            .map_err(|e| unreachable(&e))?;

        let body = read_connection_response(response).await?;

        if !body.result {
            let code = body.status_code();
            let message = map_error_code(&code)
                .map(str::to_string)
                .unwrap_or(body.msg);
            return Err(GatewayError::AuthFailure(message));
        }

        if body.msg.trim().is_empty() {
            return Err(GatewayError::InvalidResponse(
                "Gateway returned an empty token".to_string(),
            ));
        }

        Ok(SecretString::from(body.msg))
    }
}

#[async_trait]
impl TokenSource for Every8dAuth {
    type Error = GatewayError;

    #[instrument(skip_all)]
    async fn fetch(&self) -> Result<SecretString, GatewayError> {
        let result = self.exchange().await;

        let status = match &result {
            Ok(_) => "success",
            Err(GatewayError::AuthFailure(_)) => "auth_failure",
            Err(GatewayError::Unreachable(_)) => "unreachable",
            Err(_) => "invalid_response",
        };
        record_gateway_token_fetch(status);

        result
    }

    /// `Result: true` means the token is still valid.
    #[instrument(skip_all)]
    async fn probe(&self, token: &SecretString) -> Result<bool, GatewayError> {
        let response = self
            .client
            .post(join_url(&self.base_url, CONNECTION_PATH))
            .bearer_auth(token.expose_secret())
            .json(&serde_json::json!({
                "HandlerType": 3,
                "VerifyType": 2,
            }))
            .send()
            .await
            .map_err(|e| unreachable(&e))?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Ok(false);
        }

        let body = read_connection_response(response).await?;
        Ok(body.result)
    }
}

async fn read_connection_response(response: Response) -> Result<ConnectionResponse, GatewayError> {
    let status = response.status();
    if status.is_server_error() {
        warn!(target: "identity.gateway", status = %status, "SMS gateway returned server error");
        return Err(GatewayError::Unreachable(format!("Gateway returned {}", status)));
    }

    let body = response.text().await.map_err(|e| unreachable(&e))?;
    serde_json::from_str(&body).map_err(|e| {
        warn!(target: "identity.gateway", status = %status, error = %e, "Failed to parse SMS gateway response");
        GatewayError::InvalidResponse(format!("Undecodable connection response ({})", status))
    })
}

fn unreachable(error: &reqwest::Error) -> GatewayError {
    warn!(target: "identity.gateway", error = %error, "SMS gateway request failed");
    GatewayError::Unreachable("SMS gateway is unavailable".to_string())
}

// ============================================================================
// Client
// ============================================================================

/// SMS client. Shareable across tasks; all sends use one cached token.
pub struct Every8dClient {
    client: Client,
    base_url: String,
    cache: TokenCache<Every8dAuth>,
}

impl Every8dClient {
    pub fn new(client: Client, config: &Every8dConfig) -> Self {
        Self {
            cache: TokenCache::new(Every8dAuth::new(client.clone(), config)),
            base_url: config.base_url.clone(),
            client,
        }
    }

    /// Send `message` to `destination`.
    ///
    /// A send rejected for credentials (HTTP 401 or code `-2`) drops the token
    /// it used, re-authenticates and is retried exactly once.
    #[instrument(skip_all)]
    pub async fn send_sms(
        &self,
        destination: &str,
        message: &str,
    ) -> Result<SendReceipt, GatewayError> {
        let start = Instant::now();
        let result = self.send_with_reauth(destination, message).await;

        let status = match &result {
            Ok(_) => "success",
            Err(GatewayError::SendFailure { .. }) => "send_failure",
            Err(GatewayError::AuthFailure(_)) => "auth_failure",
            Err(GatewayError::Unreachable(_)) => "unreachable",
            Err(GatewayError::InvalidResponse(_)) => "invalid_response",
        };
        record_sms_send(status, start.elapsed());

        result
    }

    async fn send_with_reauth(
        &self,
        destination: &str,
        message: &str,
    ) -> Result<SendReceipt, GatewayError> {
        let token = self.cache.ensure_fresh().await?;

        match self.send_once(&token, destination, message).await {
            Err(e) if is_credential_rejection(&e) => {
                debug!(
                    target: "identity.gateway",
                    generation = token.generation(),
                    "Send rejected for credentials, re-authenticating"
                );
                let token = self.cache.refresh(Some(token.generation())).await?;
                self.send_once(&token, destination, message).await
            }
            other => other,
        }
    }

    async fn send_once(
        &self,
        token: &CachedToken,
        destination: &str,
        message: &str,
    ) -> Result<SendReceipt, GatewayError> {
        let response = self
            .client
            .post(join_url(&self.base_url, SEND_PATH))
            .bearer_auth(token.value().expose_secret())
            .form(&[("MSG", message), ("DEST", destination)])
            .send()
            .await
            .map_err(|e| unreachable(&e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(GatewayError::AuthFailure(
                "Gateway rejected the bearer token".to_string(),
            ));
        }
        if status.is_server_error() {
            warn!(target: "identity.gateway", status = %status, "SMS gateway returned server error");
            return Err(GatewayError::Unreachable(format!("Gateway returned {}", status)));
        }

        let body = response.text().await.map_err(|e| unreachable(&e))?;
        parse_send_response(&body)
    }

    /// Token cache, for inspection.
    pub fn token_cache(&self) -> &TokenCache<Every8dAuth> {
        &self.cache
    }
}

fn is_credential_rejection(error: &GatewayError) -> bool {
    match error {
        GatewayError::AuthFailure(_) => true,
        GatewayError::SendFailure { code, .. } => code == CREDENTIAL_ERROR_CODE,
        _ => false,
    }
}

/// Parse a send response body.
///
/// A body led by an integer status code is a failure (`code,message`, the
/// message may itself contain commas). An acknowledgement leads with the
/// remaining credit as a decimal and carries the batch id in its last field.
fn parse_send_response(body: &str) -> Result<SendReceipt, GatewayError> {
    let body = body.trim();
    let mut head = body.splitn(2, ',');
    let first = head.next().unwrap_or_default().trim();

    if first.parse::<i64>().is_ok() {
        let code = first.to_string();
        let raw_message = head.next().unwrap_or_default();
        let message = map_error_code(&code)
            .map(str::to_string)
            .unwrap_or_else(|| raw_message.to_string());
        return Err(GatewayError::SendFailure { code, message });
    }

    match body.rsplit(',').next().map(str::trim) {
        Some(batch_id) if !batch_id.is_empty() => Ok(SendReceipt {
            batch_id: batch_id.to_string(),
        }),
        _ => Err(GatewayError::InvalidResponse(
            "Empty send response".to_string(),
        )),
    }
}
