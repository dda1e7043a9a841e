use common::secret::SecretString;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default listen address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default access token lifetime handed out by the login endpoints (24 hours).
pub const DEFAULT_ACCESS_TOKEN_TTL_SECONDS: i64 = 86_400;

/// Default timeout for outbound calls to identity providers and the SMS gateway.
pub const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 10;

/// Default base URL of the primary identity provider.
pub const DEFAULT_XINCHUAN_AUTH_BASE_URL: &str = "https://auth.xinchuan.tw/";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    /// PEM-encoded RSA private key (PKCS#8 or PKCS#1).
    pub signing_key: SecretString,
    pub access_token_ttl_seconds: i64,
    pub http_timeout: Duration,
    pub xinchuan_auth: XinchuanAuthConfig,
    /// Secondary identity provider; disabled when not configured.
    pub mobile_backend: Option<MobileBackendConfig>,
    /// SMS gateway; disabled when not configured.
    pub every8d: Option<Every8dConfig>,
}

/// Primary OAuth-style provider credentials.
#[derive(Debug, Clone)]
pub struct XinchuanAuthConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: SecretString,
    /// Redirect reference sent along with the authorization code.
    pub callback: String,
}

#[derive(Debug, Clone)]
pub struct MobileBackendConfig {
    pub base_url: String,
    pub secret: SecretString,
}

#[derive(Debug, Clone)]
pub struct Every8dConfig {
    pub base_url: String,
    pub username: String,
    pub password: SecretString,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_url = required(vars, "DATABASE_URL")?;

        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let signing_key = SecretString::from(required(vars, "SIGNING_KEY")?);

        let access_token_ttl_seconds = match vars.get("ACCESS_TOKEN_TTL_SECONDS") {
            Some(value) => parse_positive::<i64>("ACCESS_TOKEN_TTL_SECONDS", value)?,
            None => DEFAULT_ACCESS_TOKEN_TTL_SECONDS,
        };

        let http_timeout = match vars.get("HTTP_TIMEOUT_SECONDS") {
            Some(value) => Duration::from_secs(parse_positive::<u64>("HTTP_TIMEOUT_SECONDS", value)?),
            None => Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECONDS),
        };

        let xinchuan_auth = XinchuanAuthConfig {
            base_url: vars
                .get("XINCHUAN_AUTH_BASE_URL")
                .cloned()
                .unwrap_or_else(|| DEFAULT_XINCHUAN_AUTH_BASE_URL.to_string()),
            client_id: required(vars, "XINCHUAN_AUTH_CLIENT_ID")?,
            client_secret: SecretString::from(required(vars, "XINCHUAN_AUTH_CLIENT_SECRET")?),
            callback: required(vars, "XINCHUAN_AUTH_CALLBACK")?,
        };

        // Optional integrations are switched on by their base URL.
        let mobile_backend = match vars.get("MOBILE_BE_AUTH_BASE_URL") {
            Some(base_url) => Some(MobileBackendConfig {
                base_url: base_url.clone(),
                secret: SecretString::from(required(vars, "MOBILE_BE_AUTH_SECRET")?),
            }),
            None => None,
        };

        let every8d = match vars.get("EVERY8D_BASE_URL") {
            Some(base_url) => Some(Every8dConfig {
                base_url: base_url.clone(),
                username: required(vars, "EVERY8D_USERNAME")?,
                password: SecretString::from(required(vars, "EVERY8D_PASSWORD")?),
            }),
            None => None,
        };

        Ok(Config {
            database_url,
            bind_address,
            signing_key,
            access_token_ttl_seconds,
            http_timeout,
            xinchuan_auth,
            mobile_backend,
            every8d,
        })
    }
}

fn required(vars: &HashMap<String, String>, name: &str) -> Result<String, ConfigError> {
    vars.get(name)
        .filter(|value| !value.is_empty())
        .cloned()
        .ok_or_else(|| ConfigError::MissingEnvVar(name.to_string()))
}

fn parse_positive<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let parsed = value.parse::<T>().map_err(|_| ConfigError::InvalidValue {
        var: var.to_string(),
        reason: format!("'{}' is not a valid integer", value),
    })?;

    if parsed <= T::default() {
        return Err(ConfigError::InvalidValue {
            var: var.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    Ok(parsed)
}
