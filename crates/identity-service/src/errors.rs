use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// Component errors
// ============================================================================

/// The configured key blob is not a usable RSA private key.
#[derive(Debug, Error)]
#[error("Invalid signing key: {0}")]
pub struct KeyFormatError(pub String);

/// Failure of the revocation store or the principal directory.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),
}

/// Issuance failed; no token was handed out.
#[derive(Debug, Error)]
pub enum IssueError {
    #[error("Token signing failed: {0}")]
    Signing(String),

    #[error("Token record could not be persisted: {0}")]
    Persistence(String),
}

/// Why a presented bearer token was not accepted.
///
/// All variants except `Store` are expected traffic and map to 401.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("Malformed access token")]
    MalformedToken,

    #[error("Access token signature is invalid")]
    BadSignature,

    #[error("Access token has expired")]
    Expired,

    #[error("Access token has been revoked")]
    Revoked,

    #[error("Access token subject does not exist")]
    UnknownSubject,

    #[error("Token lookup failed: {0}")]
    Store(String),
}

impl VerifyError {
    /// Bounded label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            VerifyError::MalformedToken => "malformed",
            VerifyError::BadSignature => "bad_signature",
            VerifyError::Expired => "expired",
            VerifyError::Revoked => "revoked",
            VerifyError::UnknownSubject => "unknown_subject",
            VerifyError::Store(_) => "store",
        }
    }
}

impl From<StoreError> for VerifyError {
    fn from(err: StoreError) -> Self {
        VerifyError::Store(err.to_string())
    }
}

/// External identity exchange failures. Never retried by the client itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Identity provider unreachable: {0}")]
    ProviderUnreachable(String),

    #[error("Identity provider rejected the credential: {0}")]
    ProviderRejected(String),

    #[error("Identity provider returned a malformed response: {0}")]
    MalformedResponse(String),
}

/// SMS gateway failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("SMS gateway unreachable: {0}")]
    Unreachable(String),

    #[error("SMS gateway authentication failed: {0}")]
    AuthFailure(String),

    #[error("SMS send failed ({code}): {message}")]
    SendFailure { code: String, message: String },

    #[error("Invalid SMS gateway response: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// HTTP-facing error
// ============================================================================

#[derive(Debug, Error)]
pub enum ApiError {
    /// No credential was supplied, or the Authorization header is not a bearer.
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Invalid token: {0}")]
    InvalidToken(VerifyError),

    /// Authenticated, but as the wrong kind of principal for this route.
    #[error("Forbidden")]
    Forbidden,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Identity provider '{0}' is not configured")]
    UnsupportedProvider(String),

    #[error("Identity provider error: {0}")]
    Provider(ProviderError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),
}

impl From<VerifyError> for ApiError {
    fn from(err: VerifyError) -> Self {
        ApiError::InvalidToken(err)
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        ApiError::Provider(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Database(err.to_string())
    }
}

impl From<IssueError> for ApiError {
    fn from(err: IssueError) -> Self {
        match err {
            IssueError::Signing(reason) => ApiError::Crypto(reason),
            IssueError::Persistence(reason) => ApiError::Database(reason),
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::AuthenticationRequired => (
                StatusCode::UNAUTHORIZED,
                "AUTHENTICATION_REQUIRED",
                "A bearer token is required".to_string(),
            ),
            ApiError::InvalidToken(VerifyError::Store(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "An internal database error occurred".to_string(),
            ),
            ApiError::InvalidToken(reason) => {
                let code = match reason {
                    VerifyError::MalformedToken => "MALFORMED_TOKEN",
                    VerifyError::BadSignature => "BAD_SIGNATURE",
                    VerifyError::Expired => "TOKEN_EXPIRED",
                    VerifyError::Revoked => "TOKEN_REVOKED",
                    VerifyError::UnknownSubject | VerifyError::Store(_) => "UNKNOWN_SUBJECT",
                };
                (StatusCode::UNAUTHORIZED, code, reason.to_string())
            }
            ApiError::Forbidden => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "This endpoint is not available to the authenticated principal".to_string(),
            ),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "Invalid credentials".to_string(),
            ),
            ApiError::UnsupportedProvider(provider) => (
                StatusCode::BAD_REQUEST,
                "UNSUPPORTED_PROVIDER",
                format!("Identity provider '{}' is not available", provider),
            ),
            ApiError::Provider(ProviderError::ProviderRejected(_)) => (
                StatusCode::UNAUTHORIZED,
                "PROVIDER_REJECTED",
                "The identity provider rejected the credential".to_string(),
            ),
            ApiError::Provider(ProviderError::ProviderUnreachable(_)) => (
                StatusCode::BAD_GATEWAY,
                "PROVIDER_UNAVAILABLE",
                "The identity provider could not be reached".to_string(),
            ),
            ApiError::Provider(ProviderError::MalformedResponse(_)) => (
                StatusCode::BAD_GATEWAY,
                "PROVIDER_ERROR",
                "The identity provider returned an invalid response".to_string(),
            ),
            ApiError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                "An internal database error occurred".to_string(),
            ),
            ApiError::Crypto(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CRYPTO_ERROR",
                "An internal cryptographic error occurred".to_string(),
            ),
        };

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(error_response)).into_response()
    }
}
