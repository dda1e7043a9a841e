use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

pub use common::jwt::{AccessClaims, SubjectKind};

/// Provider id of the primary OAuth-style identity provider.
pub const PROVIDER_XINCHUAN_AUTH: &str = "xinchuan-auth";

/// Provider id of the secondary (mobile backend) identity provider.
pub const PROVIDER_MOBILE_BACKEND: &str = "mobile-be";

/// Token id: the `jti` claim of a signed token and the key of its record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(Uuid);

impl TokenId {
    /// Generate a fresh, globally unique id.
    pub fn generate() -> Self {
        TokenId(Uuid::new_v4())
    }

    /// Parse the `jti` claim of a presented token.
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(TokenId)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl From<Uuid> for TokenId {
    fn from(value: Uuid) -> Self {
        TokenId(value)
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Revocation record. Present while the token it belongs to is honored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTokenRecord {
    pub id: TokenId,
    pub subject_kind: SubjectKind,
    pub subject_id: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessTokenRecord {
    /// Build the record matching a claim set.
    ///
    /// Returns `None` if the claims carry an id or expiry that cannot be stored.
    pub fn from_claims(claims: &AccessClaims) -> Option<Self> {
        Some(AccessTokenRecord {
            id: TokenId::parse(&claims.jti)?,
            subject_kind: claims.kind,
            subject_id: claims.sub.clone(),
            expires_at: DateTime::from_timestamp(claims.exp, 0)?,
        })
    }
}

/// Administrative user (maps to admins table)
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Admin {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub provider: String,
    pub provider_id: String,
    pub role_id: Option<Uuid>,
    pub deactivated_at: Option<DateTime<Utc>>,
}

impl Admin {
    pub fn is_active(&self) -> bool {
        self.deactivated_at.is_none()
    }
}

/// Machine account (maps to systems table)
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct System {
    pub id: Uuid,
    pub name: String,
    pub url: Option<String>,
    pub organization_id: Option<Uuid>,
}

/// An authenticated identity.
///
/// Closed set: every `match` over it must handle both kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Principal {
    Admin(Admin),
    System(System),
}

impl Principal {
    pub fn kind(&self) -> SubjectKind {
        match self {
            Principal::Admin(_) => SubjectKind::Admin,
            Principal::System(_) => SubjectKind::System,
        }
    }

    pub fn subject_id(&self) -> String {
        match self {
            Principal::Admin(admin) => admin.id.to_string(),
            Principal::System(system) => system.id.to_string(),
        }
    }

    /// Claim set for a new access token for this principal, with a fresh `jti`.
    pub fn issue_access_token(&self, expires_at: DateTime<Utc>) -> AccessClaims {
        AccessClaims {
            sub: self.subject_id(),
            kind: self.kind(),
            jti: TokenId::generate().to_string(),
            iat: Utc::now().timestamp(),
            exp: expires_at.timestamp(),
        }
    }
}

/// Identity asserted by an external provider after a successful exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct ExternalIdentity {
    pub provider: &'static str,
    pub provider_subject_id: String,
    /// Profile attributes as returned by the provider.
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// Access token response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenResponse {
    pub fn bearer(access_token: String, expires_at: DateTime<Utc>) -> Self {
        TokenResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_at,
        }
    }
}

/// JWKS response (RFC 7517)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<JsonWebKey>,
}

/// RSA JSON Web Key (RFC 7517 / RFC 7518 section 6.3)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonWebKey {
    pub kty: String, // Key Type ("RSA")
    pub kid: String, // Key ID (RFC 7638 thumbprint)
    #[serde(rename = "use")]
    pub use_: String, // Public key use ("sig")
    pub alg: String, // Algorithm ("RS256")
    pub n: String,   // Modulus (base64url, big-endian)
    pub e: String,   // Exponent (base64url, big-endian)
}
