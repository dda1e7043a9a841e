//! Builder patterns for test data construction
//!
//! Provides fluent APIs for creating principals and signed test tokens,
//! including tokens the service never issues (expired, forged, wrong
//! algorithm) for negative tests.

use crate::test_ids::{TEST_ADMIN_ALICE, TEST_ORG_XINCHUAN, TEST_XINCHUAN_SUBJECT_ALICE};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use identity_service::crypto::KeyManager;
use identity_service::models::{
    AccessClaims, Admin, Principal, SubjectKind, System, TokenId, PROVIDER_XINCHUAN_AUTH,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use uuid::Uuid;

/// Admin linked to `provider`/`provider_id`.
pub fn test_admin(id: Uuid, provider: &str, provider_id: &str) -> Admin {
    Admin {
        id,
        name: format!("Admin {}", id.as_u128()),
        username: format!("admin{}", id.as_u128()),
        provider: provider.to_string(),
        provider_id: provider_id.to_string(),
        role_id: None,
        deactivated_at: None,
    }
}

/// Admin Alice, linked to the primary provider.
pub fn alice() -> Admin {
    test_admin(TEST_ADMIN_ALICE, PROVIDER_XINCHUAN_AUTH, TEST_XINCHUAN_SUBJECT_ALICE)
}

/// System account belonging to the test organization.
pub fn test_system(id: Uuid) -> System {
    System {
        id,
        name: format!("system-{}", id.as_u128()),
        url: Some(format!("https://system-{}.test", id.as_u128())),
        organization_id: Some(TEST_ORG_XINCHUAN),
    }
}

/// Builder for access token claims
///
/// # Example
/// ```rust,ignore
/// let token = TestTokenBuilder::new()
///     .for_system(TEST_SYSTEM_BILLING)
///     .expires_in(-60)
///     .sign_with(&keys);
/// ```
pub struct TestTokenBuilder {
    sub: String,
    kind: SubjectKind,
    jti: String,
    iat: i64,
    exp: i64,
}

impl TestTokenBuilder {
    /// Create a new token builder with defaults (admin Alice, valid for an hour)
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            sub: TEST_ADMIN_ALICE.to_string(),
            kind: SubjectKind::Admin,
            jti: TokenId::generate().to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(3600)).timestamp(),
        }
    }

    /// Claims for an existing principal
    pub fn for_principal(principal: &Principal) -> Self {
        Self::new()
            .with_kind(principal.kind())
            .with_subject(&principal.subject_id())
    }

    pub fn for_admin(self, id: Uuid) -> Self {
        self.with_kind(SubjectKind::Admin).with_subject(&id.to_string())
    }

    pub fn for_system(self, id: Uuid) -> Self {
        self.with_kind(SubjectKind::System).with_subject(&id.to_string())
    }

    pub fn with_subject(mut self, subject: &str) -> Self {
        self.sub = subject.to_string();
        self
    }

    pub fn with_kind(mut self, kind: SubjectKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_jti(mut self, jti: &str) -> Self {
        self.jti = jti.to_string();
        self
    }

    /// Set expiration in seconds from now (negative for already expired)
    pub fn expires_in(mut self, seconds: i64) -> Self {
        self.exp = (Utc::now() + Duration::seconds(seconds)).timestamp();
        self
    }

    /// Set issued-at timestamp
    pub fn issued_at(mut self, timestamp: i64) -> Self {
        self.iat = timestamp;
        self
    }

    pub fn build(self) -> AccessClaims {
        AccessClaims {
            sub: self.sub,
            kind: self.kind,
            jti: self.jti,
            iat: self.iat,
            exp: self.exp,
        }
    }

    /// Sign with the given key exactly as the service would.
    ///
    /// No revocation record is written; pair with a store insert when the
    /// token should verify.
    pub fn sign_with(self, keys: &KeyManager) -> String {
        keys.sign(&self.build()).expect("test token signing")
    }

    /// Sign with HS256 using `secret` (algorithm confusion attempts).
    pub fn sign_hs256(self, secret: &[u8]) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &self.build(),
            &EncodingKey::from_secret(secret),
        )
        .expect("HS256 test token signing")
    }

    /// Unsigned token with `"alg":"none"` and an empty signature segment.
    pub fn unsigned(self) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
        let payload =
            URL_SAFE_NO_PAD.encode(serde_json::to_vec(&self.build()).expect("claims JSON"));
        format!("{}.{}.", header, payload)
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}
