//! Access token issuance, verification and revocation.
//!
//! Invariant: every token that verifies has exactly one live record in the
//! [`AccessTokenStore`]. Issuance writes the record before the token is
//! returned; logout deletes it; verification requires it.

use crate::crypto::KeyManager;
use crate::errors::{IssueError, StoreError, VerifyError};
use crate::models::{AccessClaims, AccessTokenRecord, Principal, TokenId};
use crate::observability::hash_for_correlation;
use crate::observability::metrics::{
    record_token_issuance, record_token_revocation, record_token_verification,
};
use crate::repositories::{AccessTokenStore, PrincipalDirectory};
use chrono::{DateTime, Utc};
use common::jwt::{decode_claims, split_token};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// A freshly signed token and the claims inside it.
#[derive(Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: AccessClaims,
}

impl fmt::Debug for IssuedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IssuedToken")
            .field("token", &"[REDACTED]")
            .field("claims", &self.claims)
            .finish()
    }
}

impl IssuedToken {
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.claims.exp, 0).unwrap_or_default()
    }
}

/// Outcome of a successful verification, attached to the request.
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal {
    pub principal: Principal,
    pub token_id: TokenId,
    pub claims: AccessClaims,
}

// ============================================================================
// Issuer
// ============================================================================

/// Mints signed access tokens and owns their revocation records.
#[derive(Clone)]
pub struct TokenIssuer {
    keys: Arc<KeyManager>,
    store: Arc<dyn AccessTokenStore>,
}

impl TokenIssuer {
    pub fn new(keys: Arc<KeyManager>, store: Arc<dyn AccessTokenStore>) -> Self {
        Self { keys, store }
    }

    /// Sign a token for `principal` and persist its record.
    ///
    /// The token is returned only after the record insert succeeded; if the
    /// insert fails the signed token is discarded.
    #[instrument(skip_all, fields(kind = %principal.kind()))]
    pub async fn issue(
        &self,
        principal: &Principal,
        expires_at: DateTime<Utc>,
    ) -> Result<IssuedToken, IssueError> {
        let start = Instant::now();
        let result = self.sign_and_record(principal, expires_at).await;

        let status = if result.is_ok() { "success" } else { "error" };
        record_token_issuance(principal.kind().as_str(), status, start.elapsed());

        result
    }

    async fn sign_and_record(
        &self,
        principal: &Principal,
        expires_at: DateTime<Utc>,
    ) -> Result<IssuedToken, IssueError> {
        let claims = principal.issue_access_token(expires_at);
        let record = AccessTokenRecord::from_claims(&claims)
            .ok_or_else(|| IssueError::Signing("Claims cannot be recorded".to_string()))?;

        let token = self.keys.sign(&claims)?;

        self.store.insert(&record).await.map_err(|e| {
            tracing::error!(
                target: "identity.tokens",
                error = %e,
                token_id = %record.id,
                "Failed to persist access token record, discarding token"
            );
            IssueError::Persistence(e.to_string())
        })?;

        tracing::info!(
            target: "identity.tokens",
            kind = %claims.kind,
            subject = %hash_for_correlation(&claims.sub),
            token_id = %record.id,
            expires_at = claims.exp,
            "Access token issued"
        );

        Ok(IssuedToken { token, claims })
    }

    /// Delete the record behind an authenticated token (logout).
    ///
    /// Returns whether a record was removed.
    #[instrument(skip_all)]
    pub async fn revoke(&self, authenticated: &AuthenticatedPrincipal) -> Result<bool, StoreError> {
        let removed = self.store.delete(&authenticated.token_id).await?;

        record_token_revocation(
            authenticated.claims.kind.as_str(),
            if removed { "revoked" } else { "not_found" },
        );
        tracing::info!(
            target: "identity.tokens",
            kind = %authenticated.claims.kind,
            token_id = %authenticated.token_id,
            removed,
            "Access token revoked"
        );

        Ok(removed)
    }
}

// ============================================================================
// Verifier
// ============================================================================

/// Validates presented bearer tokens. Read-only; safe to call concurrently.
#[derive(Clone)]
pub struct TokenVerifier {
    keys: Arc<KeyManager>,
    store: Arc<dyn AccessTokenStore>,
    directory: Arc<dyn PrincipalDirectory>,
}

impl TokenVerifier {
    pub fn new(
        keys: Arc<KeyManager>,
        store: Arc<dyn AccessTokenStore>,
        directory: Arc<dyn PrincipalDirectory>,
    ) -> Self {
        Self {
            keys,
            store,
            directory,
        }
    }

    /// Verify a token against the current time.
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<AuthenticatedPrincipal, VerifyError> {
        self.verify_at(token, Utc::now().timestamp()).await
    }

    /// Deterministic verification against an explicit `now` (Unix seconds).
    ///
    /// Order: structure, signature, claims, expiry, revocation record,
    /// principal. A tampered payload or signature therefore always fails as
    /// `BadSignature`, whatever else is wrong with it.
    pub async fn verify_at(
        &self,
        token: &str,
        now: i64,
    ) -> Result<AuthenticatedPrincipal, VerifyError> {
        let result = self.check(token, now).await;

        match &result {
            Ok(_) => record_token_verification("success", None),
            Err(VerifyError::Store(e)) => {
                tracing::warn!(target: "identity.tokens", error = %e, "Token lookup failed");
                record_token_verification("error", Some("store"));
            }
            Err(e) => {
                tracing::debug!(target: "identity.tokens", reason = e.reason(), "Token rejected");
                record_token_verification("rejected", Some(e.reason()));
            }
        }

        result
    }

    async fn check(&self, token: &str, now: i64) -> Result<AuthenticatedPrincipal, VerifyError> {
        let segments = split_token(token).map_err(|_| VerifyError::MalformedToken)?;

        self.keys.verify_signature(&segments)?;

        let claims: AccessClaims =
            decode_claims(segments.payload).map_err(|_| VerifyError::MalformedToken)?;

        if claims.is_expired_at(now) {
            return Err(VerifyError::Expired);
        }

        let token_id = TokenId::parse(&claims.jti).ok_or(VerifyError::MalformedToken)?;

        let record = self
            .store
            .find(&token_id)
            .await?
            .ok_or(VerifyError::Revoked)?;

        // A record for another subject cannot vouch for this token.
        if record.subject_kind != claims.kind || record.subject_id != claims.sub {
            tracing::warn!(
                target: "identity.tokens",
                token_id = %token_id,
                "Token record does not match token subject"
            );
            return Err(VerifyError::Revoked);
        }

        let principal = self
            .directory
            .find(claims.kind, &claims.sub)
            .await?
            .ok_or(VerifyError::UnknownSubject)?;

        if let Principal::Admin(admin) = &principal {
            if !admin.is_active() {
                return Err(VerifyError::UnknownSubject);
            }
        }

        Ok(AuthenticatedPrincipal {
            principal,
            token_id,
            claims,
        })
    }
}
