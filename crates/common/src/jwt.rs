//! JWT utilities shared by token issuers and verifiers.
//!
//! This module provides:
//! - Size limits for DoS prevention
//! - Structural parsing of compact JWTs (segments + header) without trusting them
//! - The access-token claim set and the closed set of subject kinds
//!
//! # Security
//!
//! - Tokens are size-checked BEFORE parsing (DoS prevention)
//! - Parsing here never verifies a signature; callers MUST verify before
//!   trusting anything decoded from the payload
//! - Generic error messages prevent information leakage
//! - The `sub` field in claims is redacted in Debug output
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{split_token, decode_claims, AccessClaims};
//!
//! let segments = split_token(token)?;
//! if segments.header.alg != "RS256" {
//!     return Err(BadSignature);
//! }
//! // ... verify segments.signature over segments.signing_input ...
//! let claims: AccessClaims = decode_claims(segments.payload)?;
//! ```

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// JWTs larger than this are rejected BEFORE any base64 decoding or
/// cryptographic work. An RS256 access token with the claim set below is
/// roughly 600 bytes, so the limit leaves ample headroom.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while parsing a JWT.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format is invalid (not a valid JWT structure).
    #[error("The access token is invalid or expired")]
    MalformedToken,
}

// =============================================================================
// Claims Types
// =============================================================================

/// The kind of principal an access token was issued to.
///
/// Closed set: adding a kind is a compile-time exhaustiveness change for
/// every `match` over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Admin,
    System,
}

impl SubjectKind {
    /// Stable lowercase label, used in claims, metrics and storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::Admin => "admin",
            SubjectKind::System => "system",
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access token claims structure.
///
/// # Fields
///
/// - `sub`: Subject identifier (admin or system id)
/// - `kind`: Which principal table `sub` refers to
/// - `jti`: Unique token id, also the key of the revocation record
/// - `iat`: Issued-at timestamp (Unix epoch seconds)
/// - `exp`: Expiration timestamp (Unix epoch seconds)
///
/// # Security
///
/// The `sub` field is redacted in Debug output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject identifier - redacted in Debug output.
    pub sub: String,

    /// Subject kind.
    pub kind: SubjectKind,

    /// Token id (UUID).
    pub jti: String,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,
}

impl fmt::Debug for AccessClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessClaims")
            .field("sub", &"[REDACTED]")
            .field("kind", &self.kind)
            .field("jti", &self.jti)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .finish()
    }
}

impl AccessClaims {
    /// Whether the token is expired at `now` (Unix epoch seconds).
    ///
    /// The boundary is inclusive: a token whose `exp` equals `now` is expired.
    #[must_use]
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.exp
    }
}

// =============================================================================
// Structural Parsing
// =============================================================================

/// The JOSE header fields inspected before signature verification.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    #[serde(default)]
    pub typ: Option<String>,
    #[serde(default)]
    pub kid: Option<String>,
}

/// A compact JWT split into its parts. Nothing here is trusted yet.
#[derive(Debug)]
pub struct TokenSegments<'a> {
    /// Decoded header.
    pub header: JwtHeader,
    /// `header.payload`, the bytes the signature covers.
    pub signing_input: &'a str,
    /// Base64url payload segment.
    pub payload: &'a str,
    /// Base64url signature segment.
    pub signature: &'a str,
}

/// Split a compact JWT into header, payload and signature.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Not three segments, or the header is not base64url JSON
pub fn split_token(token: &str) -> Result<TokenSegments<'_>, JwtValidationError> {
    // Check token size first (DoS prevention)
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    // JWT format: header.payload.signature
    let mut parts = token.split('.');
    let (Some(header_part), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!(target: "common.jwt", "Token rejected: invalid JWT format");
        return Err(JwtValidationError::MalformedToken);
    };

    if header_part.is_empty() || payload.is_empty() {
        return Err(JwtValidationError::MalformedToken);
    }

    let header_bytes = URL_SAFE_NO_PAD.decode(header_part).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT header base64");
        JwtValidationError::MalformedToken
    })?;

    let header: JwtHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT header JSON");
        JwtValidationError::MalformedToken
    })?;

    // header + '.' + payload
    let signing_input_len = header_part.len() + 1 + payload.len();
    let signing_input = token
        .get(..signing_input_len)
        .ok_or(JwtValidationError::MalformedToken)?;

    Ok(TokenSegments {
        header,
        signing_input,
        payload,
        signature,
    })
}

/// Decode a base64url payload segment into a claim set.
///
/// # Errors
///
/// Returns `MalformedToken` if the segment is not base64url or the JSON does
/// not match `T`.
pub fn decode_claims<T: DeserializeOwned>(payload: &str) -> Result<T, JwtValidationError> {
    let bytes = URL_SAFE_NO_PAD.decode(payload).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to decode JWT payload base64");
        JwtValidationError::MalformedToken
    })?;

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Failed to parse JWT claims JSON");
        JwtValidationError::MalformedToken
    })
}

// =============================================================================
// Tests
// =============================================================================
