//! Observability for the identity service.
//!
//! # Privacy by Default
//!
//! All instrumentation uses `#[instrument(skip_all)]` and explicit safe field allow-listing.
//! Fields are categorized as:
//! - **SAFE**: Can be logged in plaintext (enums, provider ids, token ids)
//! - **HASHED**: Must be SHA-256 hashed for correlation (subject ids, provider subject ids)
//! - **NEVER**: Must never appear in logs (signing keys, secrets, bearer tokens)

pub mod metrics;

use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars)
///
/// Used for subject identifiers that need correlation across log entries
/// but should not be stored in plaintext.
///
/// This is a one-way hash for correlation only, not a secret-protection
/// primitive.
pub fn hash_for_correlation(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    // First 4 bytes (8 hex chars): enough for correlation, limits reversibility
    hex::encode(digest.get(..4).unwrap_or_default())
}
