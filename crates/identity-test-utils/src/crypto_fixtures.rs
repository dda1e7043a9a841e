//! Deterministic cryptographic fixtures for testing
//!
//! Fixed RSA keys checked in under `fixtures/`, so every test run signs with
//! the same key material and key ids are stable.

use common::secret::SecretString;
use identity_service::crypto::KeyManager;
use identity_service::errors::KeyFormatError;
use std::sync::Arc;

/// Primary signing key (PKCS#8).
pub const SIGNING_KEY_PKCS8_PEM: &str = include_str!("../fixtures/signing_key_pkcs8.pem");

/// A second, unrelated RSA key (PKCS#8). Tokens it signs must not verify.
pub const ALTERNATE_KEY_PKCS8_PEM: &str = include_str!("../fixtures/alternate_key_pkcs8.pem");

/// The alternate key in PKCS#1 (`RSA PRIVATE KEY`) encoding.
pub const ALTERNATE_KEY_PKCS1_PEM: &str = include_str!("../fixtures/alternate_key_pkcs1.pem");

/// A P-256 EC key. Must be refused as a signing key.
pub const EC_P256_PKCS8_PEM: &str = include_str!("../fixtures/ec_p256_pkcs8.pem");

/// Wrap a PEM fixture the way configuration hands it to the service.
pub fn signing_key_secret(pem: &str) -> SecretString {
    SecretString::from(pem.to_string())
}

/// Load a key manager from a PEM fixture.
pub fn key_manager_from(pem: &str) -> Result<KeyManager, KeyFormatError> {
    KeyManager::load(&signing_key_secret(pem))
}

/// Key manager over the primary signing key.
pub fn test_key_manager() -> Arc<KeyManager> {
    Arc::new(key_manager_from(SIGNING_KEY_PKCS8_PEM).expect("signing key fixture must load"))
}

/// Key manager over the alternate key.
pub fn alternate_key_manager() -> Arc<KeyManager> {
    Arc::new(key_manager_from(ALTERNATE_KEY_PKCS8_PEM).expect("alternate key fixture must load"))
}
