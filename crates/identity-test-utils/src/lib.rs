//! # Identity Test Utilities
//!
//! Shared test utilities for the identity service.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (checked-in RSA keys)
//! - In-memory revocation store and principal directory with failure injection
//! - Test data builders (principals, TestTokenBuilder)
//! - Server test harness (TestIdentityServer for E2E tests)
//! - Fixed test IDs (UUIDs, constants)
//! - Custom assertions (TokenAssertions trait)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use identity_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let server = TestIdentityServer::spawn().await?;
//!     server.directory().add_admin(alice());
//!
//!     let token = server.issue_token(&Principal::Admin(alice())).await?;
//!
//!     token
//!         .assert_valid_jwt()
//!         .assert_signed_by(server.keys().key_id());
//! }
//! ```

pub mod assertions;
pub mod crypto_fixtures;
pub mod server_harness;
pub mod stores;
pub mod test_ids;
pub mod token_builders;

// Re-export commonly used items
pub use assertions::*;
pub use crypto_fixtures::*;
pub use server_harness::*;
pub use stores::*;
pub use test_ids::*;
pub use token_builders::*;
