//! Common utilities and types shared across the identity components.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for JWT structure helpers and access-token claims
pub mod jwt;

/// Module for a shared, single-flight cache of an upstream bearer token
pub mod token_cache;
