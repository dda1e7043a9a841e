//! Identity Service Library
//!
//! Issues, verifies and revokes RS256 access tokens for admin and system
//! principals, and holds the SMS gateway client.
//!
//! # Modules
//!
//! - `config` - Service configuration
//! - `crypto` - Signing key handling, JWKS, secret hashing
//! - `errors` - Error types
//! - `handlers` - HTTP request handlers
//! - `middleware` - Bearer token authentication
//! - `models` - Data models
//! - `observability` - Log field hashing and metrics
//! - `repositories` - Database access layer
//! - `routes` - Router assembly
//! - `services` - Token issuance/verification, identity providers, SMS gateway

pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod repositories;
pub mod routes;
pub mod services;
