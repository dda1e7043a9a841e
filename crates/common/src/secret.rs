//! Secret wrappers for signing keys, provider secrets, gateway credentials
//! and cached gateway tokens.
//!
//! `Debug` on these types prints `[REDACTED]`; the value is only reachable
//! through `expose_secret()`. Deserializing needs `secrecy`'s `serde` feature,
//! which the workspace enables.

pub use secrecy::{ExposeSecret, SecretString};
