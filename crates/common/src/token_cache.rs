//! Single-slot cache for an upstream bearer token.
//!
//! Some upstreams hand out opaque bearer tokens that stay valid until the
//! upstream decides otherwise. The caller cannot know the expiry, so the
//! cache asks the upstream (a cheap "probe") before each use and re-fetches
//! when the probe says the token went stale.
//!
//! # Lifecycle
//!
//! ```text
//! NoToken -> Fetching -> Cached -> (Verified | StaleDetected) -> Fetching ...
//! ```
//!
//! # Concurrency
//!
//! - The token slot sits behind a `tokio::sync::RwLock`; the lock is held only
//!   to read or replace the value, never across a network call.
//! - Fetches are single-flight: a `tokio::sync::Mutex` gate admits one
//!   refresh at a time. Every fetched token carries a generation number, so a
//!   caller that waited at the gate can see that the token it considered stale
//!   has already been replaced and reuse the replacement instead of fetching
//!   again.
//! - Dropping a caller mid-fetch releases the gate and leaves the slot as it
//!   was.
//!
//! # Example
//!
//! ```rust,ignore
//! use common::token_cache::{TokenCache, TokenSource};
//!
//! let cache = TokenCache::new(MyGatewayAuth::new(config));
//!
//! let token = cache.ensure_fresh().await?;
//! send_with_bearer(token.value()).await?;
//! ```

use crate::secret::SecretString;
use async_trait::async_trait;
use std::fmt;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument, warn};

// =============================================================================
// Token Source
// =============================================================================

/// The upstream a [`TokenCache`] obtains and probes tokens from.
///
/// Implementations must never return an empty token from [`TokenSource::fetch`];
/// report that as an error instead.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Error surfaced by fetch and probe calls.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Exchange configured credentials for a fresh bearer token.
    async fn fetch(&self) -> Result<SecretString, Self::Error>;

    /// Ask the upstream whether `token` is still accepted.
    ///
    /// `Ok(false)` marks the token stale. `Err` means the upstream could not
    /// be asked; the cached token is kept.
    async fn probe(&self, token: &SecretString) -> Result<bool, Self::Error>;
}

// =============================================================================
// Cached Token
// =============================================================================

/// A token held by the cache together with the generation it was fetched in.
#[derive(Clone)]
pub struct CachedToken {
    value: SecretString,
    generation: u64,
}

impl CachedToken {
    /// The bearer value.
    #[must_use]
    pub fn value(&self) -> &SecretString {
        &self.value
    }

    /// Monotonic fetch counter, starting at 1 for the first token.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for CachedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedToken")
            .field("value", &"[REDACTED]")
            .field("generation", &self.generation)
            .finish()
    }
}

// =============================================================================
// Token Cache
// =============================================================================

/// Cache-check-refresh coordinator around a single token slot.
pub struct TokenCache<S> {
    source: S,
    slot: RwLock<Option<CachedToken>>,
    /// Refresh gate. Holds the generation of the last fetched token.
    refresh_gate: Mutex<u64>,
}

impl<S> fmt::Debug for TokenCache<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCache")
            .field("slot", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl<S: TokenSource> TokenCache<S> {
    /// Create an empty cache. No network call is made until first use.
    pub fn new(source: S) -> Self {
        Self {
            source,
            slot: RwLock::new(None),
            refresh_gate: Mutex::new(0),
        }
    }

    /// The underlying token source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// The currently cached token, if any, without contacting the upstream.
    pub async fn current(&self) -> Option<CachedToken> {
        self.slot.read().await.clone()
    }

    /// Return a token the upstream currently accepts.
    ///
    /// Fetches when the slot is empty; otherwise probes the cached token and
    /// re-fetches when the probe reports it stale.
    ///
    /// # Errors
    ///
    /// Propagates the source's fetch or probe error.
    #[instrument(skip_all)]
    pub async fn ensure_fresh(&self) -> Result<CachedToken, S::Error> {
        let Some(cached) = self.current().await else {
            debug!(target: "common.token_cache", "No cached token, fetching");
            return self.refresh(None).await;
        };

        if self.source.probe(&cached.value).await? {
            return Ok(cached);
        }

        debug!(
            target: "common.token_cache",
            generation = cached.generation,
            "Cached token reported stale, refreshing"
        );
        self.refresh(Some(cached.generation)).await
    }

    /// Replace the token of generation `stale` (or fill an empty slot when
    /// `stale` is `None`) with a freshly fetched one.
    ///
    /// Single-flight: if another caller already replaced the token while this
    /// one waited, the replacement is returned without a second fetch.
    ///
    /// # Errors
    ///
    /// Propagates the source's fetch error. A stale token is dropped from the
    /// slot even when its replacement could not be fetched.
    #[instrument(skip_all)]
    pub async fn refresh(&self, stale: Option<u64>) -> Result<CachedToken, S::Error> {
        let mut last_generation = self.refresh_gate.lock().await;

        if let Some(cached) = self.current().await {
            if stale != Some(cached.generation) {
                debug!(
                    target: "common.token_cache",
                    generation = cached.generation,
                    "Token already refreshed by another caller"
                );
                return Ok(cached);
            }
        }

        match self.source.fetch().await {
            Ok(value) => {
                *last_generation += 1;
                let cached = CachedToken {
                    value,
                    generation: *last_generation,
                };
                *self.slot.write().await = Some(cached.clone());
                debug!(
                    target: "common.token_cache",
                    generation = cached.generation,
                    "Token fetched and cached"
                );
                Ok(cached)
            }
            Err(e) => {
                warn!(target: "common.token_cache", error = %e, "Token fetch failed");
                if let Some(generation) = stale {
                    self.invalidate(generation).await;
                }
                Err(e)
            }
        }
    }

    /// Drop the cached token if it is still of `generation`.
    ///
    /// A newer token fetched by another caller is left in place.
    pub async fn invalidate(&self, generation: u64) {
        let mut slot = self.slot.write().await;
        if slot.as_ref().map(CachedToken::generation) == Some(generation) {
            *slot = None;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
