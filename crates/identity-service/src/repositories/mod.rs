//! Persistence seams used by the token services.
//!
//! Both traits are object safe; services hold them as `Arc<dyn ...>` so the
//! Postgres adapters below can be swapped for in-memory ones in tests.

pub mod access_tokens;
pub mod principals;

use crate::errors::StoreError;
use crate::models::{AccessTokenRecord, Admin, Principal, SubjectKind, System, TokenId};
use async_trait::async_trait;
use std::fmt;

pub use access_tokens::PgAccessTokenStore;
pub use principals::PgPrincipalDirectory;

/// Revocation store: one record per live access token.
#[async_trait]
pub trait AccessTokenStore: Send + Sync {
    /// Persist a record. Must be durable before it returns `Ok`.
    async fn insert(&self, record: &AccessTokenRecord) -> Result<(), StoreError>;

    /// Look up a record. Expired records are reported as absent.
    async fn find(&self, id: &TokenId) -> Result<Option<AccessTokenRecord>, StoreError>;

    /// Remove a record. Returns whether one existed.
    async fn delete(&self, id: &TokenId) -> Result<bool, StoreError>;
}

/// Principal lookup.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    /// Resolve a token subject. Ids that cannot exist resolve to `None`.
    async fn find(
        &self,
        kind: SubjectKind,
        subject_id: &str,
    ) -> Result<Option<Principal>, StoreError>;

    /// Find the admin linked to an external identity.
    async fn find_admin_by_provider(
        &self,
        provider: &str,
        provider_subject_id: &str,
    ) -> Result<Option<Admin>, StoreError>;

    /// Fetch a system together with the bcrypt hash of its secret key.
    async fn find_system_credentials(
        &self,
        system_id: &str,
    ) -> Result<Option<SystemCredentials>, StoreError>;
}

/// A system account and its stored secret hash.
#[derive(Clone)]
pub struct SystemCredentials {
    pub system: System,
    pub secret_hash: String,
}

impl fmt::Debug for SystemCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemCredentials")
            .field("system", &self.system)
            .field("secret_hash", &"[REDACTED]")
            .finish()
    }
}
