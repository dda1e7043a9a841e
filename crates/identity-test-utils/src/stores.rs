//! In-memory persistence for tests
//!
//! Drop-in replacements for the Postgres adapters, with switches to make
//! individual operations fail deterministically.

use async_trait::async_trait;
use chrono::Utc;
use identity_service::errors::StoreError;
use identity_service::models::{AccessTokenRecord, Admin, Principal, SubjectKind, System, TokenId};
use identity_service::repositories::{AccessTokenStore, PrincipalDirectory, SystemCredentials};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// Bcrypt cost used for fixture secrets (the minimum, to keep tests fast).
pub const TEST_BCRYPT_COST: u32 = 4;

// ============================================================================
// Revocation store
// ============================================================================

#[derive(Default)]
pub struct InMemoryAccessTokenStore {
    records: Mutex<HashMap<TokenId, AccessTokenRecord>>,
    fail_inserts: AtomicBool,
    fail_finds: AtomicBool,
}

impl InMemoryAccessTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent insert fail.
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent lookup fail.
    pub fn fail_finds(&self, fail: bool) {
        self.fail_finds.store(fail, Ordering::SeqCst);
    }

    /// Number of stored records, expired ones included.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &TokenId) -> bool {
        self.records.lock().unwrap().contains_key(id)
    }

    /// Remove a record behind the service's back (external purge).
    pub fn purge(&self, id: &TokenId) {
        self.records.lock().unwrap().remove(id);
    }
}

#[async_trait]
impl AccessTokenStore for InMemoryAccessTokenStore {
    async fn insert(&self, record: &AccessTokenRecord) -> Result<(), StoreError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected insert failure".to_string()));
        }
        self.records.lock().unwrap().insert(record.id, record.clone());
        Ok(())
    }

    async fn find(&self, id: &TokenId) -> Result<Option<AccessTokenRecord>, StoreError> {
        if self.fail_finds.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected lookup failure".to_string()));
        }
        let now = Utc::now();
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(id)
            .filter(|record| record.expires_at > now)
            .cloned())
    }

    async fn delete(&self, id: &TokenId) -> Result<bool, StoreError> {
        Ok(self.records.lock().unwrap().remove(id).is_some())
    }
}

// ============================================================================
// Principal directory
// ============================================================================

#[derive(Default)]
pub struct InMemoryPrincipalDirectory {
    admins: Mutex<Vec<Admin>>,
    systems: Mutex<Vec<SystemCredentials>>,
}

impl InMemoryPrincipalDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_admin(&self, admin: Admin) {
        self.admins.lock().unwrap().push(admin);
    }

    /// Register a system whose secret key is `secret` (stored bcrypt-hashed).
    pub fn add_system(&self, system: System, secret: &str) {
        let secret_hash = bcrypt::hash(secret, TEST_BCRYPT_COST).expect("bcrypt hash");
        self.systems
            .lock()
            .unwrap()
            .push(SystemCredentials { system, secret_hash });
    }

    pub fn deactivate_admin(&self, id: Uuid) {
        for admin in self.admins.lock().unwrap().iter_mut() {
            if admin.id == id {
                admin.deactivated_at = Some(Utc::now());
            }
        }
    }

    pub fn remove_system(&self, id: Uuid) {
        self.systems
            .lock()
            .unwrap()
            .retain(|credentials| credentials.system.id != id);
    }
}

#[async_trait]
impl PrincipalDirectory for InMemoryPrincipalDirectory {
    async fn find(
        &self,
        kind: SubjectKind,
        subject_id: &str,
    ) -> Result<Option<Principal>, StoreError> {
        let Ok(id) = Uuid::parse_str(subject_id) else {
            return Ok(None);
        };

        let principal = match kind {
            SubjectKind::Admin => self
                .admins
                .lock()
                .unwrap()
                .iter()
                .find(|admin| admin.id == id)
                .cloned()
                .map(Principal::Admin),
            SubjectKind::System => self
                .systems
                .lock()
                .unwrap()
                .iter()
                .find(|credentials| credentials.system.id == id)
                .map(|credentials| Principal::System(credentials.system.clone())),
        };
        Ok(principal)
    }

    async fn find_admin_by_provider(
        &self,
        provider: &str,
        provider_subject_id: &str,
    ) -> Result<Option<Admin>, StoreError> {
        Ok(self
            .admins
            .lock()
            .unwrap()
            .iter()
            .find(|admin| admin.provider == provider && admin.provider_id == provider_subject_id)
            .cloned())
    }

    async fn find_system_credentials(
        &self,
        system_id: &str,
    ) -> Result<Option<SystemCredentials>, StoreError> {
        let Ok(id) = Uuid::parse_str(system_id) else {
            return Ok(None);
        };
        Ok(self
            .systems
            .lock()
            .unwrap()
            .iter()
            .find(|credentials| credentials.system.id == id)
            .cloned())
    }
}
