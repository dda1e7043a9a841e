//! Postgres principal directory over the `admins` and `systems` tables.

use super::{PrincipalDirectory, SystemCredentials};
use crate::errors::StoreError;
use crate::models::{Admin, Principal, SubjectKind, System};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PgPrincipalDirectory {
    pool: PgPool,
}

impl PgPrincipalDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn admin_by_id(&self, id: Uuid) -> Result<Option<Admin>, StoreError> {
        sqlx::query_as::<_, Admin>(
            r#"
            SELECT id, name, username, provider, provider_id, role_id, deactivated_at
            FROM admins
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to fetch admin by id: {}", e)))
    }

    async fn system_by_id(&self, id: Uuid) -> Result<Option<System>, StoreError> {
        sqlx::query_as::<_, System>(
            r#"
            SELECT id, name, url, organization_id
            FROM systems
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to fetch system by id: {}", e)))
    }
}

#[derive(sqlx::FromRow)]
struct SystemCredentialRow {
    id: Uuid,
    name: String,
    url: Option<String>,
    organization_id: Option<Uuid>,
    secret_key_hash: String,
}

#[async_trait]
impl PrincipalDirectory for PgPrincipalDirectory {
    async fn find(
        &self,
        kind: SubjectKind,
        subject_id: &str,
    ) -> Result<Option<Principal>, StoreError> {
        // Every stored id is a UUID; anything else cannot match.
        let Ok(id) = Uuid::parse_str(subject_id) else {
            return Ok(None);
        };

        match kind {
            SubjectKind::Admin => Ok(self.admin_by_id(id).await?.map(Principal::Admin)),
            SubjectKind::System => Ok(self.system_by_id(id).await?.map(Principal::System)),
        }
    }

    async fn find_admin_by_provider(
        &self,
        provider: &str,
        provider_subject_id: &str,
    ) -> Result<Option<Admin>, StoreError> {
        sqlx::query_as::<_, Admin>(
            r#"
            SELECT id, name, username, provider, provider_id, role_id, deactivated_at
            FROM admins
            WHERE provider = $1 AND provider_id = $2
            "#,
        )
        .bind(provider)
        .bind(provider_subject_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to fetch admin by provider: {}", e)))
    }

    async fn find_system_credentials(
        &self,
        system_id: &str,
    ) -> Result<Option<SystemCredentials>, StoreError> {
        let Ok(id) = Uuid::parse_str(system_id) else {
            return Ok(None);
        };

        let row = sqlx::query_as::<_, SystemCredentialRow>(
            r#"
            SELECT id, name, url, organization_id, secret_key_hash
            FROM systems
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to fetch system credentials: {}", e)))?;

        Ok(row.map(|row| SystemCredentials {
            system: System {
                id: row.id,
                name: row.name,
                url: row.url,
                organization_id: row.organization_id,
            },
            secret_hash: row.secret_key_hash,
        }))
    }
}
