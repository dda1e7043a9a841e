//! Postgres revocation store.
//!
//! Records live in one table per principal kind (`admin_access_tokens`,
//! `system_access_tokens`), keyed by the token id.

use super::AccessTokenStore;
use crate::errors::StoreError;
use crate::models::{AccessTokenRecord, SubjectKind, TokenId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PgAccessTokenStore {
    pool: PgPool,
}

impl PgAccessTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TokenRow {
    id: Uuid,
    subject_kind: String,
    subject_id: Uuid,
    expired_at: DateTime<Utc>,
}

impl TryFrom<TokenRow> for AccessTokenRecord {
    type Error = StoreError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        let subject_kind = match row.subject_kind.as_str() {
            "admin" => SubjectKind::Admin,
            "system" => SubjectKind::System,
            other => {
                return Err(StoreError::Database(format!(
                    "Unexpected subject kind in token row: {}",
                    other
                )))
            }
        };

        Ok(AccessTokenRecord {
            id: TokenId::from(row.id),
            subject_kind,
            subject_id: row.subject_id.to_string(),
            expires_at: row.expired_at,
        })
    }
}

#[async_trait]
impl AccessTokenStore for PgAccessTokenStore {
    async fn insert(&self, record: &AccessTokenRecord) -> Result<(), StoreError> {
        let subject_id = Uuid::parse_str(&record.subject_id).map_err(|e| {
            StoreError::Database(format!("Subject id is not a UUID: {}", e))
        })?;

        let query = match record.subject_kind {
            SubjectKind::Admin => {
                "INSERT INTO admin_access_tokens (id, admin_id, expired_at) VALUES ($1, $2, $3)"
            }
            SubjectKind::System => {
                "INSERT INTO system_access_tokens (id, system_id, expired_at) VALUES ($1, $2, $3)"
            }
        };

        sqlx::query(query)
            .bind(record.id.as_uuid())
            .bind(subject_id)
            .bind(record.expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to insert access token: {}", e)))?;

        Ok(())
    }

    async fn find(&self, id: &TokenId) -> Result<Option<AccessTokenRecord>, StoreError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT id, 'admin' AS subject_kind, admin_id AS subject_id, expired_at
            FROM admin_access_tokens
            WHERE id = $1 AND expired_at > NOW()
            UNION ALL
            SELECT id, 'system' AS subject_kind, system_id AS subject_id, expired_at
            FROM system_access_tokens
            WHERE id = $1 AND expired_at > NOW()
            LIMIT 1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to fetch access token: {}", e)))?;

        row.map(AccessTokenRecord::try_from).transpose()
    }

    async fn delete(&self, id: &TokenId) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
            WITH admin_deleted AS (
                DELETE FROM admin_access_tokens WHERE id = $1 RETURNING id
            ), system_deleted AS (
                DELETE FROM system_access_tokens WHERE id = $1 RETURNING id
            )
            SELECT id FROM admin_deleted
            UNION ALL
            SELECT id FROM system_deleted
            "#,
        )
        .bind(id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(format!("Failed to delete access token: {}", e)))?;

        Ok(!result.is_empty())
    }
}
