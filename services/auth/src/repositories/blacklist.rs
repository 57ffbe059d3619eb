//! Refresh token blacklist repository
//!
//! Revocation is an idempotent insert keyed on the jti; the first writer
//! wins and later writers observe that the jti was already present. A
//! periodic prune deletes rows whose expiry has passed.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::session::RevocationStore;

/// Blacklist repository backed by the `refresh_token_blacklist` table
#[derive(Clone)]
pub struct BlacklistRepository {
    pool: PgPool,
}

impl BlacklistRepository {
    /// Create a new blacklist repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RevocationStore for BlacklistRepository {
    async fn revoke(
        &self,
        jti: Uuid,
        user_id: Option<Uuid>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO refresh_token_blacklist (jti, user_id, revoked_at, expires_at)
            VALUES ($1, $2, now(), $3)
            ON CONFLICT (jti) DO NOTHING
            "#,
        )
        .bind(jti)
        .bind(user_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn is_revoked(&self, jti: Uuid) -> Result<bool> {
        let revoked: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM refresh_token_blacklist WHERE jti = $1)",
        )
        .bind(jti)
        .fetch_one(&self.pool)
        .await?;

        Ok(revoked)
    }

    async fn prune(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM refresh_token_blacklist WHERE expires_at IS NOT NULL AND expires_at < $1",
        )
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
