//! Append-only audit log persistence

use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::models::{AuditAction, AuditLogEntry};

fn map_row(row: &PgRow) -> AuditLogEntry {
    AuditLogEntry {
        id: row.get("id"),
        reservation_id: row.get("reservation_id"),
        action: row.get("action"),
        performed_by: row.get("performed_by"),
        details: row.get("details"),
        timestamp: row.get("timestamp"),
    }
}

/// Audit log repository
#[derive(Clone)]
pub struct AuditRepository {
    pool: PgPool,
}

impl AuditRepository {
    /// Create a new audit repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append an audit entry
    pub async fn append(
        &self,
        reservation_id: Uuid,
        action: AuditAction,
        performed_by: Uuid,
        details: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reservation_audit_log (reservation_id, action, performed_by, details)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(reservation_id)
        .bind(action.as_str())
        .bind(performed_by)
        .bind(details)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append an audit entry inside the caller's transaction
    pub async fn append_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        reservation_id: Uuid,
        action: AuditAction,
        performed_by: Uuid,
        details: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reservation_audit_log (reservation_id, action, performed_by, details)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(reservation_id)
        .bind(action.as_str())
        .bind(performed_by)
        .bind(details)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// History of a reservation, oldest first
    pub async fn list_for_reservation(&self, reservation_id: Uuid) -> Result<Vec<AuditLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, reservation_id, action, performed_by, details, timestamp
            FROM reservation_audit_log
            WHERE reservation_id = $1
            ORDER BY timestamp
            "#,
        )
        .bind(reservation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(map_row).collect())
    }
}
