//! Trade request persistence

use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::models::{TradeRequest, TradeStatus};

fn map_row(row: &PgRow) -> Result<TradeRequest> {
    let status: String = row.get("status");

    Ok(TradeRequest {
        id: row.get("id"),
        requester_id: row.get("requester_id"),
        target_user_id: row.get("target_user_id"),
        requester_reservation_id: row.get("requester_reservation_id"),
        target_reservation_id: row.get("target_reservation_id"),
        status: status.parse()?,
        message: row.get("message"),
        response_message: row.get("response_message"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        responded_at: row.get("responded_at"),
    })
}

const TRADE_COLUMNS: &str = "id, requester_id, target_user_id, requester_reservation_id, \
     target_reservation_id, status, message, response_message, created_at, updated_at, \
     responded_at";

/// Trade request repository
#[derive(Clone)]
pub struct TradeRepository {
    pool: PgPool,
}

impl TradeRepository {
    /// Create a new trade repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a pending trade request
    pub async fn insert(
        &self,
        requester_id: Uuid,
        target_user_id: Uuid,
        requester_reservation_id: Uuid,
        target_reservation_id: Uuid,
        message: &str,
    ) -> Result<TradeRequest> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO trade_requests
                (requester_id, target_user_id, requester_reservation_id,
                 target_reservation_id, status, message)
            VALUES ($1, $2, $3, $4, 'PENDING', $5)
            RETURNING {TRADE_COLUMNS}
            "#
        ))
        .bind(requester_id)
        .bind(target_user_id)
        .bind(requester_reservation_id)
        .bind(target_reservation_id)
        .bind(message)
        .fetch_one(&self.pool)
        .await?;

        map_row(&row)
    }

    /// Find a trade request by id
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<TradeRequest>> {
        let row = sqlx::query(&format!(
            "SELECT {TRADE_COLUMNS} FROM trade_requests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row).transpose()
    }

    /// Trades the user is involved in, as requester or target, newest first
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<TradeRequest>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {TRADE_COLUMNS}
            FROM trade_requests
            WHERE requester_id = $1 OR target_user_id = $1
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row).collect()
    }

    /// Record the target user's response inside the caller's transaction
    ///
    /// The update only matches while the trade is still pending, so of two
    /// racing responders exactly one sees a row; the loser gets `None` and
    /// must roll back.
    pub async fn set_response(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: TradeStatus,
        response_message: Option<&str>,
    ) -> Result<Option<TradeRequest>> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE trade_requests
            SET status = $2,
                response_message = $3,
                responded_at = now(),
                updated_at = now()
            WHERE id = $1 AND status = 'PENDING'
            RETURNING {TRADE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(response_message)
        .fetch_optional(&mut **tx)
        .await?;

        row.as_ref().map(map_row).transpose()
    }
}
