//! Reservation persistence

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::calendar::ReservedInterval;
use crate::models::{NewReservation, Reservation, ReservationKind, ReservationStatus};

fn map_row(row: &PgRow) -> Result<Reservation> {
    let status: String = row.get("status");
    let kind: String = row.get("kind");

    Ok(Reservation {
        id: row.get("id"),
        user_id: row.get("user_id"),
        date: row.get("date"),
        start_time: row.get("start_time"),
        end_time: row.get("end_time"),
        status: status.parse()?,
        kind: kind.parse()?,
        notes: row.get("notes"),
        approved_by: row.get("approved_by"),
        approved_at: row.get("approved_at"),
        rejection_reason: row.get("rejection_reason"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

const RESERVATION_COLUMNS: &str = "id, user_id, date, start_time, end_time, status, kind, notes, \
     approved_by, approved_at, rejection_reason, created_at, updated_at";

/// Reservation repository
#[derive(Clone)]
pub struct ReservationRepository {
    pool: PgPool,
}

impl ReservationRepository {
    /// Create a new reservation repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a reservation by id
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Reservation>> {
        let row = sqlx::query(&format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row).transpose()
    }

    /// List reservations with optional owner, date, and status filters
    pub async fn list(
        &self,
        owner: Option<Uuid>,
        date: Option<NaiveDate>,
        status: Option<ReservationStatus>,
    ) -> Result<Vec<Reservation>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RESERVATION_COLUMNS}
            FROM reservations
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::date IS NULL OR date = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY date, start_time
            "#
        ))
        .bind(owner)
        .bind(date)
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row).collect()
    }

    /// Occupied intervals on a date: pending and confirmed reservations
    pub async fn active_on_date(&self, date: NaiveDate) -> Result<Vec<ReservedInterval>> {
        let rows = sqlx::query(
            r#"
            SELECT id, start_time, end_time
            FROM reservations
            WHERE date = $1 AND status IN ('PENDING', 'CONFIRMED')
            ORDER BY start_time
            "#,
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("id"), row.get("start_time"), row.get("end_time")))
            .collect())
    }

    /// Same as `active_on_date`, but holding row locks inside a transaction
    /// so concurrent bookings serialize on the date being written
    pub async fn lock_active_on_date(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        date: NaiveDate,
    ) -> Result<Vec<ReservedInterval>> {
        let rows = sqlx::query(
            r#"
            SELECT id, start_time, end_time
            FROM reservations
            WHERE date = $1 AND status IN ('PENDING', 'CONFIRMED')
            ORDER BY start_time
            FOR UPDATE
            "#,
        )
        .bind(date)
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows
            .iter()
            .map(|row| (row.get("id"), row.get("start_time"), row.get("end_time")))
            .collect())
    }

    /// Insert a new reservation inside the caller's transaction
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        new: &NewReservation,
        kind: ReservationKind,
        status: ReservationStatus,
    ) -> Result<Reservation> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO reservations (user_id, date, start_time, end_time, status, kind, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {RESERVATION_COLUMNS}
            "#
        ))
        .bind(user_id)
        .bind(new.date)
        .bind(new.start_time)
        .bind(new.end_time)
        .bind(status.as_str())
        .bind(kind.as_str())
        .bind(&new.notes)
        .fetch_one(&mut **tx)
        .await?;

        map_row(&row)
    }

    /// Update only the status of a reservation
    pub async fn set_status(&self, id: Uuid, status: ReservationStatus) -> Result<Reservation> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE reservations
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {RESERVATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;

        map_row(&row)
    }

    /// Update only the status of a reservation, inside the caller's
    /// transaction
    pub async fn set_status_tx(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: ReservationStatus,
    ) -> Result<Reservation> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE reservations
            SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {RESERVATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_one(&mut **tx)
        .await?;

        map_row(&row)
    }

    /// Record an approval decision inside the caller's transaction: status
    /// plus the approval audit columns
    pub async fn set_approval(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        status: ReservationStatus,
        approved_by: Uuid,
        rejection_reason: Option<&str>,
    ) -> Result<Reservation> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE reservations
            SET status = $2,
                approved_by = $3,
                approved_at = now(),
                rejection_reason = $4,
                updated_at = now()
            WHERE id = $1
            RETURNING {RESERVATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(status.as_str())
        .bind(approved_by)
        .bind(rejection_reason)
        .fetch_one(&mut **tx)
        .await?;

        map_row(&row)
    }

    /// Rewrite the slot fields of a reservation inside the caller's
    /// transaction
    pub async fn update_slot(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        new: &NewReservation,
        kind: ReservationKind,
        status: ReservationStatus,
    ) -> Result<Reservation> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE reservations
            SET date = $2,
                start_time = $3,
                end_time = $4,
                notes = $5,
                kind = $6,
                status = $7,
                updated_at = now()
            WHERE id = $1
            RETURNING {RESERVATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(new.date)
        .bind(new.start_time)
        .bind(new.end_time)
        .bind(&new.notes)
        .bind(kind.as_str())
        .bind(status.as_str())
        .fetch_one(&mut **tx)
        .await?;

        map_row(&row)
    }

    /// Reassign a reservation to a new owner inside the caller's transaction
    pub async fn set_owner(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        new_owner: Uuid,
    ) -> Result<Reservation> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE reservations
            SET user_id = $2, updated_at = now()
            WHERE id = $1
            RETURNING {RESERVATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(new_owner)
        .fetch_one(&mut **tx)
        .await?;

        map_row(&row)
    }

    /// Active reservations whose date has already passed
    pub async fn list_past_active(&self, today: NaiveDate) -> Result<Vec<Reservation>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RESERVATION_COLUMNS}
            FROM reservations
            WHERE date < $1 AND status IN ('PENDING', 'CONFIRMED')
            ORDER BY date, start_time
            "#
        ))
        .bind(today)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row).collect()
    }

    /// Begin a transaction on the underlying pool
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }
}
