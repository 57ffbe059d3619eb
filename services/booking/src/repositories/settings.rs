//! Calendar settings and primetime window persistence

use anyhow::Result;
use sqlx::{PgPool, Row};

use crate::models::{CalendarConfig, PrimeTimeWindow};

/// Settings repository
#[derive(Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    /// Create a new settings repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Load the calendar configuration, falling back to defaults when the
    /// singleton row has not been created yet
    pub async fn calendar_config(&self) -> Result<CalendarConfig> {
        let row = sqlx::query(
            r#"
            SELECT business_start_time, business_end_time, slot_duration_minutes,
                   max_advance_booking_days, allow_same_day_booking
            FROM calendar_settings
            WHERE id = 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(CalendarConfig {
                business_start_time: row.get("business_start_time"),
                business_end_time: row.get("business_end_time"),
                slot_duration_minutes: row.get("slot_duration_minutes"),
                max_advance_booking_days: row.get("max_advance_booking_days"),
                allow_same_day_booking: row.get("allow_same_day_booking"),
            }),
            None => Ok(CalendarConfig::default()),
        }
    }

    /// Replace the calendar configuration singleton
    pub async fn upsert_calendar_config(&self, config: &CalendarConfig) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO calendar_settings
                (id, business_start_time, business_end_time, slot_duration_minutes,
                 max_advance_booking_days, allow_same_day_booking, updated_at)
            VALUES (1, $1, $2, $3, $4, $5, now())
            ON CONFLICT (id) DO UPDATE SET
                business_start_time = EXCLUDED.business_start_time,
                business_end_time = EXCLUDED.business_end_time,
                slot_duration_minutes = EXCLUDED.slot_duration_minutes,
                max_advance_booking_days = EXCLUDED.max_advance_booking_days,
                allow_same_day_booking = EXCLUDED.allow_same_day_booking,
                updated_at = now()
            "#,
        )
        .bind(config.business_start_time)
        .bind(config.business_end_time)
        .bind(config.slot_duration_minutes)
        .bind(config.max_advance_booking_days)
        .bind(config.allow_same_day_booking)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// All primetime windows ordered by weekday
    pub async fn windows(&self) -> Result<Vec<PrimeTimeWindow>> {
        let rows = sqlx::query(
            r#"
            SELECT weekday, start_time, end_time, is_active
            FROM primetime_windows
            ORDER BY weekday
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| PrimeTimeWindow {
                weekday: row.get("weekday"),
                start_time: row.get("start_time"),
                end_time: row.get("end_time"),
                is_active: row.get("is_active"),
            })
            .collect())
    }

    /// Only the windows that currently apply to classification
    pub async fn active_windows(&self) -> Result<Vec<PrimeTimeWindow>> {
        let all = self.windows().await?;
        Ok(all.into_iter().filter(|w| w.is_active).collect())
    }

    /// Create or replace the window for a weekday, one window per weekday
    pub async fn upsert_window(&self, window: &PrimeTimeWindow) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO primetime_windows (weekday, start_time, end_time, is_active, updated_at)
            VALUES ($1, $2, $3, $4, now())
            ON CONFLICT (weekday) DO UPDATE SET
                start_time = EXCLUDED.start_time,
                end_time = EXCLUDED.end_time,
                is_active = EXCLUDED.is_active,
                updated_at = now()
            "#,
        )
        .bind(window.weekday)
        .bind(window.start_time)
        .bind(window.end_time)
        .bind(window.is_active)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
