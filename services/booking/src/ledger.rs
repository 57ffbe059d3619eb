//! Reservation ledger: the transactional core of the booking service
//!
//! Every state-changing operation runs its checks, writes the reservation
//! tables, and appends to the audit log. Slot creation and trade
//! acceptance run inside a single transaction with row locks so that
//! concurrent requests cannot double-book a slot or swap a reservation
//! twice.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::calendar::{self, Slot};
use crate::error::{ApiError, ApiResult};
use crate::models::{
    AuditAction, NewReservation, NewTrade, Reservation, ReservationStatus, TradeRequest,
    TradeStatus, User,
};
use crate::notifier::Notifier;
use crate::repositories::{
    AuditRepository, ReservationRepository, SettingsRepository, TradeRepository, UserRepository,
};

/// One calendar day with its computed slots
#[derive(Debug, Serialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

/// Reservation ledger service
#[derive(Clone)]
pub struct ReservationLedger {
    reservations: ReservationRepository,
    users: UserRepository,
    settings: SettingsRepository,
    trades: TradeRepository,
    audit: AuditRepository,
    notifier: Arc<dyn Notifier>,
}

impl ReservationLedger {
    pub fn new(
        reservations: ReservationRepository,
        users: UserRepository,
        settings: SettingsRepository,
        trades: TradeRepository,
        audit: AuditRepository,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            reservations,
            users,
            settings,
            trades,
            audit,
            notifier,
        }
    }

    /// Find a reservation by id
    pub async fn find(&self, id: Uuid) -> ApiResult<Option<Reservation>> {
        Ok(self.reservations.find_by_id(id).await?)
    }

    /// List reservations with optional owner, date, and status filters
    pub async fn list(
        &self,
        owner: Option<Uuid>,
        date: Option<NaiveDate>,
        status: Option<ReservationStatus>,
    ) -> ApiResult<Vec<Reservation>> {
        Ok(self.reservations.list(owner, date, status).await?)
    }

    /// Book a slot for a user
    ///
    /// Validation runs before any write. The overlap check happens inside
    /// the transaction while holding locks on the date's active rows, so
    /// two concurrent requests for the same slot cannot both commit.
    pub async fn create(
        &self,
        user: &User,
        new: NewReservation,
        today: NaiveDate,
    ) -> ApiResult<Reservation> {
        let config = self.settings.calendar_config().await?;
        calendar::validate_slot(new.date, new.start_time, new.end_time, &config, today)?;

        let windows = self.settings.active_windows().await?;
        let kind = calendar::classify_slot(new.date, new.start_time, new.end_time, &windows);
        let status = kind.initial_status();

        let mut tx = self.reservations.begin().await?;

        let occupied = self
            .reservations
            .lock_active_on_date(&mut tx, new.date)
            .await?;
        if calendar::overlaps(new.start_time, new.end_time, &occupied, None) {
            return Err(ApiError::SlotOverlap);
        }

        let reservation = self
            .reservations
            .insert(&mut tx, user.id, &new, kind, status)
            .await?;
        self.audit
            .append_tx(
                &mut tx,
                reservation.id,
                AuditAction::Created,
                user.id,
                json!({
                    "date": reservation.date,
                    "start_time": reservation.start_time,
                    "end_time": reservation.end_time,
                    "kind": reservation.kind,
                    "status": reservation.status,
                }),
            )
            .await?;

        tx.commit().await?;

        let (subject, body) = match status {
            ReservationStatus::Pending => (
                "Reservation pending approval",
                "Your primetime reservation is awaiting admin approval.",
            ),
            _ => ("Reservation confirmed", "Your reservation is confirmed."),
        };
        self.notifier
            .notify(
                &user.email,
                subject,
                body,
                &json!({ "reservation_id": reservation.id }),
            )
            .await;

        Ok(reservation)
    }

    /// Move an editable reservation to a different slot
    ///
    /// Runs the same validation and locked overlap re-check as `create`,
    /// excluding the edited row from the conflict test. The kind is
    /// re-derived for the new slot, so moving into a primetime window puts
    /// the reservation back into pending approval.
    pub async fn update(
        &self,
        actor: &User,
        reservation_id: Uuid,
        new: NewReservation,
        today: NaiveDate,
    ) -> ApiResult<Reservation> {
        let reservation = self
            .reservations
            .find_by_id(reservation_id)
            .await?
            .ok_or(ApiError::NotFound)?;
        if reservation.user_id != actor.id && !actor.role.is_admin() {
            return Err(ApiError::Forbidden);
        }
        if !reservation.is_editable(today) {
            return Err(ApiError::NotEditable);
        }

        let config = self.settings.calendar_config().await?;
        calendar::validate_slot(new.date, new.start_time, new.end_time, &config, today)?;

        let windows = self.settings.active_windows().await?;
        let kind = calendar::classify_slot(new.date, new.start_time, new.end_time, &windows);
        let status = kind.initial_status();

        let mut tx = self.reservations.begin().await?;

        let occupied = self
            .reservations
            .lock_active_on_date(&mut tx, new.date)
            .await?;
        if calendar::overlaps(
            new.start_time,
            new.end_time,
            &occupied,
            Some(reservation_id),
        ) {
            return Err(ApiError::SlotOverlap);
        }

        let updated = self
            .reservations
            .update_slot(&mut tx, reservation_id, &new, kind, status)
            .await?;
        self.audit
            .append_tx(
                &mut tx,
                reservation_id,
                AuditAction::Updated,
                actor.id,
                json!({
                    "previous": {
                        "date": reservation.date,
                        "start_time": reservation.start_time,
                        "end_time": reservation.end_time,
                        "status": reservation.status,
                    },
                    "date": updated.date,
                    "start_time": updated.start_time,
                    "end_time": updated.end_time,
                    "kind": updated.kind,
                    "status": updated.status,
                }),
            )
            .await?;

        tx.commit().await?;

        self.notify_owner(
            updated.user_id,
            "Reservation updated",
            "Your reservation has been moved to a new slot.",
            reservation_id,
        )
        .await;

        Ok(updated)
    }

    /// Approve or reject a pending primetime reservation
    pub async fn approve(
        &self,
        admin: &User,
        reservation_id: Uuid,
        approve: bool,
        rejection_reason: Option<&str>,
    ) -> ApiResult<Reservation> {
        if !admin.role.is_admin() {
            return Err(ApiError::Forbidden);
        }

        let reservation = self
            .reservations
            .find_by_id(reservation_id)
            .await?
            .ok_or(ApiError::NotFound)?;
        if reservation.status != ReservationStatus::Pending {
            return Err(ApiError::Validation(
                "Only pending reservations can be approved or rejected".to_string(),
            ));
        }

        let reason = rejection_reason.map(str::trim).filter(|r| !r.is_empty());
        let (status, action) = if approve {
            (ReservationStatus::Confirmed, AuditAction::Approved)
        } else {
            if reason.is_none() {
                return Err(ApiError::Validation(
                    "A rejection reason is required".to_string(),
                ));
            }
            (ReservationStatus::Rejected, AuditAction::Rejected)
        };

        // Status change and audit entry commit together
        let mut tx = self.reservations.begin().await?;
        let updated = self
            .reservations
            .set_approval(&mut tx, reservation_id, status, admin.id, reason)
            .await?;
        self.audit
            .append_tx(
                &mut tx,
                reservation_id,
                action,
                admin.id,
                json!({
                    "status": updated.status,
                    "rejection_reason": updated.rejection_reason,
                }),
            )
            .await?;
        tx.commit().await?;

        let (subject, body) = if approve {
            (
                "Reservation approved".to_string(),
                "Your primetime reservation has been approved.".to_string(),
            )
        } else {
            (
                "Reservation rejected".to_string(),
                format!(
                    "Your primetime reservation was rejected: {}",
                    updated.rejection_reason.as_deref().unwrap_or("")
                ),
            )
        };
        self.notify_owner(updated.user_id, &subject, &body, reservation_id)
            .await;

        Ok(updated)
    }

    /// Cancel a reservation, by its owner or an admin
    pub async fn cancel(
        &self,
        actor: &User,
        reservation_id: Uuid,
        today: NaiveDate,
    ) -> ApiResult<Reservation> {
        let reservation = self
            .reservations
            .find_by_id(reservation_id)
            .await?
            .ok_or(ApiError::NotFound)?;
        if reservation.user_id != actor.id && !actor.role.is_admin() {
            return Err(ApiError::Forbidden);
        }
        if !reservation.is_editable(today) {
            return Err(ApiError::NotEditable);
        }

        // Status change and audit entry commit together
        let mut tx = self.reservations.begin().await?;
        let updated = self
            .reservations
            .set_status_tx(&mut tx, reservation_id, ReservationStatus::Cancelled)
            .await?;
        self.audit
            .append_tx(
                &mut tx,
                reservation_id,
                AuditAction::Cancelled,
                actor.id,
                json!({ "previous_status": reservation.status }),
            )
            .await?;
        tx.commit().await?;

        self.notify_owner(
            updated.user_id,
            "Reservation cancelled",
            "Your reservation has been cancelled.",
            reservation_id,
        )
        .await;

        Ok(updated)
    }

    /// Propose a peer-to-peer trade between two confirmed reservations
    pub async fn propose_trade(
        &self,
        requester: &User,
        new: NewTrade,
        today: NaiveDate,
    ) -> ApiResult<TradeRequest> {
        let offered = self
            .reservations
            .find_by_id(new.requester_reservation_id)
            .await?
            .ok_or(ApiError::NotFound)?;
        let wanted = self
            .reservations
            .find_by_id(new.target_reservation_id)
            .await?
            .ok_or(ApiError::NotFound)?;

        if offered.user_id != requester.id {
            return Err(ApiError::Forbidden);
        }
        if wanted.user_id == requester.id {
            return Err(ApiError::NotTradeable);
        }
        if !offered.can_be_traded(today, requester.role) {
            return Err(ApiError::NotTradeable);
        }

        let target_owner = self
            .users
            .find_by_id(wanted.user_id)
            .await?
            .ok_or(ApiError::NotFound)?;
        if !wanted.can_be_traded(today, target_owner.role) {
            return Err(ApiError::NotTradeable);
        }

        let trade = self
            .trades
            .insert(
                requester.id,
                target_owner.id,
                offered.id,
                wanted.id,
                &new.message,
            )
            .await?;

        self.notifier
            .notify(
                &target_owner.email,
                "Trade request received",
                "Another user wants to trade reservations with you.",
                &json!({ "trade_id": trade.id }),
            )
            .await;

        Ok(trade)
    }

    /// Accept or reject a pending trade request
    ///
    /// Acceptance swaps ownership of the two reservations atomically and
    /// appends a trade audit entry for each side.
    pub async fn respond_trade(
        &self,
        actor: &User,
        trade_id: Uuid,
        accept: bool,
        response_message: Option<&str>,
        today: NaiveDate,
    ) -> ApiResult<TradeRequest> {
        let trade = self
            .trades
            .find_by_id(trade_id)
            .await?
            .ok_or(ApiError::NotFound)?;
        if trade.status != TradeStatus::Pending {
            return Err(ApiError::NotFound);
        }
        if trade.target_user_id != actor.id {
            return Err(ApiError::Forbidden);
        }

        if !accept {
            let mut tx = self.reservations.begin().await?;
            let updated = self
                .trades
                .set_response(&mut tx, trade_id, TradeStatus::Rejected, response_message)
                .await?
                .ok_or(ApiError::NotFound)?;
            tx.commit().await?;

            self.notify_owner(
                trade.requester_id,
                "Trade request rejected",
                "Your trade request was rejected.",
                trade.requester_reservation_id,
            )
            .await;

            return Ok(updated);
        }

        let offered = self
            .reservations
            .find_by_id(trade.requester_reservation_id)
            .await?
            .ok_or(ApiError::NotFound)?;
        let wanted = self
            .reservations
            .find_by_id(trade.target_reservation_id)
            .await?
            .ok_or(ApiError::NotFound)?;

        let requester = self
            .users
            .find_by_id(trade.requester_id)
            .await?
            .ok_or(ApiError::NotFound)?;
        if !offered.can_be_traded(today, requester.role)
            || !wanted.can_be_traded(today, actor.role)
        {
            return Err(ApiError::NotTradeable);
        }

        let mut tx = self.reservations.begin().await?;

        // Claiming the trade row first serializes racing responders; a
        // loser finds the trade no longer pending and rolls back
        let updated = self
            .trades
            .set_response(&mut tx, trade_id, TradeStatus::Accepted, response_message)
            .await?
            .ok_or(ApiError::NotFound)?;

        self.reservations
            .set_owner(&mut tx, offered.id, actor.id)
            .await?;
        self.reservations
            .set_owner(&mut tx, wanted.id, requester.id)
            .await?;

        let details = json!({
            "trade_id": trade_id,
            "requester_reservation_id": offered.id,
            "target_reservation_id": wanted.id,
        });
        self.audit
            .append_tx(&mut tx, offered.id, AuditAction::Traded, actor.id, details.clone())
            .await?;
        self.audit
            .append_tx(&mut tx, wanted.id, AuditAction::Traded, actor.id, details)
            .await?;

        tx.commit().await?;

        self.notifier
            .notify(
                &requester.email,
                "Trade request accepted",
                "Your trade request was accepted. Reservations have been swapped.",
                &json!({ "trade_id": trade_id }),
            )
            .await;

        Ok(updated)
    }

    /// Trades the user participates in
    pub async fn trades_for_user(&self, user_id: Uuid) -> ApiResult<Vec<TradeRequest>> {
        Ok(self.trades.list_for_user(user_id).await?)
    }

    /// Mark past pending and confirmed reservations as completed
    ///
    /// Runs from the scheduler. Per-row failures are logged and skipped so
    /// one bad row does not stall the sweep; the audit append is best
    /// effort for the same reason. Returns the number of rows updated.
    pub async fn sweep_past_to_completed(&self, today: NaiveDate) -> anyhow::Result<u64> {
        let past = self.reservations.list_past_active(today).await?;
        let mut completed = 0u64;

        for reservation in past {
            match self
                .reservations
                .set_status(reservation.id, ReservationStatus::Completed)
                .await
            {
                Ok(_) => {
                    completed += 1;
                    // Nil uuid marks the scheduler as the actor
                    if let Err(e) = self
                        .audit
                        .append(
                            reservation.id,
                            AuditAction::Completed,
                            Uuid::nil(),
                            json!({ "previous_status": reservation.status }),
                        )
                        .await
                    {
                        warn!(reservation_id = %reservation.id, "audit append failed during sweep: {}", e);
                    }
                }
                Err(e) => {
                    warn!(reservation_id = %reservation.id, "failed to complete past reservation: {}", e);
                }
            }
        }

        Ok(completed)
    }

    /// Compute the slot grid for each day in `[start, end]`
    pub async fn calendar_view(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApiResult<Vec<DaySummary>> {
        if end < start {
            return Err(ApiError::Validation(
                "End date must not precede start date".to_string(),
            ));
        }

        let config = self.settings.calendar_config().await?;
        let windows = self.settings.active_windows().await?;

        let mut days = Vec::new();
        let mut date = start;
        while date <= end {
            let reserved = self.reservations.active_on_date(date).await?;
            let slots = calendar::available_slots(date, &config, &windows, &reserved).collect();
            days.push(DaySummary { date, slots });
            date += Duration::days(1);
        }

        Ok(days)
    }

    async fn notify_owner(&self, user_id: Uuid, subject: &str, body: &str, reservation_id: Uuid) {
        match self.users.find_by_id(user_id).await {
            Ok(Some(owner)) => {
                self.notifier
                    .notify(
                        &owner.email,
                        subject,
                        body,
                        &json!({ "reservation_id": reservation_id }),
                    )
                    .await;
            }
            Ok(None) => {
                warn!(%user_id, "notification skipped, user not found");
            }
            Err(e) => {
                warn!(%user_id, "notification skipped, user lookup failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PrimeTimeWindow, UserRole};
    use crate::notifier::LogNotifier;
    use chrono::{NaiveTime, Utc};
    use serial_test::serial;
    use sqlx::PgPool;

    // These tests run against a real database and are skipped when no
    // DATABASE_URL is provided. The schema is created on the fly so a
    // scratch database works.

    const SCHEMA: &[&str] = &[
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id UUID PRIMARY KEY,
            email TEXT NOT NULL,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            role TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS reservations (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            user_id UUID NOT NULL,
            date DATE NOT NULL,
            start_time TIME NOT NULL,
            end_time TIME NOT NULL,
            status TEXT NOT NULL,
            kind TEXT NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            approved_by UUID,
            approved_at TIMESTAMPTZ,
            rejection_reason TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS reservation_audit_log (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            reservation_id UUID NOT NULL,
            action TEXT NOT NULL,
            performed_by UUID NOT NULL,
            details JSONB NOT NULL DEFAULT '{}',
            timestamp TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS trade_requests (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            requester_id UUID NOT NULL,
            target_user_id UUID NOT NULL,
            requester_reservation_id UUID NOT NULL,
            target_reservation_id UUID NOT NULL,
            status TEXT NOT NULL,
            message TEXT NOT NULL DEFAULT '',
            response_message TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            responded_at TIMESTAMPTZ
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS calendar_settings (
            id INT PRIMARY KEY,
            business_start_time TIME NOT NULL,
            business_end_time TIME NOT NULL,
            slot_duration_minutes INT NOT NULL,
            max_advance_booking_days INT NOT NULL,
            allow_same_day_booking BOOLEAN NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS primetime_windows (
            weekday SMALLINT PRIMARY KEY,
            start_time TIME NOT NULL,
            end_time TIME NOT NULL,
            is_active BOOLEAN NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    ];

    const TABLES: &[&str] = &[
        "reservation_audit_log",
        "trade_requests",
        "reservations",
        "users",
        "primetime_windows",
        "calendar_settings",
    ];

    struct TestEnv {
        ledger: ReservationLedger,
        reservations: ReservationRepository,
        trades: TradeRepository,
        audit: AuditRepository,
        settings: SettingsRepository,
        pool: PgPool,
    }

    async fn test_env() -> Option<TestEnv> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let pool = PgPool::connect(&url).await.ok()?;

        for ddl in SCHEMA {
            sqlx::query(ddl).execute(&pool).await.ok()?;
        }
        for table in TABLES {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&pool)
                .await
                .ok()?;
        }

        let reservations = ReservationRepository::new(pool.clone());
        let users = UserRepository::new(pool.clone());
        let settings = SettingsRepository::new(pool.clone());
        let trades = TradeRepository::new(pool.clone());
        let audit = AuditRepository::new(pool.clone());
        let ledger = ReservationLedger::new(
            reservations.clone(),
            users,
            settings.clone(),
            trades.clone(),
            audit.clone(),
            Arc::new(LogNotifier),
        );

        Some(TestEnv {
            ledger,
            reservations,
            trades,
            audit,
            settings,
            pool,
        })
    }

    async fn insert_user(pool: &PgPool, email: &str, role: UserRole) -> User {
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            role,
        };
        sqlx::query("INSERT INTO users (id, email, first_name, last_name, role) VALUES ($1, $2, $3, $4, $5)")
            .bind(user.id)
            .bind(&user.email)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.role.as_str())
            .execute(pool)
            .await
            .unwrap();
        user
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn slot(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> NewReservation {
        NewReservation {
            date,
            start_time: start,
            end_time: end,
            notes: String::new(),
        }
    }

    #[tokio::test]
    #[serial]
    async fn approval_commits_status_and_audit_together() {
        let Some(env) = test_env().await else {
            eprintln!("DATABASE_URL not set, skipping ledger database test");
            return;
        };
        let today = Utc::now().date_naive();
        let tomorrow = today.succ_opt().unwrap();

        let admin = insert_user(&env.pool, "admin@example.com", UserRole::Admin).await;
        let alice = insert_user(&env.pool, "alice@example.com", UserRole::User).await;

        env.settings
            .upsert_window(&PrimeTimeWindow {
                weekday: calendar::weekday_index(tomorrow),
                start_time: t(12, 0),
                end_time: t(14, 0),
                is_active: true,
            })
            .await
            .unwrap();

        let pending = env
            .ledger
            .create(&alice, slot(tomorrow, t(12, 30), t(13, 30)), today)
            .await
            .unwrap();
        assert_eq!(pending.status, ReservationStatus::Pending);

        // Rejecting without a reason changes nothing
        let err = env
            .ledger
            .approve(&admin, pending.id, false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let approved = env
            .ledger
            .approve(&admin, pending.id, true, None)
            .await
            .unwrap();
        assert_eq!(approved.status, ReservationStatus::Confirmed);
        assert_eq!(approved.approved_by, Some(admin.id));

        let entries = env.audit.list_for_reservation(pending.id).await.unwrap();
        let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["CREATED", "APPROVED"]);
    }

    #[tokio::test]
    #[serial]
    async fn cancel_commits_status_and_audit_together() {
        let Some(env) = test_env().await else {
            eprintln!("DATABASE_URL not set, skipping ledger database test");
            return;
        };
        let today = Utc::now().date_naive();
        let tomorrow = today.succ_opt().unwrap();

        let alice = insert_user(&env.pool, "alice@example.com", UserRole::User).await;
        let reservation = env
            .ledger
            .create(&alice, slot(tomorrow, t(10, 0), t(11, 0)), today)
            .await
            .unwrap();

        let cancelled = env
            .ledger
            .cancel(&alice, reservation.id, today)
            .await
            .unwrap();
        assert_eq!(cancelled.status, ReservationStatus::Cancelled);

        let entries = env.audit.list_for_reservation(reservation.id).await.unwrap();
        let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["CREATED", "CANCELLED"]);
    }

    #[tokio::test]
    #[serial]
    async fn trade_accept_swaps_owners_exactly_once() {
        let Some(env) = test_env().await else {
            eprintln!("DATABASE_URL not set, skipping ledger database test");
            return;
        };
        let today = Utc::now().date_naive();
        let tomorrow = today.succ_opt().unwrap();

        let alice = insert_user(&env.pool, "alice@example.com", UserRole::User).await;
        let bob = insert_user(&env.pool, "bob@example.com", UserRole::User).await;

        let a = env
            .ledger
            .create(&alice, slot(tomorrow, t(10, 0), t(11, 0)), today)
            .await
            .unwrap();
        let b = env
            .ledger
            .create(&bob, slot(tomorrow, t(14, 0), t(15, 0)), today)
            .await
            .unwrap();

        let trade = env
            .ledger
            .propose_trade(
                &alice,
                NewTrade {
                    requester_reservation_id: a.id,
                    target_reservation_id: b.id,
                    message: String::new(),
                },
                today,
            )
            .await
            .unwrap();

        let accepted = env
            .ledger
            .respond_trade(&bob, trade.id, true, None, today)
            .await
            .unwrap();
        assert_eq!(accepted.status, TradeStatus::Accepted);

        let a_after = env.reservations.find_by_id(a.id).await.unwrap().unwrap();
        let b_after = env.reservations.find_by_id(b.id).await.unwrap().unwrap();
        assert_eq!(a_after.user_id, bob.id);
        assert_eq!(b_after.user_id, alice.id);

        // A second accept finds no pending trade and changes nothing
        let err = env
            .ledger
            .respond_trade(&bob, trade.id, true, None, today)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound));

        let a_final = env.reservations.find_by_id(a.id).await.unwrap().unwrap();
        assert_eq!(a_final.user_id, bob.id);
    }

    #[tokio::test]
    #[serial]
    async fn trade_response_only_matches_pending_rows() {
        let Some(env) = test_env().await else {
            eprintln!("DATABASE_URL not set, skipping ledger database test");
            return;
        };
        let today = Utc::now().date_naive();
        let tomorrow = today.succ_opt().unwrap();

        let alice = insert_user(&env.pool, "alice@example.com", UserRole::User).await;
        let bob = insert_user(&env.pool, "bob@example.com", UserRole::User).await;
        let a = env
            .ledger
            .create(&alice, slot(tomorrow, t(10, 0), t(11, 0)), today)
            .await
            .unwrap();
        let b = env
            .ledger
            .create(&bob, slot(tomorrow, t(14, 0), t(15, 0)), today)
            .await
            .unwrap();
        let trade = env
            .ledger
            .propose_trade(
                &alice,
                NewTrade {
                    requester_reservation_id: a.id,
                    target_reservation_id: b.id,
                    message: String::new(),
                },
                today,
            )
            .await
            .unwrap();

        let mut tx = env.reservations.begin().await.unwrap();
        let first = env
            .trades
            .set_response(&mut tx, trade.id, TradeStatus::Accepted, None)
            .await
            .unwrap();
        assert!(first.is_some());
        tx.commit().await.unwrap();

        // The row is no longer pending, so a late response matches nothing
        let mut tx = env.reservations.begin().await.unwrap();
        let second = env
            .trades
            .set_response(&mut tx, trade.id, TradeStatus::Rejected, None)
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    #[serial]
    async fn editing_rechecks_conflicts_excluding_the_edited_row() {
        let Some(env) = test_env().await else {
            eprintln!("DATABASE_URL not set, skipping ledger database test");
            return;
        };
        let today = Utc::now().date_naive();
        let tomorrow = today.succ_opt().unwrap();

        let alice = insert_user(&env.pool, "alice@example.com", UserRole::User).await;
        let a = env
            .ledger
            .create(&alice, slot(tomorrow, t(10, 0), t(11, 0)), today)
            .await
            .unwrap();
        env.ledger
            .create(&alice, slot(tomorrow, t(14, 0), t(15, 0)), today)
            .await
            .unwrap();

        // Sliding within the reservation's own interval is allowed
        let moved = env
            .ledger
            .update(&alice, a.id, slot(tomorrow, t(10, 30), t(11, 30)), today)
            .await
            .unwrap();
        assert_eq!(moved.start_time, t(10, 30));

        let entries = env.audit.list_for_reservation(a.id).await.unwrap();
        let actions: Vec<&str> = entries.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["CREATED", "UPDATED"]);

        // Moving onto another active reservation is still a conflict
        let err = env
            .ledger
            .update(&alice, a.id, slot(tomorrow, t(14, 30), t(15, 30)), today)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::SlotOverlap));
    }

    #[tokio::test]
    #[serial]
    async fn trading_with_yourself_is_not_tradeable() {
        let Some(env) = test_env().await else {
            eprintln!("DATABASE_URL not set, skipping ledger database test");
            return;
        };
        let today = Utc::now().date_naive();
        let tomorrow = today.succ_opt().unwrap();

        let alice = insert_user(&env.pool, "alice@example.com", UserRole::User).await;
        let a = env
            .ledger
            .create(&alice, slot(tomorrow, t(10, 0), t(11, 0)), today)
            .await
            .unwrap();
        let b = env
            .ledger
            .create(&alice, slot(tomorrow, t(14, 0), t(15, 0)), today)
            .await
            .unwrap();

        let err = env
            .ledger
            .propose_trade(
                &alice,
                NewTrade {
                    requester_reservation_id: a.id,
                    target_reservation_id: b.id,
                    message: String::new(),
                },
                today,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotTradeable));
    }
}
