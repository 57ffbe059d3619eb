//! Reservation model and related functionality

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::user::UserRole;

/// Reservation lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Rejected,
    Cancelled,
    Completed,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::Rejected => "REJECTED",
            ReservationStatus::Cancelled => "CANCELLED",
            ReservationStatus::Completed => "COMPLETED",
        }
    }
}

impl FromStr for ReservationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(ReservationStatus::Pending),
            "CONFIRMED" => Ok(ReservationStatus::Confirmed),
            "REJECTED" => Ok(ReservationStatus::Rejected),
            "CANCELLED" => Ok(ReservationStatus::Cancelled),
            "COMPLETED" => Ok(ReservationStatus::Completed),
            other => Err(anyhow::anyhow!("unknown reservation status: {}", other)),
        }
    }
}

/// Whether a slot falls inside an admin-configured primetime window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationKind {
    FreeForAll,
    Primetime,
}

impl ReservationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationKind::FreeForAll => "FREE_FOR_ALL",
            ReservationKind::Primetime => "PRIMETIME",
        }
    }

    /// Initial status derived from the kind: free-for-all slots are
    /// auto-confirmed, primetime slots await admin approval
    pub fn initial_status(&self) -> ReservationStatus {
        match self {
            ReservationKind::FreeForAll => ReservationStatus::Confirmed,
            ReservationKind::Primetime => ReservationStatus::Pending,
        }
    }
}

impl FromStr for ReservationKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "FREE_FOR_ALL" => Ok(ReservationKind::FreeForAll),
            "PRIMETIME" => Ok(ReservationKind::Primetime),
            other => Err(anyhow::anyhow!("unknown reservation kind: {}", other)),
        }
    }
}

/// Reservation entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: ReservationStatus,
    pub kind: ReservationKind,
    pub notes: String,
    pub approved_by: Option<Uuid>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// A reservation can be edited or cancelled while still active and not
    /// in the past
    pub fn is_editable(&self, today: NaiveDate) -> bool {
        matches!(
            self.status,
            ReservationStatus::Pending | ReservationStatus::Confirmed
        ) && self.date >= today
    }

    /// A reservation can be traded while confirmed, not in the past, and
    /// owned by a basic user
    pub fn can_be_traded(&self, today: NaiveDate, owner_role: UserRole) -> bool {
        self.status == ReservationStatus::Confirmed
            && self.date >= today
            && owner_role == UserRole::User
    }
}

/// New reservation payload
#[derive(Debug, Clone, Deserialize)]
pub struct NewReservation {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub notes: String,
}
