//! Append-only audit log for reservation state changes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Action recorded by an audit log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Created,
    Updated,
    Approved,
    Rejected,
    Cancelled,
    Traded,
    Completed,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Created => "CREATED",
            AuditAction::Updated => "UPDATED",
            AuditAction::Approved => "APPROVED",
            AuditAction::Rejected => "REJECTED",
            AuditAction::Cancelled => "CANCELLED",
            AuditAction::Traded => "TRADED",
            AuditAction::Completed => "COMPLETED",
        }
    }
}

/// Immutable audit record appended on every state-changing operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub action: String,
    pub performed_by: Uuid,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}
