//! Trade request model for peer-to-peer slot swaps

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Trade request status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    Pending,
    Accepted,
    Rejected,
    Cancelled,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Pending => "PENDING",
            TradeStatus::Accepted => "ACCEPTED",
            TradeStatus::Rejected => "REJECTED",
            TradeStatus::Cancelled => "CANCELLED",
        }
    }
}

impl FromStr for TradeStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(TradeStatus::Pending),
            "ACCEPTED" => Ok(TradeStatus::Accepted),
            "REJECTED" => Ok(TradeStatus::Rejected),
            "CANCELLED" => Ok(TradeStatus::Cancelled),
            other => Err(anyhow::anyhow!("unknown trade status: {}", other)),
        }
    }
}

/// New trade request payload
#[derive(Debug, Clone, Deserialize)]
pub struct NewTrade {
    pub requester_reservation_id: Uuid,
    pub target_reservation_id: Uuid,
    #[serde(default)]
    pub message: String,
}

/// Trade request entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRequest {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub target_user_id: Uuid,
    pub requester_reservation_id: Uuid,
    pub target_reservation_id: Uuid,
    pub status: TradeStatus,
    pub message: String,
    pub response_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}
