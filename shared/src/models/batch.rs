//! Drying / fermentation batch models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Batch status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    InProgress,
    Completed,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::InProgress => "in_progress",
            BatchStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "in_progress" => Some(BatchStatus::InProgress),
            "completed" => Some(BatchStatus::Completed),
            _ => None,
        }
    }
}

/// Receptions blended for shared drying or fermentation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    pub total_wet_weight: Decimal,
    pub total_dried_weight: Option<Decimal>,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One reception's contribution to a batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchMembership {
    pub batch_id: Uuid,
    pub reception_id: Uuid,
    pub wet_weight_contribution: Decimal,
    pub proportional_dried_weight: Option<Decimal>,
}
