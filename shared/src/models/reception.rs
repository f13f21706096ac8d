//! Reception models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::threshold::QualityMetric;

/// A fruit reception and its reconciled weights (kg)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reception {
    pub id: Uuid,
    pub commodity_type: String,
    pub original_weight: Decimal,
    /// Total deduction: quality discount plus net lab sample loss
    pub discount_weight: Decimal,
    pub final_weight: Decimal,
    pub lab_sample_wet_weight: Decimal,
    pub lab_sample_dried_weight: Decimal,
    /// Cumulative dried weight across all completed batches
    pub dried_weight: Decimal,
    /// Raw deduction above the original weight that was clamped away, if any
    pub deduction_overflow: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Weight deducted for one metric.
///
/// Derived data: the full set for a reception is replaced on every
/// reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscountBreakdownLine {
    pub metric: QualityMetric,
    pub metric_label: String,
    pub threshold_value: Decimal,
    pub measured_value: Decimal,
    /// Excess percentage over the threshold
    pub percent_applied: Decimal,
    pub weight_deducted: Decimal,
}
