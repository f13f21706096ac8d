//! Quality discount calculator
//!
//! Converts measured quality defects into a weight deduction against a
//! threshold schedule. Pure: no I/O, no logging.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::models::{DiscountBreakdownLine, QualityMeasurement, QualityMetric, ThresholdRule};
use crate::types::{checked_sum, hundred, round_weight};

/// Result of a discount computation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscountResult {
    /// Sum of excesses, capped at 100
    pub combined_percent: Decimal,
    pub discount_weight: Decimal,
    pub final_weight: Decimal,
    pub breakdown: Vec<DiscountBreakdownLine>,
}

impl DiscountResult {
    /// No discount at all: the whole weight is kept
    pub fn none(total_weight: Decimal) -> Self {
        DiscountResult {
            combined_percent: Decimal::ZERO,
            discount_weight: Decimal::ZERO,
            final_weight: round_weight(total_weight),
            breakdown: Vec::new(),
        }
    }
}

/// Compute the weight discount for a reception.
///
/// Excess percentages of distinct metrics add up and the sum is capped at
/// 100%. The discount is split across the contributing metrics in proportion
/// to their excess, and the breakdown sums exactly to `discount_weight`.
pub fn compute_discount(
    total_weight: Decimal,
    thresholds: &[ThresholdRule],
    measured: &QualityMeasurement,
) -> EngineResult<DiscountResult> {
    if total_weight <= Decimal::ZERO {
        return Err(EngineError::invalid(
            "total_weight",
            format!("must be positive, got {}", total_weight),
        ));
    }

    // One enabled rule per metric; a later rule for the same metric wins
    let rules: BTreeMap<QualityMetric, Decimal> = thresholds
        .iter()
        .filter(|t| t.enabled)
        .map(|t| (t.metric, t.threshold_percent))
        .collect();

    let mut excesses = Vec::new();
    for (metric, threshold) in &rules {
        let value = measured.get(metric).copied().unwrap_or(Decimal::ZERO);
        let excess = value
            .checked_sub(*threshold)
            .ok_or_else(|| EngineError::overflow(format!("excess of {}", metric)))?
            .max(Decimal::ZERO);
        if excess > Decimal::ZERO {
            excesses.push((*metric, *threshold, value, excess));
        }
    }

    let total_excess = checked_sum(excesses.iter().map(|(_, _, _, e)| *e), "total excess")?;
    if total_excess.is_zero() {
        return Ok(DiscountResult::none(total_weight));
    }

    let combined_percent = total_excess.min(hundred());
    let discount_weight = total_weight
        .checked_mul(combined_percent)
        .and_then(|w| w.checked_div(hundred()))
        .map(round_weight)
        .ok_or_else(|| EngineError::overflow("discount_weight"))?;
    let final_weight = round_weight(total_weight - discount_weight);

    let shares = split_proportionally(
        discount_weight,
        &excesses.iter().map(|(_, _, _, e)| *e).collect::<Vec<_>>(),
    )?;

    let breakdown = excesses
        .into_iter()
        .zip(shares)
        .map(|((metric, threshold, value, excess), weight)| DiscountBreakdownLine {
            metric,
            metric_label: metric.to_string(),
            threshold_value: threshold,
            measured_value: value,
            percent_applied: excess,
            weight_deducted: weight,
        })
        .collect();

    Ok(DiscountResult {
        combined_percent,
        discount_weight,
        final_weight,
        breakdown,
    })
}

/// Split `amount` across `weights` in proportion, rounding each part to the
/// weight scale.
///
/// Parts are taken as differences of rounded cumulative sums, so every part
/// is non-negative and the parts add up to `round_weight(amount)` exactly.
/// The weights must sum to a positive value.
pub fn split_proportionally(amount: Decimal, weights: &[Decimal]) -> EngineResult<Vec<Decimal>> {
    let total = checked_sum(weights.iter().copied(), "proportional base")?;
    if total <= Decimal::ZERO {
        return Err(EngineError::ZeroDenominator { total });
    }

    let mut parts = Vec::with_capacity(weights.len());
    let mut cumulative = Decimal::ZERO;
    let mut previous = Decimal::ZERO;
    for weight in weights {
        cumulative = cumulative
            .checked_add(*weight)
            .ok_or_else(|| EngineError::overflow("proportional base"))?;
        let running = amount
            .checked_mul(cumulative)
            .and_then(|v| v.checked_div(total))
            .map(round_weight)
            .ok_or_else(|| EngineError::overflow("proportional share"))?;
        parts.push(running - previous);
        previous = running;
    }

    Ok(parts)
}
