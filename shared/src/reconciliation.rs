//! Reception weight reconciliation arithmetic
//!
//! Folds the quality discount and the laboratory sample loss into the
//! reception aggregate. The full aggregate is always recomputed from its
//! parts; nothing here patches a previously stored value.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::discount::{compute_discount, DiscountResult};
use crate::error::{EngineError, EngineResult};
use crate::models::{sample_totals, LabSample, QualitySource, ThresholdRule};
use crate::types::{round_weight, DeductionOverflowPolicy};

/// Everything a reconciliation depends on
#[derive(Debug, Clone)]
pub struct ReconciliationInput<'a> {
    pub original_weight: Decimal,
    pub thresholds: &'a [ThresholdRule],
    pub source: Option<&'a QualitySource>,
    /// All lab samples of the reception, whatever their status
    pub samples: &'a [LabSample],
    pub policy: DeductionOverflowPolicy,
}

/// Reconciled reception weights, ready to persist
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconciledWeights {
    pub original_weight: Decimal,
    pub discount: DiscountResult,
    pub sample_wet_weight: Decimal,
    pub sample_dried_weight: Decimal,
    pub net_sample_loss: Decimal,
    /// Quality discount plus net sample loss, clamped to `[0, original]`
    pub total_deduction: Decimal,
    pub final_weight: Decimal,
    /// Raw deduction above the original weight, when clamping happened
    pub deduction_overflow: Option<Decimal>,
}

/// Recompute the weights of a reception from its current inputs.
///
/// The discount is skipped (zero, empty breakdown) when there is no quality
/// source or no threshold; the sample loss is applied regardless.
pub fn reconcile_weights(input: &ReconciliationInput<'_>) -> EngineResult<ReconciledWeights> {
    let original = input.original_weight;
    if original <= Decimal::ZERO {
        return Err(EngineError::invalid(
            "original_weight",
            format!("must be positive, got {}", original),
        ));
    }

    let discount = match input.source {
        Some(source) if !input.thresholds.is_empty() => {
            compute_discount(original, input.thresholds, source.measurements())?
        }
        _ => DiscountResult::none(original),
    };

    let (wet, dried, net_loss) = sample_totals(input.samples)?;
    let raw_deduction = discount
        .discount_weight
        .checked_add(net_loss)
        .ok_or_else(|| EngineError::overflow("total deduction"))?;

    let mut deduction_overflow = None;
    let total_deduction = if raw_deduction > original {
        let excess = raw_deduction
            .checked_sub(original)
            .map(round_weight)
            .ok_or_else(|| EngineError::overflow("deduction overflow"))?;
        if input.policy == DeductionOverflowPolicy::Reject {
            return Err(EngineError::DeductionExceedsOriginal {
                deduction: raw_deduction,
                original_weight: original,
            });
        }
        deduction_overflow = Some(excess);
        original
    } else if raw_deduction < Decimal::ZERO {
        Decimal::ZERO
    } else {
        raw_deduction
    };

    let total_deduction = round_weight(total_deduction);

    Ok(ReconciledWeights {
        original_weight: original,
        discount,
        sample_wet_weight: round_weight(wet),
        sample_dried_weight: round_weight(dried),
        net_sample_loss: round_weight(net_loss),
        total_deduction,
        final_weight: round_weight(original - total_deduction),
        deduction_overflow,
    })
}
