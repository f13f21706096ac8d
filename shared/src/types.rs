//! Common types used across the engine

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Decimal places kept for every stored weight (kg)
pub const WEIGHT_SCALE: u32 = 3;

/// Largest single weight accepted at intake, in kg (1,000 t)
pub const MAX_WEIGHT_KG: i64 = 1_000_000;

/// [`MAX_WEIGHT_KG`] as a decimal
pub fn max_weight() -> Decimal {
    Decimal::from(MAX_WEIGHT_KG)
}

/// Add up weights, failing instead of overflowing
pub fn checked_sum<I>(values: I, context: &str) -> EngineResult<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
        .ok_or_else(|| EngineError::overflow(context))
}

/// Round a weight to [`WEIGHT_SCALE`] places, half-up.
///
/// Every weight written by the calculator, the reconciler and the allocator
/// goes through this function so that downstream sums agree to the gram.
pub fn round_weight(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(WEIGHT_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// One hundred, as a percentage base
pub fn hundred() -> Decimal {
    Decimal::from(100)
}

/// What to do when the raw deduction (discount + sample loss) is larger than
/// the original weight of the reception
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeductionOverflowPolicy {
    /// Clamp to the original weight and record the excess for an operator
    #[default]
    ClampWithWarning,
    /// Refuse the reconciliation; the underlying data must be corrected
    Reject,
}

impl DeductionOverflowPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeductionOverflowPolicy::ClampWithWarning => "clamp_with_warning",
            DeductionOverflowPolicy::Reject => "reject",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_round_weight_half_up() {
        assert_eq!(
            round_weight(Decimal::from_str("1.0005").unwrap()),
            Decimal::from_str("1.001").unwrap()
        );
        assert_eq!(
            round_weight(Decimal::from_str("1.0004").unwrap()),
            Decimal::from_str("1.000").unwrap()
        );
        assert_eq!(
            round_weight(Decimal::from_str("2.9995").unwrap()),
            Decimal::from_str("3.000").unwrap()
        );
    }

    #[test]
    fn test_checked_sum_reports_overflow() {
        assert_eq!(
            checked_sum([Decimal::from(2), Decimal::from(3)], "total"),
            Ok(Decimal::from(5))
        );
        assert!(matches!(
            checked_sum([Decimal::MAX, Decimal::MAX], "total"),
            Err(EngineError::NonFiniteValue { .. })
        ));
    }

    #[test]
    fn test_overflow_policy_wire_names() {
        for policy in [
            DeductionOverflowPolicy::ClampWithWarning,
            DeductionOverflowPolicy::Reject,
        ] {
            let json = serde_json::to_string(&policy).unwrap();
            assert_eq!(json, format!("\"{}\"", policy.as_str()));
        }
    }
}
