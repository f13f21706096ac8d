//! Data-integrity errors raised by the pure engine

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Violations detected while computing weights.
///
/// None of these are ever coerced into a stored value: the caller must refuse
/// the write.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid input for {field}: {message}")]
    InvalidInput { field: &'static str, message: String },

    #[error("cannot apportion over a total of {total}")]
    ZeroDenominator { total: Decimal },

    #[error("computed value for {context} is not representable")]
    NonFiniteValue { context: String },

    #[error("allocation for reception {reception_id} is negative ({value})")]
    NegativeAllocation { reception_id: Uuid, value: Decimal },

    #[error("batch wet weight {batch_total} does not match its members' total {members_total}")]
    WetWeightMismatch {
        batch_total: Decimal,
        members_total: Decimal,
    },

    #[error("deduction {deduction} exceeds original weight {original_weight}")]
    DeductionExceedsOriginal {
        deduction: Decimal,
        original_weight: Decimal,
    },
}

impl EngineError {
    pub(crate) fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        EngineError::InvalidInput {
            field,
            message: message.into(),
        }
    }

    pub(crate) fn overflow(context: impl Into<String>) -> Self {
        EngineError::NonFiniteValue {
            context: context.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
