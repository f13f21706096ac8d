//! Batch blending allocation
//!
//! Distributes the dried weight of a shared drying/fermentation batch back to
//! the receptions that contributed wet weight to it.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::discount::split_proportionally;
use crate::error::{EngineError, EngineResult};
use crate::models::BatchMembership;
use crate::types::{checked_sum, max_weight, MAX_WEIGHT_KG};

/// Wet weight a reception put into a batch
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MemberContribution {
    pub reception_id: Uuid,
    pub wet_weight_contribution: Decimal,
}

/// Dried weight apportioned to one member
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MemberAllocation {
    pub reception_id: Uuid,
    pub wet_weight_contribution: Decimal,
    /// Fraction of the batch wet weight, unrounded
    pub share: Decimal,
    pub proportional_dried_weight: Decimal,
}

/// Check a batch before it is formed and return its total wet weight.
///
/// A batch needs at least one member, each reception at most once, and
/// strictly positive contributions.
pub fn validate_batch_members(members: &[MemberContribution]) -> EngineResult<Decimal> {
    if members.is_empty() {
        return Err(EngineError::invalid("members", "a batch needs at least one reception"));
    }

    let mut seen = HashSet::with_capacity(members.len());
    for member in members {
        if !seen.insert(member.reception_id) {
            return Err(EngineError::invalid(
                "members",
                format!("reception {} appears more than once", member.reception_id),
            ));
        }
        if member.wet_weight_contribution > max_weight() {
            return Err(EngineError::invalid(
                "wet_weight_contribution",
                format!(
                    "contribution of reception {} exceeds {} kg",
                    member.reception_id, MAX_WEIGHT_KG
                ),
            ));
        }
        if member.wet_weight_contribution <= Decimal::ZERO {
            return Err(EngineError::invalid(
                "wet_weight_contribution",
                format!(
                    "contribution of reception {} must be positive, got {}",
                    member.reception_id, member.wet_weight_contribution
                ),
            ));
        }
    }

    checked_sum(
        members.iter().map(|m| m.wet_weight_contribution),
        "batch total wet weight",
    )
}

/// Apportion `total_dried_weight` across members by wet-weight share.
///
/// Every value is computed and checked before anything is returned, so a
/// caller that writes only on `Ok` can never persist a partial or poisoned
/// allocation. The allocations sum exactly to the rounded total.
pub fn allocate_dried_weight(
    members: &[MemberContribution],
    total_dried_weight: Decimal,
) -> EngineResult<Vec<MemberAllocation>> {
    if total_dried_weight < Decimal::ZERO {
        return Err(EngineError::invalid(
            "total_dried_weight",
            format!("must not be negative, got {}", total_dried_weight),
        ));
    }
    if total_dried_weight > max_weight() {
        return Err(EngineError::invalid(
            "total_dried_weight",
            format!("must not exceed {} kg", MAX_WEIGHT_KG),
        ));
    }

    if let Some(bad) = members
        .iter()
        .find(|m| m.wet_weight_contribution < Decimal::ZERO)
    {
        return Err(EngineError::NegativeAllocation {
            reception_id: bad.reception_id,
            value: bad.wet_weight_contribution,
        });
    }

    let total_wet = checked_sum(
        members.iter().map(|m| m.wet_weight_contribution),
        "batch total wet weight",
    )?;
    if total_wet <= Decimal::ZERO {
        return Err(EngineError::ZeroDenominator { total: total_wet });
    }

    let contributions: Vec<Decimal> = members.iter().map(|m| m.wet_weight_contribution).collect();
    let dried = split_proportionally(total_dried_weight, &contributions)?;

    members
        .iter()
        .zip(dried)
        .map(|(member, proportional)| {
            let share = member
                .wet_weight_contribution
                .checked_div(total_wet)
                .ok_or_else(|| {
                    EngineError::overflow(format!("share of reception {}", member.reception_id))
                })?;
            if proportional < Decimal::ZERO {
                return Err(EngineError::NegativeAllocation {
                    reception_id: member.reception_id,
                    value: proportional,
                });
            }
            Ok(MemberAllocation {
                reception_id: member.reception_id,
                wet_weight_contribution: member.wet_weight_contribution,
                share,
                proportional_dried_weight: proportional,
            })
        })
        .collect()
}

/// Check the stored batch wet weight against the sum of its memberships
pub fn check_wet_total(batch_total: Decimal, members: &[MemberContribution]) -> EngineResult<()> {
    let members_total = checked_sum(
        members.iter().map(|m| m.wet_weight_contribution),
        "batch members wet weight",
    )?;
    if members_total != batch_total {
        return Err(EngineError::WetWeightMismatch {
            batch_total,
            members_total,
        });
    }
    Ok(())
}

/// Dried weight of a reception summed over every batch it took part in.
///
/// Memberships of batches that are not completed yet carry no dried weight
/// and add nothing.
pub fn cumulative_dried_weight(memberships: &[BatchMembership], reception_id: Uuid) -> Decimal {
    memberships
        .iter()
        .filter(|m| m.reception_id == reception_id)
        .filter_map(|m| m.proportional_dried_weight)
        .sum()
}
