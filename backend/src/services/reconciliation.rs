//! Reception weight reconciler
//!
//! Recomputes a reception's discount and final weight from its current best
//! known quality data and lab sampling, then replaces the stored aggregate
//! and breakdown in one transaction. Safe to re-run: unchanged inputs give
//! an unchanged row set.

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::measurement::{fetch_field_evaluation, fetch_lab_samples};
use crate::services::threshold::fetch_enabled_thresholds;
use shared::{
    reconcile_weights, round_weight, select_quality_source, DeductionOverflowPolicy,
    ReconciliationInput, ThresholdRule,
};

/// Reconciliation service
#[derive(Clone)]
pub struct ReconciliationService {
    db: PgPool,
    policy: DeductionOverflowPolicy,
}

/// Summary of what a reconciliation wrote
#[derive(Debug, Clone, Serialize)]
pub struct ReconciliationOutcome {
    pub reception_id: Uuid,
    /// `lab_sample`, `field_evaluation`, or none when no discount applied
    pub quality_source: Option<&'static str>,
    pub thresholds_applied: usize,
    pub combined_percent: Decimal,
    pub quality_discount: Decimal,
    pub net_sample_loss: Decimal,
    pub total_deduction: Decimal,
    pub original_weight: Decimal,
    pub final_weight: Decimal,
    pub deduction_overflow: Option<Decimal>,
    pub breakdown_lines: usize,
}

impl ReconciliationService {
    /// Create a new ReconciliationService instance
    pub fn new(db: PgPool, policy: DeductionOverflowPolicy) -> Self {
        Self { db, policy }
    }

    /// Reconcile the weights of one reception.
    ///
    /// The reception row stays locked from the first read to the commit, so
    /// concurrent reconciliations of the same reception run one after the
    /// other.
    #[tracing::instrument(skip(self), fields(policy = self.policy.as_str()))]
    pub async fn reconcile(&self, reception_id: Uuid) -> AppResult<ReconciliationOutcome> {
        let mut tx = self.db.begin().await?;

        let (commodity_type, stored_original) = sqlx::query_as::<_, (String, Decimal)>(
            "SELECT commodity_type, original_weight FROM receptions WHERE id = $1 FOR UPDATE",
        )
        .bind(reception_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Reception".to_string()))?;

        let line_total = sqlx::query_scalar::<_, Option<Decimal>>(
            "SELECT SUM(weight_kg) FROM reception_weight_lines WHERE reception_id = $1",
        )
        .bind(reception_id)
        .fetch_one(&mut *tx)
        .await?;
        let original_weight = line_total.map(round_weight).unwrap_or(stored_original);

        // Samples feed the sample loss; a failed read must abort, not degrade
        let samples = fetch_lab_samples(&mut *tx, reception_id).await?;

        // All reads share the transaction; only an unreadable row degrades to "no discount"
        let field = match fetch_field_evaluation(&mut *tx, reception_id).await {
            Ok(field) => field,
            Err(e) if is_decode_error(&e) => {
                tracing::warn!("Unreadable field evaluation, treating as absent: {}", e);
                None
            }
            Err(e) => return Err(e.into()),
        };
        let source = select_quality_source(field.as_ref(), &samples);

        let rules = match &source {
            Some(_) => match fetch_enabled_thresholds(&mut *tx, &commodity_type).await {
                Ok(thresholds) if thresholds.is_empty() => {
                    tracing::info!(%commodity_type, "No thresholds configured, discount skipped");
                    Vec::new()
                }
                Ok(thresholds) => thresholds.iter().map(ThresholdRule::from).collect(),
                Err(e) if is_decode_error(&e) => {
                    tracing::warn!(%commodity_type, "Unreadable thresholds, discount skipped: {}", e);
                    Vec::new()
                }
                Err(e) => return Err(e.into()),
            },
            None => {
                tracing::debug!("No quality measurement, discount skipped");
                Vec::new()
            }
        };

        let weights = reconcile_weights(&ReconciliationInput {
            original_weight,
            thresholds: &rules,
            source: source.as_ref(),
            samples: &samples,
            policy: self.policy,
        })?;

        if let Some(overflow) = weights.deduction_overflow {
            tracing::warn!(
                %overflow,
                %original_weight,
                discount = %weights.discount.discount_weight,
                net_sample_loss = %weights.net_sample_loss,
                "Total deduction exceeds original weight, clamped; operator review required"
            );
        }

        sqlx::query("DELETE FROM discount_breakdown_lines WHERE reception_id = $1")
            .bind(reception_id)
            .execute(&mut *tx)
            .await?;

        for line in &weights.discount.breakdown {
            sqlx::query(
                r#"
                INSERT INTO discount_breakdown_lines (
                    reception_id, metric, metric_label, threshold_value,
                    measured_value, percent_applied, weight_deducted
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(reception_id)
            .bind(line.metric.as_str())
            .bind(&line.metric_label)
            .bind(line.threshold_value)
            .bind(line.measured_value)
            .bind(line.percent_applied)
            .bind(line.weight_deducted)
            .execute(&mut *tx)
            .await?;
        }

        // updated_at only moves when a value actually changes
        sqlx::query(
            r#"
            UPDATE receptions
            SET original_weight = $2,
                discount_weight = $3,
                final_weight = $4,
                lab_sample_wet_weight = $5,
                lab_sample_dried_weight = $6,
                deduction_overflow_kg = $7,
                updated_at = CASE
                    WHEN (original_weight, discount_weight, final_weight, lab_sample_wet_weight,
                          lab_sample_dried_weight, deduction_overflow_kg)
                         IS DISTINCT FROM ($2, $3, $4, $5, $6, $7)
                    THEN NOW()
                    ELSE updated_at
                END
            WHERE id = $1
            "#,
        )
        .bind(reception_id)
        .bind(weights.original_weight)
        .bind(weights.total_deduction)
        .bind(weights.final_weight)
        .bind(weights.sample_wet_weight)
        .bind(weights.sample_dried_weight)
        .bind(weights.deduction_overflow)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let outcome = ReconciliationOutcome {
            reception_id,
            quality_source: source.as_ref().map(|s| s.label()),
            thresholds_applied: rules.len(),
            combined_percent: weights.discount.combined_percent,
            quality_discount: weights.discount.discount_weight,
            net_sample_loss: weights.net_sample_loss,
            total_deduction: weights.total_deduction,
            original_weight: weights.original_weight,
            final_weight: weights.final_weight,
            deduction_overflow: weights.deduction_overflow,
            breakdown_lines: weights.discount.breakdown.len(),
        };

        tracing::info!(
            quality_source = outcome.quality_source.unwrap_or("none"),
            total_deduction = %outcome.total_deduction,
            final_weight = %outcome.final_weight,
            "Reception reconciled"
        );

        Ok(outcome)
    }
}

/// A row that exists but cannot be decoded, as opposed to a failed connection
fn is_decode_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_)
    )
}
