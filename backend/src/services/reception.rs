//! Reception intake and read model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::error::{AppError, AppResult};
use shared::{
    checked_sum, round_weight, validate_commodity_type, validate_weight_lines, DiscountBreakdownLine,
    QualityMetric, Reception,
};

/// Reception service
#[derive(Clone)]
pub struct ReceptionService {
    db: PgPool,
}

/// Database row for a reception
#[derive(Debug, sqlx::FromRow)]
struct ReceptionRow {
    id: Uuid,
    commodity_type: String,
    original_weight: Decimal,
    discount_weight: Decimal,
    final_weight: Decimal,
    lab_sample_wet_weight: Decimal,
    lab_sample_dried_weight: Decimal,
    dried_weight: Decimal,
    deduction_overflow_kg: Option<Decimal>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ReceptionRow> for Reception {
    fn from(row: ReceptionRow) -> Self {
        Reception {
            id: row.id,
            commodity_type: row.commodity_type,
            original_weight: row.original_weight,
            discount_weight: row.discount_weight,
            final_weight: row.final_weight,
            lab_sample_wet_weight: row.lab_sample_wet_weight,
            lab_sample_dried_weight: row.lab_sample_dried_weight,
            dried_weight: row.dried_weight,
            deduction_overflow: row.deduction_overflow_kg,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Database row for a discount breakdown line
#[derive(Debug, sqlx::FromRow)]
struct BreakdownRow {
    metric: String,
    metric_label: String,
    threshold_value: Decimal,
    measured_value: Decimal,
    percent_applied: Decimal,
    weight_deducted: Decimal,
}

/// Reception with its current discount breakdown
#[derive(Debug, Clone, Serialize)]
pub struct ReceptionDetail {
    #[serde(flatten)]
    pub reception: Reception,
    pub breakdown: Vec<DiscountBreakdownLine>,
}

/// Input for creating a reception at intake
#[derive(Debug, Deserialize, Validate)]
pub struct CreateReceptionInput {
    #[validate(custom = "commodity_type_rule")]
    pub commodity_type: String,
    #[validate(length(min = 1, max = 200))]
    pub weight_lines: Vec<Decimal>,
}

fn commodity_type_rule(code: &str) -> Result<(), ValidationError> {
    validate_commodity_type(code).map_err(|_| ValidationError::new("commodity_type"))
}

const RECEPTION_COLUMNS: &str = "id, commodity_type, original_weight, discount_weight, final_weight, lab_sample_wet_weight, lab_sample_dried_weight, dried_weight, deduction_overflow_kg, created_at, updated_at";

impl ReceptionService {
    /// Create a new ReceptionService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Record a reception with its intake weight lines
    pub async fn create_reception(&self, input: CreateReceptionInput) -> AppResult<ReceptionDetail> {
        input.validate()?;
        validate_weight_lines(&input.weight_lines).map_err(|msg| {
            AppError::invalid("weight_lines", msg, "น้ำหนักแต่ละรายการต้องเป็นค่าบวกและไม่เกิน 1,000,000 กก.")
        })?;

        let original_weight = round_weight(checked_sum(
            input.weight_lines.iter().copied(),
            "original weight",
        )?);

        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, ReceptionRow>(&format!(
            r#"
            INSERT INTO receptions (commodity_type, original_weight, discount_weight, final_weight,
                                    lab_sample_wet_weight, lab_sample_dried_weight, dried_weight)
            VALUES ($1, $2, 0, $2, 0, 0, 0)
            RETURNING {}
            "#,
            RECEPTION_COLUMNS
        ))
        .bind(&input.commodity_type)
        .bind(original_weight)
        .fetch_one(&mut *tx)
        .await?;

        for (line_no, weight) in input.weight_lines.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO reception_weight_lines (reception_id, line_no, weight_kg)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(row.id)
            .bind(line_no as i32 + 1)
            .bind(weight)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(reception_id = %row.id, %original_weight, "Reception created");

        Ok(ReceptionDetail {
            reception: row.into(),
            breakdown: Vec::new(),
        })
    }

    /// Get a reception with its discount breakdown
    pub async fn get_reception(&self, reception_id: Uuid) -> AppResult<ReceptionDetail> {
        let row = sqlx::query_as::<_, ReceptionRow>(&format!(
            "SELECT {} FROM receptions WHERE id = $1",
            RECEPTION_COLUMNS
        ))
        .bind(reception_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Reception".to_string()))?;

        let breakdown = sqlx::query_as::<_, BreakdownRow>(
            r#"
            SELECT metric, metric_label, threshold_value, measured_value, percent_applied, weight_deducted
            FROM discount_breakdown_lines
            WHERE reception_id = $1
            ORDER BY metric
            "#,
        )
        .bind(reception_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .filter_map(|r| {
            QualityMetric::from_str(&r.metric).map(|metric| DiscountBreakdownLine {
                metric,
                metric_label: r.metric_label,
                threshold_value: r.threshold_value,
                measured_value: r.measured_value,
                percent_applied: r.percent_applied,
                weight_deducted: r.weight_deducted,
            })
        })
        .collect();

        Ok(ReceptionDetail {
            reception: row.into(),
            breakdown,
        })
    }
}
