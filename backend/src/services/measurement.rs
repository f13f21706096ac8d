//! Quality measurement service: field evaluations and laboratory samples
//!
//! Every write here is a quality event; callers re-run the reconciler for the
//! affected reception once the write has committed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use shared::{
    validate_measurements, validate_sample_dried_weight, validate_sample_wet_weight,
    FieldEvaluation, LabSample, LabSampleStatus, QualityMeasurement, QualityMetric,
};

/// Measurement service for field evaluations and lab samples
#[derive(Clone)]
pub struct MeasurementService {
    db: PgPool,
}

/// Database row for a field evaluation
#[derive(Debug, sqlx::FromRow)]
struct FieldEvaluationRow {
    reception_id: Uuid,
    measurements: serde_json::Value,
    locked: bool,
    evaluated_at: DateTime<Utc>,
}

impl From<FieldEvaluationRow> for FieldEvaluation {
    fn from(row: FieldEvaluationRow) -> Self {
        FieldEvaluation {
            reception_id: row.reception_id,
            measurements: measurements_from_json(row.measurements),
            locked: row.locked,
            evaluated_at: row.evaluated_at,
        }
    }
}

/// Database row for a lab sample
#[derive(Debug, sqlx::FromRow)]
struct LabSampleRow {
    id: Uuid,
    reception_id: Uuid,
    status: String,
    wet_weight: Decimal,
    dried_weight: Decimal,
    defects: Option<serde_json::Value>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<LabSampleRow> for LabSample {
    type Error = AppError;

    fn try_from(row: LabSampleRow) -> Result<Self, Self::Error> {
        let status = LabSampleStatus::from_str(&row.status).ok_or_else(|| {
            AppError::Internal(format!(
                "Lab sample {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;

        Ok(LabSample {
            id: row.id,
            reception_id: row.reception_id,
            status,
            wet_weight: row.wet_weight,
            dried_weight: row.dried_weight,
            defects: row.defects.map(measurements_from_json).unwrap_or_default(),
            completed_at: row.completed_at,
            created_at: row.created_at,
        })
    }
}

/// Input for recording a field evaluation
#[derive(Debug, Deserialize, Validate)]
pub struct RecordFieldEvaluationInput {
    #[validate(length(min = 1))]
    pub measurements: BTreeMap<QualityMetric, Decimal>,
}

/// Input for registering a lab sample
#[derive(Debug, Deserialize)]
pub struct RegisterLabSampleInput {
    pub wet_weight: Decimal,
}

/// Input for recording the dried weight of a lab sample
#[derive(Debug, Deserialize)]
pub struct RecordSampleDryingInput {
    pub dried_weight: Decimal,
}

/// Input for entering lab defect results
#[derive(Debug, Deserialize)]
pub struct EnterSampleResultInput {
    pub defects: BTreeMap<QualityMetric, Decimal>,
}

const LAB_SAMPLE_COLUMNS: &str = "id, reception_id, status, wet_weight, dried_weight, defects, completed_at, created_at";

impl MeasurementService {
    /// Create a new MeasurementService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get the field evaluation of a reception, if any
    pub async fn get_field_evaluation(&self, reception_id: Uuid) -> AppResult<Option<FieldEvaluation>> {
        Ok(fetch_field_evaluation(&self.db, reception_id).await?)
    }

    /// Record or replace the field evaluation of a reception while unlocked
    pub async fn record_field_evaluation(
        &self,
        reception_id: Uuid,
        input: RecordFieldEvaluationInput,
    ) -> AppResult<FieldEvaluation> {
        input.validate()?;
        validate_measurements(&input.measurements).map_err(|msg| {
            AppError::invalid("measurements", msg, "ค่าคุณภาพต้องอยู่ระหว่าง 0 ถึง 100%")
        })?;
        ensure_reception_exists(&self.db, reception_id).await?;

        let measurements_json = serde_json::to_value(&input.measurements)
            .map_err(|e| AppError::Internal(e.to_string()))?;

        // The WHERE clause on the conflict branch keeps locked evaluations untouched
        let row = sqlx::query_as::<_, FieldEvaluationRow>(
            r#"
            INSERT INTO field_evaluations (reception_id, measurements, locked, evaluated_at)
            VALUES ($1, $2, FALSE, NOW())
            ON CONFLICT (reception_id) DO UPDATE
            SET measurements = EXCLUDED.measurements, evaluated_at = NOW()
            WHERE field_evaluations.locked = FALSE
            RETURNING reception_id, measurements, locked, evaluated_at
            "#,
        )
        .bind(reception_id)
        .bind(&measurements_json)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::Conflict {
            resource: "field_evaluation".to_string(),
            message: "Field evaluation is locked and can no longer be edited".to_string(),
            message_th: "การประเมินภาคสนามถูกล็อกแล้ว ไม่สามารถแก้ไขได้".to_string(),
        })?;

        tracing::info!(%reception_id, "Field evaluation recorded");

        Ok(row.into())
    }

    /// Lock the field evaluation of a reception
    pub async fn lock_field_evaluation(&self, reception_id: Uuid) -> AppResult<FieldEvaluation> {
        let row = sqlx::query_as::<_, FieldEvaluationRow>(
            r#"
            UPDATE field_evaluations
            SET locked = TRUE
            WHERE reception_id = $1
            RETURNING reception_id, measurements, locked, evaluated_at
            "#,
        )
        .bind(reception_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Field evaluation".to_string()))?;

        Ok(row.into())
    }

    /// List all lab samples of a reception
    pub async fn list_lab_samples(&self, reception_id: Uuid) -> AppResult<Vec<LabSample>> {
        fetch_lab_samples(&self.db, reception_id).await
    }

    /// Register a new lab sample taken from a reception
    pub async fn register_lab_sample(
        &self,
        reception_id: Uuid,
        input: RegisterLabSampleInput,
    ) -> AppResult<LabSample> {
        validate_sample_wet_weight(input.wet_weight).map_err(|msg| {
            AppError::invalid("wet_weight", msg, "น้ำหนักตัวอย่างเปียกต้องเป็นค่าบวก")
        })?;
        ensure_reception_exists(&self.db, reception_id).await?;

        let row = sqlx::query_as::<_, LabSampleRow>(&format!(
            r#"
            INSERT INTO lab_samples (reception_id, status, wet_weight, dried_weight)
            VALUES ($1, $2, $3, 0)
            RETURNING {}
            "#,
            LAB_SAMPLE_COLUMNS
        ))
        .bind(reception_id)
        .bind(LabSampleStatus::Drying.as_str())
        .bind(input.wet_weight)
        .fetch_one(&self.db)
        .await?;

        row.try_into()
    }

    /// Record the dried weight of a sample: Drying -> Analysis
    pub async fn record_sample_drying(
        &self,
        sample_id: Uuid,
        input: RecordSampleDryingInput,
    ) -> AppResult<LabSample> {
        let mut tx = self.db.begin().await?;

        let sample = lock_lab_sample(&mut *tx, sample_id).await?;
        ensure_transition(&sample, LabSampleStatus::Analysis)?;

        validate_sample_dried_weight(sample.wet_weight, input.dried_weight).map_err(|msg| {
            AppError::invalid(
                "dried_weight",
                msg,
                "น้ำหนักแห้งต้องไม่ติดลบและไม่เกินน้ำหนักเปียก",
            )
        })?;

        let row = sqlx::query_as::<_, LabSampleRow>(&format!(
            r#"
            UPDATE lab_samples
            SET dried_weight = $1, status = $2
            WHERE id = $3
            RETURNING {}
            "#,
            LAB_SAMPLE_COLUMNS
        ))
        .bind(input.dried_weight)
        .bind(LabSampleStatus::Analysis.as_str())
        .bind(sample_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        row.try_into()
    }

    /// Enter defect results: Analysis -> Completed. Results are write-once.
    pub async fn enter_sample_result(
        &self,
        sample_id: Uuid,
        input: EnterSampleResultInput,
    ) -> AppResult<LabSample> {
        validate_measurements(&input.defects).map_err(|msg| {
            AppError::invalid("defects", msg, "ค่าข้อบกพร่องต้องอยู่ระหว่าง 0 ถึง 100%")
        })?;

        let mut tx = self.db.begin().await?;

        let sample = lock_lab_sample(&mut *tx, sample_id).await?;
        ensure_transition(&sample, LabSampleStatus::Completed)?;

        let defects_json =
            serde_json::to_value(&input.defects).map_err(|e| AppError::Internal(e.to_string()))?;

        let row = sqlx::query_as::<_, LabSampleRow>(&format!(
            r#"
            UPDATE lab_samples
            SET defects = $1, status = $2, completed_at = NOW()
            WHERE id = $3
            RETURNING {}
            "#,
            LAB_SAMPLE_COLUMNS
        ))
        .bind(&defects_json)
        .bind(LabSampleStatus::Completed.as_str())
        .bind(sample_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(%sample_id, reception_id = %sample.reception_id, "Lab result entered");

        row.try_into()
    }
}

/// Load the field evaluation of a reception on the given executor
pub(crate) async fn fetch_field_evaluation<'e, E>(
    executor: E,
    reception_id: Uuid,
) -> Result<Option<FieldEvaluation>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, FieldEvaluationRow>(
        r#"
        SELECT reception_id, measurements, locked, evaluated_at
        FROM field_evaluations
        WHERE reception_id = $1
        "#,
    )
    .bind(reception_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(FieldEvaluation::from))
}

/// Load every lab sample of a reception on the given executor
pub(crate) async fn fetch_lab_samples<'e, E>(executor: E, reception_id: Uuid) -> AppResult<Vec<LabSample>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, LabSampleRow>(&format!(
        r#"
        SELECT {}
        FROM lab_samples
        WHERE reception_id = $1
        ORDER BY created_at, id
        "#,
        LAB_SAMPLE_COLUMNS
    ))
    .bind(reception_id)
    .fetch_all(executor)
    .await?;

    rows.into_iter().map(LabSample::try_from).collect()
}

/// Decode a stored measurement map, skipping metrics this build does not know
pub(crate) fn measurements_from_json(value: serde_json::Value) -> QualityMeasurement {
    let raw: BTreeMap<String, Decimal> = match serde_json::from_value(value) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!("Ignoring unreadable measurement payload: {}", e);
            return QualityMeasurement::new();
        }
    };

    raw.into_iter()
        .filter_map(|(key, value)| match QualityMetric::from_str(&key) {
            Some(metric) => Some((metric, value)),
            None => {
                tracing::warn!(metric = %key, "Ignoring unknown quality metric");
                None
            }
        })
        .collect()
}

async fn lock_lab_sample<'e, E>(executor: E, sample_id: Uuid) -> AppResult<LabSample>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, LabSampleRow>(&format!(
        "SELECT {} FROM lab_samples WHERE id = $1 FOR UPDATE",
        LAB_SAMPLE_COLUMNS
    ))
    .bind(sample_id)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| AppError::NotFound("Lab sample".to_string()))?;

    row.try_into()
}

fn ensure_transition(sample: &LabSample, next: LabSampleStatus) -> AppResult<()> {
    if sample.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(AppError::InvalidStateTransition(format!(
            "Lab sample {} cannot move from {} to {}",
            sample.id,
            sample.status.as_str(),
            next.as_str()
        )))
    }
}

pub(crate) async fn ensure_reception_exists<'e, E>(executor: E, reception_id: Uuid) -> AppResult<()>
where
    E: PgExecutor<'e>,
{
    let exists =
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM receptions WHERE id = $1)")
            .bind(reception_id)
            .fetch_one(executor)
            .await?;

    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound("Reception".to_string()))
    }
}
