//! Batch blending allocator
//!
//! Forms drying/fermentation batches from receptions and, when a batch
//! completes, apportions its dried weight back to every member.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use shared::{
    allocate_dried_weight, check_wet_total, cumulative_dried_weight, round_weight,
    validate_batch_members, Batch, BatchMembership, BatchStatus, MemberContribution,
};

/// Batch service
#[derive(Clone)]
pub struct BatchService {
    db: PgPool,
}

/// Database row for a batch
#[derive(Debug, sqlx::FromRow)]
struct BatchRow {
    id: Uuid,
    total_wet_weight: Decimal,
    total_dried_weight: Option<Decimal>,
    status: String,
    created_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TryFrom<BatchRow> for Batch {
    type Error = AppError;

    fn try_from(row: BatchRow) -> Result<Self, Self::Error> {
        let status = BatchStatus::from_str(&row.status).ok_or_else(|| {
            AppError::Internal(format!("Batch {} has unknown status '{}'", row.id, row.status))
        })?;

        Ok(Batch {
            id: row.id,
            total_wet_weight: row.total_wet_weight,
            total_dried_weight: row.total_dried_weight,
            status,
            created_at: row.created_at,
            completed_at: row.completed_at,
        })
    }
}

/// Database row for a batch membership
#[derive(Debug, sqlx::FromRow)]
struct MembershipRow {
    batch_id: Uuid,
    reception_id: Uuid,
    wet_weight_contribution: Decimal,
    proportional_dried_weight: Option<Decimal>,
}

impl From<MembershipRow> for BatchMembership {
    fn from(row: MembershipRow) -> Self {
        BatchMembership {
            batch_id: row.batch_id,
            reception_id: row.reception_id,
            wet_weight_contribution: row.wet_weight_contribution,
            proportional_dried_weight: row.proportional_dried_weight,
        }
    }
}

/// Batch with its members
#[derive(Debug, Clone, Serialize)]
pub struct BatchDetail {
    #[serde(flatten)]
    pub batch: Batch,
    pub memberships: Vec<BatchMembership>,
}

/// Input for forming a batch
#[derive(Debug, Deserialize, Validate)]
pub struct FormBatchInput {
    #[validate(length(min = 1, max = 500))]
    pub members: Vec<MemberContribution>,
}

/// Input for completing a batch
#[derive(Debug, Deserialize)]
pub struct CompleteBatchInput {
    pub total_dried_weight: Decimal,
}

const BATCH_COLUMNS: &str =
    "id, total_wet_weight, total_dried_weight, status, created_at, completed_at";

impl BatchService {
    /// Create a new BatchService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Form a batch from reception contributions
    pub async fn form_batch(&self, input: FormBatchInput) -> AppResult<BatchDetail> {
        input.validate()?;
        let total_wet_weight = validate_batch_members(&input.members)?;

        let ids: Vec<Uuid> = input.members.iter().map(|m| m.reception_id).collect();

        let mut tx = self.db.begin().await?;

        let found = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM receptions WHERE id = ANY($1)",
        )
        .bind(&ids)
        .fetch_one(&mut *tx)
        .await?;
        if found != ids.len() as i64 {
            return Err(AppError::NotFound("Reception in batch".to_string()));
        }

        let batch_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO batches (total_wet_weight, status)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(total_wet_weight)
        .bind(BatchStatus::InProgress.as_str())
        .fetch_one(&mut *tx)
        .await?;

        for member in &input.members {
            sqlx::query(
                r#"
                INSERT INTO batch_memberships (batch_id, reception_id, wet_weight_contribution)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(batch_id)
            .bind(member.reception_id)
            .bind(member.wet_weight_contribution)
            .execute(&mut *tx)
            .await?;
        }

        // Re-read what was written: the stored total must match the stored rows
        let written = load_contributions(&mut *tx, batch_id).await?;
        check_wet_total(total_wet_weight, &written)?;

        tx.commit().await?;

        tracing::info!(%batch_id, %total_wet_weight, members = ids.len(), "Batch formed");

        self.get_batch(batch_id).await
    }

    /// Complete a batch and apportion its dried weight.
    ///
    /// Allowed once per batch. All shares are computed and checked before the
    /// first write; on any integrity error nothing is stored.
    #[tracing::instrument(skip(self, input), fields(total_dried_weight = %input.total_dried_weight))]
    pub async fn complete_batch(
        &self,
        batch_id: Uuid,
        input: CompleteBatchInput,
    ) -> AppResult<BatchDetail> {
        let mut tx = self.db.begin().await?;

        let row = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM batches WHERE id = $1 FOR UPDATE",
            BATCH_COLUMNS
        ))
        .bind(batch_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch".to_string()))?;
        let batch = Batch::try_from(row)?;

        if batch.status != BatchStatus::InProgress {
            return Err(AppError::InvalidStateTransition(format!(
                "Batch {} is already {}",
                batch_id,
                batch.status.as_str()
            )));
        }

        let total_dried_weight = round_weight(input.total_dried_weight);
        let members = load_contributions(&mut *tx, batch_id).await?;
        let allocations = allocate_dried_weight(&members, total_dried_weight)?;
        check_wet_total(batch.total_wet_weight, &members)?;

        for allocation in &allocations {
            sqlx::query(
                r#"
                UPDATE batch_memberships
                SET proportional_dried_weight = $1
                WHERE batch_id = $2 AND reception_id = $3
                "#,
            )
            .bind(allocation.proportional_dried_weight)
            .bind(batch_id)
            .bind(allocation.reception_id)
            .execute(&mut *tx)
            .await?;
        }

        let updated = sqlx::query(
            r#"
            UPDATE batches
            SET status = $1, total_dried_weight = $2, completed_at = NOW()
            WHERE id = $3 AND status = $4
            "#,
        )
        .bind(BatchStatus::Completed.as_str())
        .bind(total_dried_weight)
        .bind(batch_id)
        .bind(BatchStatus::InProgress.as_str())
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() != 1 {
            return Err(AppError::InvalidStateTransition(format!(
                "Batch {} was completed concurrently",
                batch_id
            )));
        }

        // Members come back ordered by reception id, so locks are taken in id order
        let reception_ids: Vec<Uuid> = members.iter().map(|m| m.reception_id).collect();
        sqlx::query("SELECT id FROM receptions WHERE id = ANY($1) ORDER BY id FOR UPDATE")
            .bind(&reception_ids)
            .execute(&mut *tx)
            .await?;

        let history: Vec<BatchMembership> = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT batch_id, reception_id, wet_weight_contribution, proportional_dried_weight
            FROM batch_memberships
            WHERE reception_id = ANY($1)
            "#,
        )
        .bind(&reception_ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(BatchMembership::from)
        .collect();

        for reception_id in &reception_ids {
            let dried_weight = cumulative_dried_weight(&history, *reception_id);
            sqlx::query(
                r#"
                UPDATE receptions
                SET dried_weight = $1, updated_at = NOW()
                WHERE id = $2
                "#,
            )
            .bind(dried_weight)
            .bind(reception_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(members = allocations.len(), "Batch completed");

        self.get_batch(batch_id).await
    }

    /// Get a batch with its memberships
    pub async fn get_batch(&self, batch_id: Uuid) -> AppResult<BatchDetail> {
        let row = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM batches WHERE id = $1",
            BATCH_COLUMNS
        ))
        .bind(batch_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Batch".to_string()))?;

        let memberships = sqlx::query_as::<_, MembershipRow>(
            r#"
            SELECT batch_id, reception_id, wet_weight_contribution, proportional_dried_weight
            FROM batch_memberships
            WHERE batch_id = $1
            ORDER BY reception_id
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.db)
        .await?
        .into_iter()
        .map(BatchMembership::from)
        .collect();

        Ok(BatchDetail {
            batch: row.try_into()?,
            memberships,
        })
    }
}

async fn load_contributions<'e, E>(executor: E, batch_id: Uuid) -> AppResult<Vec<MemberContribution>>
where
    E: sqlx::PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, (Uuid, Decimal)>(
        r#"
        SELECT reception_id, wet_weight_contribution
        FROM batch_memberships
        WHERE batch_id = $1
        ORDER BY reception_id
        "#,
    )
    .bind(batch_id)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(reception_id, wet_weight_contribution)| MemberContribution {
            reception_id,
            wet_weight_contribution,
        })
        .collect())
}
