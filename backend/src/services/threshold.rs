//! Threshold registry: per-commodity quality thresholds
//!
//! Thresholds are versioned. An edit inserts a new version row, so discounts
//! computed earlier keep pointing at the schedule that produced them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgExecutor, PgPool};

use crate::error::{AppError, AppResult};
use shared::{validate_commodity_type, validate_percentage, QualityMetric, QualityThreshold};

/// Threshold registry service
#[derive(Clone)]
pub struct ThresholdService {
    db: PgPool,
}

/// Database row for a threshold version
#[derive(Debug, sqlx::FromRow)]
struct ThresholdRow {
    commodity_type: String,
    metric: String,
    threshold_percent: Decimal,
    enabled: bool,
    version: i32,
    created_at: DateTime<Utc>,
}

impl ThresholdRow {
    fn into_threshold(self) -> Option<QualityThreshold> {
        let Some(metric) = QualityMetric::from_str(&self.metric) else {
            tracing::warn!(
                commodity_type = %self.commodity_type,
                metric = %self.metric,
                "Skipping threshold for unknown metric"
            );
            return None;
        };

        Some(QualityThreshold {
            commodity_type: self.commodity_type,
            metric,
            threshold_percent: self.threshold_percent,
            enabled: self.enabled,
            version: self.version,
            created_at: self.created_at,
        })
    }
}

/// Input for publishing a new threshold version
#[derive(Debug, Deserialize)]
pub struct UpdateThresholdInput {
    pub metric: QualityMetric,
    pub threshold_percent: Decimal,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl ThresholdService {
    /// Create a new ThresholdService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Latest version of every metric for a commodity, enabled ones only
    pub async fn get_enabled_thresholds(&self, commodity_type: &str) -> AppResult<Vec<QualityThreshold>> {
        Ok(fetch_enabled_thresholds(&self.db, commodity_type).await?)
    }

    /// Every version of every metric for a commodity, newest first
    pub async fn list_threshold_history(&self, commodity_type: &str) -> AppResult<Vec<QualityThreshold>> {
        let rows = sqlx::query_as::<_, ThresholdRow>(
            r#"
            SELECT commodity_type, metric, threshold_percent, enabled, version, created_at
            FROM quality_thresholds
            WHERE commodity_type = $1
            ORDER BY metric, version DESC
            "#,
        )
        .bind(commodity_type)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().filter_map(ThresholdRow::into_threshold).collect())
    }

    /// Publish a new threshold version for a commodity and metric
    pub async fn update_threshold(
        &self,
        commodity_type: &str,
        input: UpdateThresholdInput,
    ) -> AppResult<QualityThreshold> {
        validate_commodity_type(commodity_type).map_err(|msg| {
            AppError::invalid("commodity_type", msg, "รหัสประเภทผลผลิตไม่ถูกต้อง")
        })?;
        validate_percentage(input.threshold_percent).map_err(|msg| {
            AppError::invalid("threshold_percent", msg, "เกณฑ์ต้องอยู่ระหว่าง 0 ถึง 100%")
        })?;

        let row = sqlx::query_as::<_, ThresholdRow>(
            r#"
            INSERT INTO quality_thresholds (commodity_type, metric, threshold_percent, enabled, version)
            SELECT $1, $2, $3, $4, COALESCE(MAX(version), 0) + 1
            FROM quality_thresholds
            WHERE commodity_type = $1 AND metric = $2
            RETURNING commodity_type, metric, threshold_percent, enabled, version, created_at
            "#,
        )
        .bind(commodity_type)
        .bind(input.metric.as_str())
        .bind(input.threshold_percent)
        .bind(input.enabled)
        .fetch_one(&self.db)
        .await
        .map_err(|e| {
            // Unique (commodity_type, metric, version): a concurrent edit won
            if is_unique_violation(&e) {
                AppError::Conflict {
                    resource: "threshold".to_string(),
                    message: "Threshold was changed concurrently, retry the update".to_string(),
                    message_th: "เกณฑ์ถูกแก้ไขพร้อมกัน กรุณาลองใหม่".to_string(),
                }
            } else {
                AppError::DatabaseError(e)
            }
        })?;

        tracing::info!(
            commodity_type,
            metric = input.metric.as_str(),
            version = row.version,
            "Threshold version published"
        );

        row.into_threshold()
            .ok_or_else(|| AppError::Internal("Inserted threshold has unknown metric".to_string()))
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Latest enabled threshold of every metric, read on the given executor
pub(crate) async fn fetch_enabled_thresholds<'e, E>(
    executor: E,
    commodity_type: &str,
) -> Result<Vec<QualityThreshold>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, ThresholdRow>(
        r#"
        SELECT DISTINCT ON (metric)
               commodity_type, metric, threshold_percent, enabled, version, created_at
        FROM quality_thresholds
        WHERE commodity_type = $1
        ORDER BY metric, version DESC
        "#,
    )
    .bind(commodity_type)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .into_iter()
        .filter_map(ThresholdRow::into_threshold)
        .filter(|t| t.enabled)
        .collect())
}
