//! Database-backed tests for the reconciliation and batch services
//!
//! Each test gets a fresh database with `fixtures/schema.sql` applied.
//! Run with: DATABASE_URL=postgres://... cargo test --test persistence_tests -- --ignored

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use recon_backend::config::{Config, DatabaseConfig, EngineConfig, ServerConfig};
use recon_backend::error::AppError;
use recon_backend::handlers;
use recon_backend::services::batch::{BatchService, CompleteBatchInput, FormBatchInput};
use recon_backend::services::measurement::{
    MeasurementService, RecordFieldEvaluationInput, RegisterLabSampleInput,
};
use recon_backend::services::reception::{CreateReceptionInput, ReceptionService};
use recon_backend::services::reconciliation::ReconciliationService;
use recon_backend::services::threshold::{ThresholdService, UpdateThresholdInput};
use recon_backend::AppState;
use rust_decimal::Decimal;
use shared::{DeductionOverflowPolicy, MemberContribution, QualityMetric};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

/// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn app_state(pool: PgPool) -> AppState {
    AppState {
        db: pool,
        config: Arc::new(Config {
            environment: "test".to_string(),
            server: ServerConfig {
                port: 0,
                host: "127.0.0.1".to_string(),
                request_timeout_secs: 30,
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 5,
                min_connections: 0,
                acquire_timeout_secs: 5,
            },
            engine: EngineConfig::default(),
        }),
    }
}

async fn new_reception(pool: &PgPool, lines: &[&str]) -> Uuid {
    ReceptionService::new(pool.clone())
        .create_reception(CreateReceptionInput {
            commodity_type: "cocoa".to_string(),
            weight_lines: lines.iter().map(|w| dec(w)).collect(),
        })
        .await
        .unwrap()
        .reception
        .id
}

// =============================================================================
// Reconciliation
// =============================================================================

mod reconciliation {
    use super::*;

    #[sqlx::test(migrations = false, fixtures("schema"))]
    #[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
    async fn registering_a_sample_deducts_its_wet_weight(pool: PgPool) {
        let reception_id = new_reception(&pool, &["100"]).await;

        let (status, Json(response)) = handlers::register_lab_sample(
            State(app_state(pool.clone())),
            Path(reception_id),
            Json(RegisterLabSampleInput {
                wet_weight: dec("5"),
            }),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(response.reconciliation.final_weight, dec("95"));

        let stored = ReceptionService::new(pool)
            .get_reception(reception_id)
            .await
            .unwrap()
            .reception;
        assert_eq!(stored.lab_sample_wet_weight, dec("5"));
        assert_eq!(stored.final_weight, dec("95"));
    }

    #[sqlx::test(migrations = false, fixtures("schema"))]
    #[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
    async fn discount_applies_with_a_single_pooled_connection(pool: PgPool) {
        let reception_id = new_reception(&pool, &["60", "40"]).await;
        ThresholdService::new(pool.clone())
            .update_threshold(
                "cocoa",
                UpdateThresholdInput {
                    metric: QualityMetric::Humidity,
                    threshold_percent: dec("7"),
                    enabled: true,
                },
            )
            .await
            .unwrap();
        MeasurementService::new(pool.clone())
            .record_field_evaluation(
                reception_id,
                RecordFieldEvaluationInput {
                    measurements: BTreeMap::from([(QualityMetric::Humidity, dec("9"))]),
                },
            )
            .await
            .unwrap();

        // The transaction holds the only connection; every read must reuse it
        let single = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(2))
            .connect_with((*pool.connect_options()).clone())
            .await
            .unwrap();

        let outcome = ReconciliationService::new(single, DeductionOverflowPolicy::ClampWithWarning)
            .reconcile(reception_id)
            .await
            .unwrap();

        assert_eq!(outcome.quality_source, Some("field_evaluation"));
        assert_eq!(outcome.quality_discount, dec("2"));
        assert_eq!(outcome.final_weight, dec("98"));
        assert_eq!(outcome.breakdown_lines, 1);
    }
}

// =============================================================================
// Batch completion
// =============================================================================

mod batch_completion {
    use super::*;

    async fn stored_allocations(pool: &PgPool, batch_id: Uuid) -> Vec<Option<Decimal>> {
        sqlx::query_scalar(
            "SELECT proportional_dried_weight FROM batch_memberships WHERE batch_id = $1 ORDER BY reception_id",
        )
        .bind(batch_id)
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[sqlx::test(migrations = false, fixtures("schema"))]
    #[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
    async fn zero_wet_total_writes_nothing(pool: PgPool) {
        let reception_id = new_reception(&pool, &["10"]).await;

        // Formation refuses zero contributions, so the bad rows go in directly
        let batch_id: Uuid = sqlx::query_scalar(
            "INSERT INTO batches (total_wet_weight, status) VALUES (0, 'in_progress') RETURNING id",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO batch_memberships (batch_id, reception_id, wet_weight_contribution) VALUES ($1, $2, 0)",
        )
        .bind(batch_id)
        .bind(reception_id)
        .execute(&pool)
        .await
        .unwrap();

        let err = BatchService::new(pool.clone())
            .complete_batch(
                batch_id,
                CompleteBatchInput {
                    total_dried_weight: dec("5"),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::DataIntegrity(_)));
        assert_eq!(stored_allocations(&pool, batch_id).await, vec![None]);

        let batch = BatchService::new(pool.clone()).get_batch(batch_id).await.unwrap();
        assert_eq!(batch.batch.status.as_str(), "in_progress");
        assert_eq!(batch.batch.total_dried_weight, None);
    }

    #[sqlx::test(migrations = false, fixtures("schema"))]
    #[ignore = "Requires a PostgreSQL database (DATABASE_URL)"]
    async fn second_completion_is_refused(pool: PgPool) {
        let first = new_reception(&pool, &["60"]).await;
        let second = new_reception(&pool, &["40"]).await;
        let service = BatchService::new(pool.clone());

        let batch_id = service
            .form_batch(FormBatchInput {
                members: vec![
                    MemberContribution {
                        reception_id: first,
                        wet_weight_contribution: dec("60"),
                    },
                    MemberContribution {
                        reception_id: second,
                        wet_weight_contribution: dec("40"),
                    },
                ],
            })
            .await
            .unwrap()
            .batch
            .id;

        service
            .complete_batch(
                batch_id,
                CompleteBatchInput {
                    total_dried_weight: dec("35"),
                },
            )
            .await
            .unwrap();
        let before = stored_allocations(&pool, batch_id).await;

        let err = service
            .complete_batch(
                batch_id,
                CompleteBatchInput {
                    total_dried_weight: dec("50"),
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::InvalidStateTransition(_)));
        assert_eq!(stored_allocations(&pool, batch_id).await, before);

        let first_dried = ReceptionService::new(pool)
            .get_reception(first)
            .await
            .unwrap()
            .reception
            .dried_weight;
        assert_eq!(first_dried, dec("21"));
    }
}
