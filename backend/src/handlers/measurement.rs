//! HTTP handlers for field evaluation and lab sample endpoints
//!
//! Each quality write is followed by a reconciliation of the reception, and
//! the response carries both the stored record and the new weights.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::measurement::{
    EnterSampleResultInput, MeasurementService, RecordFieldEvaluationInput,
    RecordSampleDryingInput, RegisterLabSampleInput,
};
use crate::services::reconciliation::{ReconciliationOutcome, ReconciliationService};
use crate::AppState;
use shared::{FieldEvaluation, LabSample};

/// A quality record together with the reconciliation it triggered
#[derive(Debug, Serialize)]
pub struct QualityEventResponse<T> {
    pub record: T,
    pub reconciliation: ReconciliationOutcome,
}

async fn reconcile_after<T>(
    state: &AppState,
    reception_id: Uuid,
    record: T,
) -> AppResult<Json<QualityEventResponse<T>>> {
    let reconciler =
        ReconciliationService::new(state.db.clone(), state.config.engine.deduction_overflow_policy);
    let reconciliation = reconciler.reconcile(reception_id).await?;
    Ok(Json(QualityEventResponse {
        record,
        reconciliation,
    }))
}

/// Get the field evaluation of a reception
pub async fn get_field_evaluation(
    State(state): State<AppState>,
    Path(reception_id): Path<Uuid>,
) -> AppResult<Json<Option<FieldEvaluation>>> {
    let service = MeasurementService::new(state.db);
    let evaluation = service.get_field_evaluation(reception_id).await?;
    Ok(Json(evaluation))
}

/// Record or replace the field evaluation of a reception
pub async fn record_field_evaluation(
    State(state): State<AppState>,
    Path(reception_id): Path<Uuid>,
    Json(input): Json<RecordFieldEvaluationInput>,
) -> AppResult<Json<QualityEventResponse<FieldEvaluation>>> {
    let service = MeasurementService::new(state.db.clone());
    let evaluation = service.record_field_evaluation(reception_id, input).await?;
    reconcile_after(&state, reception_id, evaluation).await
}

/// Lock the field evaluation against further edits
pub async fn lock_field_evaluation(
    State(state): State<AppState>,
    Path(reception_id): Path<Uuid>,
) -> AppResult<Json<FieldEvaluation>> {
    let service = MeasurementService::new(state.db);
    let evaluation = service.lock_field_evaluation(reception_id).await?;
    Ok(Json(evaluation))
}

/// List lab samples of a reception
pub async fn list_lab_samples(
    State(state): State<AppState>,
    Path(reception_id): Path<Uuid>,
) -> AppResult<Json<Vec<LabSample>>> {
    let service = MeasurementService::new(state.db);
    let samples = service.list_lab_samples(reception_id).await?;
    Ok(Json(samples))
}

/// Register a lab sample taken from a reception
///
/// The sample's wet weight leaves the reception at once, so this is a
/// quality event like the others.
pub async fn register_lab_sample(
    State(state): State<AppState>,
    Path(reception_id): Path<Uuid>,
    Json(input): Json<RegisterLabSampleInput>,
) -> AppResult<(StatusCode, Json<QualityEventResponse<LabSample>>)> {
    let service = MeasurementService::new(state.db.clone());
    let sample = service.register_lab_sample(reception_id, input).await?;
    let response = reconcile_after(&state, reception_id, sample).await?;
    Ok((StatusCode::CREATED, response))
}

/// Record the dried weight of a lab sample
pub async fn record_sample_drying(
    State(state): State<AppState>,
    Path(sample_id): Path<Uuid>,
    Json(input): Json<RecordSampleDryingInput>,
) -> AppResult<Json<QualityEventResponse<LabSample>>> {
    let service = MeasurementService::new(state.db.clone());
    let sample = service.record_sample_drying(sample_id, input).await?;
    reconcile_after(&state, sample.reception_id, sample).await
}

/// Enter the defect results of a lab sample
pub async fn enter_sample_result(
    State(state): State<AppState>,
    Path(sample_id): Path<Uuid>,
    Json(input): Json<EnterSampleResultInput>,
) -> AppResult<Json<QualityEventResponse<LabSample>>> {
    let service = MeasurementService::new(state.db.clone());
    let sample = service.enter_sample_result(sample_id, input).await?;
    reconcile_after(&state, sample.reception_id, sample).await
}
