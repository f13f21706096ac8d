//! HTTP handlers for reception endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::reception::{CreateReceptionInput, ReceptionDetail, ReceptionService};
use crate::services::reconciliation::{ReconciliationOutcome, ReconciliationService};
use crate::AppState;

/// Record a reception from its intake weight lines
pub async fn create_reception(
    State(state): State<AppState>,
    Json(input): Json<CreateReceptionInput>,
) -> AppResult<(StatusCode, Json<ReceptionDetail>)> {
    let service = ReceptionService::new(state.db);
    let reception = service.create_reception(input).await?;
    Ok((StatusCode::CREATED, Json(reception)))
}

/// Get a reception with its discount breakdown
pub async fn get_reception(
    State(state): State<AppState>,
    Path(reception_id): Path<Uuid>,
) -> AppResult<Json<ReceptionDetail>> {
    let service = ReceptionService::new(state.db);
    let reception = service.get_reception(reception_id).await?;
    Ok(Json(reception))
}

/// Re-run reconciliation on demand
pub async fn reconcile_reception(
    State(state): State<AppState>,
    Path(reception_id): Path<Uuid>,
) -> AppResult<Json<ReconciliationOutcome>> {
    let service = ReconciliationService::new(state.db, state.config.engine.deduction_overflow_policy);
    let outcome = service.reconcile(reception_id).await?;
    Ok(Json(outcome))
}
