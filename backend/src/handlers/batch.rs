//! HTTP handlers for batch blending endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::batch::{BatchDetail, BatchService, CompleteBatchInput, FormBatchInput};
use crate::AppState;

/// Form a batch from reception contributions
pub async fn form_batch(
    State(state): State<AppState>,
    Json(input): Json<FormBatchInput>,
) -> AppResult<(StatusCode, Json<BatchDetail>)> {
    let service = BatchService::new(state.db);
    let batch = service.form_batch(input).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

/// Get a batch with its memberships
pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> AppResult<Json<BatchDetail>> {
    let service = BatchService::new(state.db);
    let batch = service.get_batch(batch_id).await?;
    Ok(Json(batch))
}

/// Complete a batch and apportion its dried weight
pub async fn complete_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
    Json(input): Json<CompleteBatchInput>,
) -> AppResult<Json<BatchDetail>> {
    let service = BatchService::new(state.db);
    let batch = service.complete_batch(batch_id, input).await?;
    Ok(Json(batch))
}
