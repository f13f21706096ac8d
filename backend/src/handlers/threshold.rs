//! HTTP handlers for the threshold registry

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::AppResult;
use crate::services::threshold::{ThresholdService, UpdateThresholdInput};
use crate::AppState;
use shared::QualityThreshold;

/// Enabled thresholds currently in force for a commodity
pub async fn get_enabled_thresholds(
    State(state): State<AppState>,
    Path(commodity_type): Path<String>,
) -> AppResult<Json<Vec<QualityThreshold>>> {
    let service = ThresholdService::new(state.db);
    let thresholds = service.get_enabled_thresholds(&commodity_type).await?;
    Ok(Json(thresholds))
}

/// Full version history for a commodity
pub async fn list_threshold_history(
    State(state): State<AppState>,
    Path(commodity_type): Path<String>,
) -> AppResult<Json<Vec<QualityThreshold>>> {
    let service = ThresholdService::new(state.db);
    let history = service.list_threshold_history(&commodity_type).await?;
    Ok(Json(history))
}

/// Publish a new threshold version
pub async fn update_threshold(
    State(state): State<AppState>,
    Path(commodity_type): Path<String>,
    Json(input): Json<UpdateThresholdInput>,
) -> AppResult<Json<QualityThreshold>> {
    let service = ThresholdService::new(state.db);
    let threshold = service.update_threshold(&commodity_type, input).await?;
    Ok(Json(threshold))
}
