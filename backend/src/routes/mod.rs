//! Route definitions for the reception reconciliation API

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/receptions", reception_routes())
        .nest("/lab-samples", lab_sample_routes())
        .nest("/thresholds", threshold_routes())
        .nest("/batches", batch_routes())
}

/// Reception, field evaluation and sampling routes
fn reception_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::create_reception))
        .route("/:reception_id", get(handlers::get_reception))
        .route("/:reception_id/reconcile", post(handlers::reconcile_reception))
        .route(
            "/:reception_id/field-evaluation",
            get(handlers::get_field_evaluation).put(handlers::record_field_evaluation),
        )
        .route(
            "/:reception_id/field-evaluation/lock",
            post(handlers::lock_field_evaluation),
        )
        .route(
            "/:reception_id/lab-samples",
            get(handlers::list_lab_samples).post(handlers::register_lab_sample),
        )
}

/// Lab sample lifecycle routes
fn lab_sample_routes() -> Router<AppState> {
    Router::new()
        .route("/:sample_id/drying", post(handlers::record_sample_drying))
        .route("/:sample_id/result", post(handlers::enter_sample_result))
}

/// Threshold registry routes
fn threshold_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/:commodity_type",
            get(handlers::get_enabled_thresholds).put(handlers::update_threshold),
        )
        .route("/:commodity_type/history", get(handlers::list_threshold_history))
}

/// Batch blending routes
fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::form_batch))
        .route("/:batch_id", get(handlers::get_batch))
        .route("/:batch_id/complete", post(handlers::complete_batch))
}
