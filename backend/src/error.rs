//! Error handling for the reconciliation server
//!
//! Provides consistent error responses in Thai and English

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::EngineError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_th: String,
    },

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_th: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    /// Computed weights would be inconsistent; nothing was written
    #[error("Data integrity violation: {0}")]
    DataIntegrity(#[source] EngineError),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Validation error from a shared validator message
    pub fn invalid(field: &str, message: &str, message_th: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_th: message_th.to_string(),
        }
    }
}

impl From<EngineError> for AppError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidInput { field, message } => AppError::Validation {
                field: field.to_string(),
                message_th: format!("ข้อมูลไม่ถูกต้อง: {}", message),
                message,
            },
            other => AppError::DataIntegrity(other),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_default();
        AppError::Validation {
            field,
            message: errors.to_string(),
            message_th: format!("ข้อมูลไม่ถูกต้อง: {}", errors),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_th: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Validation { field, message, message_th } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_th: message_th.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::Conflict { resource, message, message_th } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "CONFLICT".to_string(),
                    message_en: message.clone(),
                    message_th: message_th.clone(),
                    field: Some(resource.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_th: format!("ไม่พบ {}", resource),
                    field: None,
                },
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INVALID_STATE_TRANSITION".to_string(),
                    message_en: msg.clone(),
                    message_th: format!("ไม่สามารถเปลี่ยนสถานะได้: {}", msg),
                    field: None,
                },
            ),
            AppError::DataIntegrity(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "DATA_INTEGRITY_VIOLATION".to_string(),
                    message_en: err.to_string(),
                    message_th: format!("ข้อมูลน้ำหนักไม่สอดคล้องกัน ไม่มีการบันทึก: {}", err),
                    field: None,
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message_en: "A database error occurred".to_string(),
                    message_th: "เกิดข้อผิดพลาดกับฐานข้อมูล".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_th: "เกิดข้อผิดพลาดภายในเซิร์ฟเวอร์".to_string(),
                    field: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: "An internal server error occurred".to_string(),
                    message_th: "เกิดข้อผิดพลาดภายในเซิร์ฟเวอร์".to_string(),
                    field: None,
                },
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn test_engine_integrity_errors_map_to_data_integrity() {
        let err: AppError = EngineError::ZeroDenominator {
            total: Decimal::ZERO,
        }
        .into();
        assert!(matches!(err, AppError::DataIntegrity(_)));
        assert_eq!(
            err.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_engine_invalid_input_maps_to_validation() {
        let err: AppError = EngineError::InvalidInput {
            field: "total_dried_weight",
            message: "must not be negative".to_string(),
        }
        .into();
        match err {
            AppError::Validation { field, .. } => assert_eq!(field, "total_dried_weight"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
