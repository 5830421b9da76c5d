//! Error handling for the stock ledger
//!
//! Every failure is request-scoped: the transaction has already rolled back
//! by the time an `AppError` is rendered.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use shared::{ProductTransferStatus, StockError};
use thiserror::Error;
use uuid::Uuid;

/// SQLSTATE raised by Postgres for unique constraint violations
const UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE raised by Postgres for CHECK constraint violations
const CHECK_VIOLATION: &str = "23514";

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Ledger rule violations
    #[error("No bill of materials defined for product {product_id}")]
    NoStructureDefined { product_id: Uuid },

    #[error("Insufficient stock for {entity}: available {available}, requested {requested}")]
    InsufficientStock {
        entity: String,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Insufficient {material}: required {required}, available {available}")]
    InsufficientMaterial {
        material: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("Transfer {transfer_id} already resolved as {status}")]
    AlreadyResolved {
        transfer_id: Uuid,
        status: ProductTransferStatus,
    },

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            match db_err.code().as_deref() {
                Some(UNIQUE_VIOLATION) => {
                    let target = db_err.constraint().unwrap_or("record").to_string();
                    return AppError::DuplicateEntry(target);
                }
                Some(CHECK_VIOLATION) => {
                    let constraint = db_err.constraint().unwrap_or("check").to_string();
                    return AppError::InvalidStateTransition(format!(
                        "Constraint {} would be violated",
                        constraint
                    ));
                }
                _ => {}
            }
        }
        AppError::DatabaseError(err)
    }
}

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::InvalidArgument { field, message } => AppError::Validation { field, message },
            StockError::NotFound { entity, .. } => AppError::NotFound(entity),
            StockError::NoStructureDefined { product_id } => {
                AppError::NoStructureDefined { product_id }
            }
            StockError::InsufficientStock {
                entity,
                available,
                requested,
            } => AppError::InsufficientStock {
                entity,
                available,
                requested,
            },
            StockError::InsufficientMaterial {
                material,
                required,
                available,
            } => AppError::InsufficientMaterial {
                material,
                required,
                available,
            },
            StockError::AlreadyResolved {
                transfer_id,
                status,
            } => AppError::AlreadyResolved {
                transfer_id,
                status,
            },
            err @ StockError::InvalidStateTransition { .. } => {
                AppError::InvalidStateTransition(err.to_string())
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let first = field_errors.iter().next();
        match first {
            Some((field, errs)) => AppError::Validation {
                field: field.to_string(),
                message: errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Invalid value".to_string()),
            },
            None => AppError::ValidationError(errors.to_string()),
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
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    fn new(code: &str, message: String) -> Self {
        Self {
            code: code.to_string(),
            message,
            field: None,
            details: None,
        }
    }
}

impl AppError {
    /// HTTP status and response body for this error
    fn to_status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new("VALIDATION_ERROR", message.clone())
                },
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", msg.clone()),
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new(
                        "DUPLICATE_ENTRY",
                        format!("A record with this {} already exists", field),
                    )
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::NoStructureDefined { product_id } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    details: Some(json!({ "product_id": product_id })),
                    ..ErrorDetail::new("NO_STRUCTURE_DEFINED", self.to_string())
                },
            ),
            AppError::InsufficientStock {
                entity,
                available,
                requested,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    details: Some(json!({
                        "entity": entity,
                        "available": available,
                        "requested": requested,
                    })),
                    ..ErrorDetail::new("INSUFFICIENT_STOCK", self.to_string())
                },
            ),
            AppError::InsufficientMaterial {
                material,
                required,
                available,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    details: Some(json!({
                        "material": material,
                        "required": required,
                        "available": available,
                    })),
                    ..ErrorDetail::new("INSUFFICIENT_MATERIAL", self.to_string())
                },
            ),
            AppError::AlreadyResolved {
                transfer_id,
                status,
            } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    details: Some(json!({ "transfer_id": transfer_id, "status": status })),
                    ..ErrorDetail::new("ALREADY_RESOLVED", self.to_string())
                },
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new("INVALID_STATE_TRANSITION", msg.clone()),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred".to_string()),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.to_status_and_detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_errors_map_to_unprocessable() {
        let err: AppError = StockError::InsufficientStock {
            entity: "Steel".to_string(),
            available: Decimal::from(20),
            requested: Decimal::from(30),
        }
        .into();
        let (status, detail) = err.to_status_and_detail();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(detail.code, "INSUFFICIENT_STOCK");
        let details = detail.details.unwrap();
        assert_eq!(details["entity"], "Steel");
    }

    #[test]
    fn test_already_resolved_is_conflict() {
        let err: AppError = StockError::AlreadyResolved {
            transfer_id: Uuid::nil(),
            status: ProductTransferStatus::Received,
        }
        .into();
        let (status, detail) = err.to_status_and_detail();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(detail.code, "ALREADY_RESOLVED");
    }

    #[test]
    fn test_invalid_argument_keeps_field() {
        let err: AppError = StockError::invalid("quantity", "Quantity must be positive").into();
        let (status, detail) = err.to_status_and_detail();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(detail.field.as_deref(), Some("quantity"));
    }
}
