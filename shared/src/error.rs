//! Failures raised by the pure ledger planners

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::ProductTransferStatus;

/// Stock rule violations. Each carries enough detail for the caller to
/// render a precise message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StockError {
    #[error("Invalid argument `{field}`: {message}")]
    InvalidArgument { field: String, message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: Uuid },

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

    #[error("Transfer {transfer_id} is already {status}")]
    AlreadyResolved {
        transfer_id: Uuid,
        status: ProductTransferStatus,
    },

    #[error("Cannot move {entity} from {from} to {to}")]
    InvalidStateTransition {
        entity: String,
        from: String,
        to: String,
    },
}

impl StockError {
    pub fn invalid(field: &str, message: &str) -> Self {
        StockError::InvalidArgument {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}
