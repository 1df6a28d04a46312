//! Error handling for the inventory ledger
//!
//! One error kind per violated rule; the first violated rule wins and no
//! partial state change ever accompanies an error.

use rust_decimal::Decimal;
use shared::ProductUnit;
use thiserror::Error;

/// Ledger error kinds
#[derive(Error, Debug)]
pub enum AppError {
    // Movement validation errors
    #[error("quantity must be positive with at most 3 decimal places")]
    InvalidQuantity,

    #[error("movement locations do not match the movement type: {detail}")]
    InvalidLocationShape { detail: &'static str },

    #[error("transfer source and destination are the same location")]
    NoOpTransfer,

    #[error("{entity} does not belong to this store")]
    CrossTenantReference { entity: &'static str },

    #[error("insufficient stock at source location: {available} {unit} available")]
    InsufficientStock {
        available: Decimal,
        unit: ProductUnit,
    },

    // Concurrency errors
    #[error("could not lock the affected stock rows in time")]
    Busy,

    // General request errors
    #[error("validation error: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    // Database errors
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    // Internal errors
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code for the embedding API layer.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidQuantity => "INVALID_QUANTITY",
            AppError::InvalidLocationShape { .. } => "INVALID_LOCATION_SHAPE",
            AppError::NoOpTransfer => "NO_OP_TRANSFER",
            AppError::CrossTenantReference { .. } => "CROSS_TENANT_REFERENCE",
            AppError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            AppError::Busy => "BUSY",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Result type alias for ledger operations
pub type AppResult<T> = Result<T, AppError>;

// Postgres codes surfaced while waiting on row locks.
const LOCK_NOT_AVAILABLE: &str = "55P03";
const DEADLOCK_DETECTED: &str = "40P01";

/// Map errors raised while acquiring row locks: a bounded-wait timeout (or a
/// deadlock broken by the server) becomes [`AppError::Busy`]; anything else
/// stays a database error.
pub(crate) fn map_lock_error(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &err {
        if matches!(
            db_err.code().as_deref(),
            Some(LOCK_NOT_AVAILABLE) | Some(DEADLOCK_DETECTED)
        ) {
            return AppError::Busy;
        }
    }
    AppError::Database(err)
}
