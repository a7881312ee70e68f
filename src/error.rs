use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

/// Crate-level error, the single type the HTTP API maps to a response.
///
/// Per-module errors (calculator, repositories, alert evaluator) convert
/// into this at the orchestrator/API boundary via `#[from]`, funneling
/// every failure mode into one response-mappable type.
#[derive(Error, Debug)]
pub enum WaterBalanceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate code: {0}")]
    DuplicateCode(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("input format error: {0}")]
    InputFormat(String),

    #[error("storage backend error: {0}")]
    StorageBackendError(String),

    #[error("queue full, record dropped")]
    QuotaExceeded,

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl IntoResponse for WaterBalanceError {
    fn into_response(self) -> Response {
        let status = match &self {
            WaterBalanceError::NotFound(_) => StatusCode::NOT_FOUND,
            WaterBalanceError::DuplicateCode(_) => StatusCode::CONFLICT,
            WaterBalanceError::InvariantViolation(_) | WaterBalanceError::InputFormat(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            WaterBalanceError::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            WaterBalanceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            WaterBalanceError::StorageBackendError(_)
            | WaterBalanceError::Database(_)
            | WaterBalanceError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<crate::calculator::CalculatorError> for WaterBalanceError {
    fn from(err: crate::calculator::CalculatorError) -> Self {
        match err {
            crate::calculator::CalculatorError::InputFormat(msg) => {
                WaterBalanceError::InputFormat(msg)
            }
            crate::calculator::CalculatorError::Io(e) => WaterBalanceError::Io(e),
        }
    }
}

impl From<crate::workbook::WorkbookError> for WaterBalanceError {
    fn from(err: crate::workbook::WorkbookError) -> Self {
        match err {
            crate::workbook::WorkbookError::NotAFile(path) => {
                WaterBalanceError::InputFormat(format!("workbook path is not a file: {path}"))
            }
            crate::workbook::WorkbookError::OpenFailed(msg) => {
                WaterBalanceError::InputFormat(format!("failed to open workbook: {msg}"))
            }
        }
    }
}

impl From<crate::db::DbError> for WaterBalanceError {
    fn from(err: crate::db::DbError) -> Self {
        match err {
            crate::db::DbError::SqlxError(e) => WaterBalanceError::Database(e),
            crate::db::DbError::NotFound(msg) => WaterBalanceError::NotFound(msg),
            crate::db::DbError::DuplicateCode(msg) => WaterBalanceError::DuplicateCode(msg),
            crate::db::DbError::InvariantViolation(msg) => {
                WaterBalanceError::InvariantViolation(msg)
            }
        }
    }
}

impl From<crate::workbook::SheetError> for WaterBalanceError {
    fn from(err: crate::workbook::SheetError) -> Self {
        match err {
            crate::workbook::SheetError::SheetNotFound(name) => {
                WaterBalanceError::InputFormat(format!("required sheet not found: {name}"))
            }
            crate::workbook::SheetError::Workbook(inner) => inner.into(),
        }
    }
}
