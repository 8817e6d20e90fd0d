//! Error handling for the HTTP surface

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::ledger::responses::ErrorResponse;
use crate::ledger::LedgerError;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),
}

impl AppError {
    /// Stable machine-readable kind, one per error variant.
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Ledger(LedgerError::InvalidInput(_)) => "invalid_input",
            AppError::Ledger(LedgerError::InvalidInstalments(_)) => "invalid_instalments",
            AppError::Ledger(LedgerError::NotVerified) => "not_verified",
            AppError::Ledger(LedgerError::AlreadyConverted { .. }) => "already_converted",
            AppError::Ledger(LedgerError::NotFound { .. }) => "not_found",
            AppError::Ledger(LedgerError::Storage(_)) => "storage_error",
            AppError::Unauthorized(_) => "unauthorized",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Ledger(LedgerError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            AppError::Ledger(LedgerError::InvalidInstalments(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Ledger(LedgerError::NotVerified) => StatusCode::PRECONDITION_REQUIRED,
            AppError::Ledger(LedgerError::AlreadyConverted { .. }) => StatusCode::CONFLICT,
            AppError::Ledger(LedgerError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Ledger(LedgerError::Storage(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (message, details) = match &self {
            AppError::Ledger(LedgerError::Storage(e)) => {
                tracing::error!("Storage error: {}", e);
                ("Storage is unavailable, please retry".to_string(), None)
            }
            AppError::Ledger(LedgerError::AlreadyConverted { query_id }) => (
                self.to_string(),
                Some(serde_json::json!({ "query_id": query_id })),
            ),
            other => (other.to_string(), None),
        };

        let body = ErrorResponse {
            error_type: self.error_type().to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StorageError;
    use uuid::Uuid;

    #[test]
    fn test_each_kind_has_distinct_status() {
        let cases = [
            (
                AppError::from(LedgerError::InvalidInput("x".to_string())),
                StatusCode::BAD_REQUEST,
                "invalid_input",
            ),
            (
                AppError::from(LedgerError::InvalidInstalments("x".to_string())),
                StatusCode::UNPROCESSABLE_ENTITY,
                "invalid_instalments",
            ),
            (
                AppError::from(LedgerError::NotVerified),
                StatusCode::PRECONDITION_REQUIRED,
                "not_verified",
            ),
            (
                AppError::from(LedgerError::AlreadyConverted {
                    query_id: Uuid::nil(),
                }),
                StatusCode::CONFLICT,
                "already_converted",
            ),
            (
                AppError::from(LedgerError::Storage(StorageError::Backend(
                    "timeout".to_string(),
                ))),
                StatusCode::SERVICE_UNAVAILABLE,
                "storage_error",
            ),
            (
                AppError::Unauthorized("missing bearer token"),
                StatusCode::UNAUTHORIZED,
                "unauthorized",
            ),
        ];

        for (err, status, kind) in cases {
            assert_eq!(err.status(), status);
            assert_eq!(err.error_type(), kind);
            assert_eq!(err.into_response().status(), status);
        }
    }
}
