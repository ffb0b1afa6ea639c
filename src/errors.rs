use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::BookingStatus;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("cannot {action} a booking that is {status}")]
    InvalidTransition {
        action: &'static str,
        status: BookingStatus,
    },

    #[error("insufficient coins: {required} required, {available} available")]
    InsufficientFunds { required: i64, available: i64 },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("ledger failure: {0}")]
    Ledger(String),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Internal(_) => "internal",
            AppError::Unauthorized => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::BadRequest(_) => "invalid_request",
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::InsufficientFunds { .. } => "insufficient_funds",
            AppError::Conflict(_) => "conflict",
            AppError::Ledger(_) => "ledger_failure",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::Internal(_) | AppError::Ledger(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidTransition { .. } | AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            AppError::InsufficientFunds {
                required,
                available,
            } => serde_json::json!({
                "error": self.to_string(),
                "code": self.code(),
                "required": required,
                "available": available,
            }),
            AppError::Database(e) => {
                tracing::error!(error = %e, "database error");
                serde_json::json!({ "error": "internal error", "code": self.code() })
            }
            AppError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                serde_json::json!({ "error": "internal error", "code": self.code() })
            }
            AppError::Ledger(details) => {
                tracing::error!(details = %details, "ledger failure");
                serde_json::json!({
                    "error": "ledger failure",
                    "code": self.code(),
                    "details": details,
                })
            }
            _ => serde_json::json!({ "error": self.to_string(), "code": self.code() }),
        };

        (status, axum::Json(body)).into_response()
    }
}
