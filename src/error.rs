// error.rs
// Application error kinds and their HTTP mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Failure kinds surfaced by the state layer. Multi-step ledger operations
/// abort before any partial write is committed; callers receive the
/// original cause unmodified and nothing is retried.
#[derive(Debug, Error)]
pub enum AppError {
    /// No authenticated actor for an operation that stamps attribution.
    #[error("authentication required")]
    Unauthenticated,

    /// Referenced sale, product or user does not exist.
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    /// A stock debit would drive a product's stock negative.
    #[error("insufficient stock for \"{product}\": requested {requested}, available {available}")]
    InsufficientStock {
        product: String,
        requested: i64,
        available: i64,
    },

    /// Malformed input, e.g. an empty product list or a bad identifier.
    #[error("{0}")]
    Validation(String),

    /// Underlying document store failure, not recoverable locally.
    #[error("document store error: {0}")]
    Store(#[from] mongodb::error::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::Validation(msg.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::InsufficientStock { .. } => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Store(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
