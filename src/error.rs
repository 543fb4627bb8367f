use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::models::courier::CourierType;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("courier type {0} is not registered")]
    UnknownCourierType(CourierType),

    #[error("order {order_id} is not recorded against courier {courier_id}")]
    OwnershipMismatch { order_id: i64, courier_id: i64 },

    #[error("invalid date range: {0}")]
    DateRange(String),

    #[error("arithmetic overflow: {0}")]
    Overflow(String),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_)
            | AppError::UnknownCourierType(_)
            | AppError::OwnershipMismatch { .. }
            | AppError::DateRange(_)
            | AppError::Storage(StorageError::Constraint(_)) => StatusCode::BAD_REQUEST,
            AppError::Overflow(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::Storage(StorageError::Backend(_)) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
