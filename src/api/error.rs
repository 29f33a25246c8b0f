use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

use crate::jobs::{OrchestratorError, SubmitError};
use crate::store::StoreError;

use super::models::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("payload invalid: {0}")]
    InvalidPayload(String),

    #[error("{0}")]
    UnreachableSource(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
            ApiError::UnreachableSource(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidPayload(_) => "INVALID_PAYLOAD",
            ApiError::UnreachableSource(_) => "UNREACHABLE_SOURCE",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::NotImplemented(_) => "NOT_IMPLEMENTED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        // Internal errors carry the trace payload; fine for an internal
        // tool, revisit before exposing this publicly
        let body = match &self {
            ApiError::Internal(trace) => json!({
                "code": self.code(),
                "message": self.to_string(),
                "traceback": trace,
            }),
            _ => json!(ErrorResponse {
                code: self.code(),
                message: self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        ApiError::InvalidPayload(value.to_string())
    }
}

impl From<SubmitError> for ApiError {
    fn from(value: SubmitError) -> Self {
        match &value {
            SubmitError::UnreachableSource(_) => ApiError::UnreachableSource(value.to_string()),
            SubmitError::MalformedDocument(_) => ApiError::InvalidPayload(value.to_string()),
            SubmitError::Internal(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(value: OrchestratorError) -> Self {
        ApiError::Internal(value.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        ApiError::Internal(value.to_string())
    }
}
