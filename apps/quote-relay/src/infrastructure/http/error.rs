//! HTTP error responses.
//!
//! Every error leaves the API as `{"error": message}` with a matching status.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::error::ValidationError;
use crate::application::ports::StorageError;
use crate::application::services::AdviceServiceError;

/// Message returned when an advice report cannot be saved.
pub const REPORT_SAVE_FAILED: &str = "Failed to generate and save report.";

/// Message returned when reports cannot be loaded.
pub const REPORT_LOAD_FAILED: &str = "Failed to load reports.";

/// Message returned when usage counters cannot be loaded.
pub const USAGE_LOAD_FAILED: &str = "Failed to load usage.";

/// Error body returned by every endpoint.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
}

/// API error.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Create a bad request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    /// Response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Response message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ValidationError> for ApiError {
    fn from(error: ValidationError) -> Self {
        Self::bad_request(error.to_string())
    }
}

impl From<AdviceServiceError> for ApiError {
    fn from(error: AdviceServiceError) -> Self {
        match error {
            AdviceServiceError::Validation(e) => e.into(),
            AdviceServiceError::Storage(_) => Self::internal(REPORT_SAVE_FAILED),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(_: StorageError) -> Self {
        Self::internal(REPORT_LOAD_FAILED)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}
