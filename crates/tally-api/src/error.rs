//! API error types and HTTP response mapping.
//!
//! Error bodies keep the shape the order form expects:
//! `{"success": false, "message": "..."}`. Messages are generic and safe to
//! show; details go to the logs.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use tally_queue::{AllocationError, MergeError};

/// API result type.
pub type ApiResult<T> = Result<T, ApiError>;

/// Message for a missing or blank order category.
pub const INVALID_FORM_MESSAGE: &str = "Invalid form data.";

/// Message for a failed ticket allocation.
pub const ALLOCATION_FAILED_MESSAGE: &str = "Failed to generate Form ID.";

/// Message for a failed manual merge.
pub const COMBINE_FAILED_MESSAGE: &str = "Failed to combine sheets.";

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Always `false`.
    pub success: bool,
    /// Human-readable message (safe for clients).
    pub message: String,
}

/// HTTP API error.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    /// Returns an error response for invalid input.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Returns an internal error response.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    /// Returns an error response for an unavailable dependency.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// Returns the response for a missing or blank category.
    #[must_use]
    pub fn invalid_form() -> Self {
        Self::bad_request(INVALID_FORM_MESSAGE)
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the human-readable error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ApiErrorBody {
                success: false,
                message: self.message,
            }),
        )
            .into_response()
    }
}

impl From<AllocationError> for ApiError {
    fn from(value: AllocationError) -> Self {
        match value {
            AllocationError::InvalidInput { .. } => Self::invalid_form(),
            AllocationError::StoreUnavailable { .. } | AllocationError::AllocationConflict { .. } => {
                Self::internal(ALLOCATION_FAILED_MESSAGE)
            }
        }
    }
}

impl From<MergeError> for ApiError {
    fn from(_: MergeError) -> Self {
        Self::internal(COMBINE_FAILED_MESSAGE)
    }
}
