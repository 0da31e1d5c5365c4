//! Error types for voxscreen-gateway
//!
//! Every failure leaves the gateway as `{"error": "<message>"}` so callers
//! have a single field to read.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400), rejected before contacting the upstream
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upstream answered with a non-2xx status; relayed with the same status
    #[error("Upstream error {status}: {message}")]
    Upstream { status: StatusCode, message: String },

    /// Upstream unreachable or answered with a body that is not JSON (502)
    #[error("Bad gateway: {0}")]
    BadGateway(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream { status, .. } => *status,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text placed in the `error` field
    pub fn public_message(&self) -> String {
        match self {
            ApiError::BadRequest(msg) | ApiError::BadGateway(msg) | ApiError::Internal(msg) => {
                msg.clone()
            }
            ApiError::Upstream { message, .. } => message.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.public_message(),
        }));

        (self.status(), body).into_response()
    }
}

impl From<voxscreen_common::Error> for ApiError {
    fn from(err: voxscreen_common::Error) -> Self {
        match err {
            voxscreen_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
