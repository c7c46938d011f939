//! # API Errors
//!
//! Every handler failure funnels through [`ApiError`]; the status mapping
//! lives in one place.
//!
//! 5xx bodies carry a fixed message per kind. The cause is logged, never
//! returned to the client.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::geonames::StoreError;

/// Result type for handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Generic message for unexpected server-side failures
pub const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";

/// Message returned when the store could not be set up
pub const INITIALIZATION_FAILED: &str = "Database initialization failed";

/// API errors
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    // ==================
    // Client Errors (4xx)
    // ==================
    /// Well-formed query with no matching rows
    #[error("{0}")]
    NotFound(String),

    /// Query parameters could not be parsed
    #[error("Invalid query parameters: {0}")]
    InvalidQuery(String),

    // ==================
    // Server Errors (5xx)
    // ==================
    /// Store setup failed or the handle was released
    #[error("Database initialization failed: {0}")]
    Initialization(String),

    /// A raw record did not fit the response schema
    #[error("Invalid location record: {0}")]
    Validation(String),

    /// A store query failed
    #[error("Store error: {0}")]
    Store(String),
}

impl ApiError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidQuery(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Initialization(_) | ApiError::Validation(_) | ApiError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to hand to clients
    pub fn public_detail(&self) -> String {
        match self {
            ApiError::NotFound(message) => message.clone(),
            ApiError::InvalidQuery(_) => self.to_string(),
            ApiError::Initialization(_) => INITIALIZATION_FAILED.to_string(),
            ApiError::Validation(_) | ApiError::Store(_) => INTERNAL_SERVER_ERROR.to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err.to_string())
    }
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl From<&ApiError> for ErrorBody {
    fn from(err: &ApiError) -> Self {
        Self {
            detail: err.public_detail(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(ErrorBody::from(&self))).into_response()
    }
}
