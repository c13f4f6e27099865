//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::models::token::ConsumeRejection;

/// Application-wide error type.
///
/// # Error Categories
///
/// - **Input Errors**: request shape is wrong, rejected before any store access
/// - **Infrastructure Errors**: the token store could not be reached; retryable
/// - **Token Errors**: terminal outcomes for the presented token, the student
///   must obtain a new one
/// - **Authentication Errors**: invalid or missing API keys
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Request body or parameters are invalid.
    ///
    /// Returns HTTP 400 Bad Request.
    /// The String contains details about what was invalid.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Token store operation failed (connection error, query error).
    ///
    /// Never reported as a missing token. Returns HTTP 500 and hides the cause.
    #[error("Token store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),

    /// No token of the requested class exists under this value.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("Invalid QR code")]
    TokenNotFound,

    /// The token's validity window has passed.
    ///
    /// Returns HTTP 400 Bad Request.
    #[error("QR code has expired, please generate a new code")]
    TokenExpired,

    /// The token belongs to a different student.
    ///
    /// Returns HTTP 403 Forbidden.
    #[error("QR code belongs to another student")]
    StudentMismatch,

    /// The token has already been consumed.
    ///
    /// Returns HTTP 409 Conflict.
    #[error("QR code has already been used")]
    TokenAlreadyUsed,

    /// Every freshly drawn token collided with an existing record.
    #[error("Could not allocate a unique token")]
    TokenSpaceExhausted,

    /// API key is missing or not in the accepted list.
    ///
    /// Returns HTTP 401 Unauthorized.
    #[error("Invalid API key")]
    InvalidApiKey,
}

impl AppError {
    /// Stable machine-readable code sent to clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidArgument(_) => "invalid_argument",
            AppError::StoreUnavailable(_) => "store_unavailable",
            AppError::TokenNotFound => "token_not_found",
            AppError::TokenExpired => "token_expired",
            AppError::StudentMismatch => "student_mismatch",
            AppError::TokenAlreadyUsed => "token_already_used",
            AppError::TokenSpaceExhausted => "token_space_exhausted",
            AppError::InvalidApiKey => "invalid_api_key",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidArgument(_) | AppError::TokenExpired => StatusCode::BAD_REQUEST,
            AppError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            AppError::StudentMismatch => StatusCode::FORBIDDEN,
            AppError::TokenNotFound => StatusCode::NOT_FOUND,
            AppError::TokenAlreadyUsed => StatusCode::CONFLICT,
            AppError::StoreUnavailable(_) | AppError::TokenSpaceExhausted => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ConsumeRejection> for AppError {
    fn from(rejection: ConsumeRejection) -> Self {
        match rejection {
            ConsumeRejection::Expired => AppError::TokenExpired,
            ConsumeRejection::StudentMismatch => AppError::StudentMismatch,
            ConsumeRejection::AlreadyUsed => AppError::TokenAlreadyUsed,
        }
    }
}

/// Malformed JSON bodies are reported like any other bad input.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidArgument(rejection.body_text())
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "success": false,
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::InvalidArgument(msg) => msg.clone(),
            AppError::StoreUnavailable(e) => {
                tracing::error!(error = %e, "token store operation failed");
                "The service is temporarily unavailable, please retry".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "code": self.code(),
                "message": message
            }
        }));

        (self.status(), body).into_response()
    }
}
