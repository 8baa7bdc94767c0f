// Authentication-specific error handling utilities
// Errors raised by the route stages in front of the controller

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Serialize;
use thiserror::Error;

/// A single field that failed input validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Authentication-specific errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),

    #[error("Request body is too large")]
    PayloadTooLarge,

    #[error("Failed to read request body: {0}")]
    InvalidBody(String),

    #[error("Validation failed")]
    ValidationError(Vec<FieldError>),

    #[error("Too many attempts, please try again later")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Missing or invalid authorization header")]
    MissingToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("This action is not available")]
    NotImplemented,
}

/// Standard authentication response structure
#[derive(Debug, Serialize)]
pub struct AuthErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldError>>,
}

impl AuthError {
    /// Convert to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InvalidJson(_) => StatusCode::BAD_REQUEST,
            AuthError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AuthError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            AuthError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::MissingToken => StatusCode::UNAUTHORIZED,
            AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::NotImplemented => StatusCode::NOT_IMPLEMENTED,
        }
    }

    /// Convert to error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::InvalidJson(_) => "INVALID_JSON",
            AuthError::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            AuthError::InvalidBody(_) => "INVALID_BODY",
            AuthError::ValidationError(_) => "VALIDATION_ERROR",
            AuthError::RateLimited { .. } => "RATE_LIMITED",
            AuthError::MissingToken => "MISSING_TOKEN",
            AuthError::TokenExpired => "TOKEN_EXPIRED",
            AuthError::InvalidToken => "INVALID_TOKEN",
            AuthError::NotImplemented => "NOT_IMPLEMENTED",
        }
    }

    /// Get retry_after value if applicable
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            AuthError::RateLimited {
                retry_after_seconds,
            } => Some(*retry_after_seconds),
            _ => None,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let retry_after = self.retry_after();
        let description = self.to_string();
        let code = self.error_code().to_string();
        let fields = match self {
            AuthError::ValidationError(fields) => Some(fields),
            _ => None,
        };

        let body = AuthErrorResponse {
            success: false,
            error: ErrorDetail {
                code,
                description: description.clone(),
                retry_after,
                fields,
            },
            message: description,
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}
