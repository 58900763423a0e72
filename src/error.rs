//! Error codes and HTTP error responses.
//!
//! DESIGN
//! ======
//! Every module owns a `thiserror` enum. Each enum implements [`ErrorCode`]
//! so route handlers can report a stable machine-readable code next to the
//! human message. [`ApiError`] is the single conversion point from domain
//! errors to axum responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Stable error code + retry hint shared by all domain errors.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// API ERROR
// =============================================================================

/// Error returned by HTTP handlers.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    code: &'a str,
    retryable: bool,
}

impl ApiError {
    /// Build an API error from any domain error with an explicit status.
    pub fn from_code(status: StatusCode, err: &impl ErrorCode) -> Self {
        Self { status, code: err.error_code(), message: err.to_string(), retryable: err.retryable() }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, code: "E_BAD_REQUEST", message: message.into(), retryable: false }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self { status: StatusCode::NOT_FOUND, code: "E_NOT_FOUND", message: message.into(), retryable: false }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody { error: &self.message, code: self.code, retryable: self.retryable };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("boom")]
    struct Boom;

    impl ErrorCode for Boom {
        fn error_code(&self) -> &'static str {
            "E_BOOM"
        }
    }

    #[test]
    fn from_code_copies_code_and_message() {
        let err = ApiError::from_code(StatusCode::CONFLICT, &Boom);
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.code, "E_BOOM");
        assert_eq!(err.message, "boom");
        assert!(!err.retryable);
    }

    #[test]
    fn into_response_uses_status() {
        let resp = ApiError::not_found("gone").into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
