//! Serves published execution documents to isolated realms.
//!
//! Every response carries the isolation policy as a CSP `sandbox`
//! directive, so a document opened directly (outside its iframe) is still
//! confined to an opaque origin.

use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_SECURITY_POLICY, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

/// `GET /sandbox/:token` — the realm document, or 404 once revoked.
pub async fn serve_document(State(state): State<AppState>, Path(token): Path<String>) -> Response {
    let Some(html) = state.documents.get(&token) else {
        return ApiError::not_found("sandbox document not found").into_response();
    };
    let csp = state.sandbox.policy().content_security_policy();
    (
        [
            (CONTENT_TYPE, "text/html; charset=utf-8".to_owned()),
            (CONTENT_SECURITY_POLICY, csp),
            (X_CONTENT_TYPE_OPTIONS, "nosniff".to_owned()),
            (CACHE_CONTROL, "no-store".to_owned()),
        ],
        html.to_string(),
    )
        .into_response()
}

#[cfg(test)]
#[path = "sandbox_test.rs"]
mod tests;
