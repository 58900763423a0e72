//! App generation routes.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;

use crate::error::ApiError;
use crate::services::generation::{self, GenerateRequest, GenerationOutcome};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct AbandonResponse {
    pub epoch: u64,
}

/// `POST /api/generate-app` — prompt the LLM for a new app.
pub async fn generate_app(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerationOutcome>, ApiError> {
    if request.prompt.trim().is_empty() {
        return Err(ApiError::bad_request("prompt is required"));
    }
    Ok(Json(generation::generate(&state, request).await?))
}

/// `POST /api/generate-app/abandon` — drop the results of in-flight requests.
pub async fn abandon(State(state): State<AppState>) -> Json<AbandonResponse> {
    Json(AbandonResponse { epoch: generation::abandon(&state) })
}

#[cfg(test)]
#[path = "generate_test.rs"]
mod tests;
