//! App generation — turn a natural-language prompt into a registered app.
//!
//! DESIGN
//! ======
//! The pipeline is: take a generation ticket, ask the LLM for a JSON
//! payload, strip any Markdown fence, decode and validate the payload, then
//! commit through the registry with the ticket. If apps were cleared or the
//! user abandoned generation while the request was in flight, the ticket is
//! stale and the result is dropped (`GenerationOutcome::Stale`).
//!
//! ERROR HANDLING
//! ==============
//! Authentication failures map to `InvalidCredential` so the client can
//! prompt for a new key. Provider bodies are never echoed back; they are
//! logged at debug level only.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::llm::types::{Credential, LlmError, Message};
use crate::registry::types::{AppDefinition, Config, SizeClass, Widget, WidgetDraft};
use crate::registry::{RegistryError, now_ms};
use crate::services::dashboard;
use crate::state::AppState;
use crate::validator::{self, EntryHints, EntryPoint};

/// Icon used when the model omits one.
pub const DEFAULT_ICON: &str = "📱";

pub const SYSTEM_PROMPT: &str = r#"You are an expert React developer. Generate a self-contained React component based on the user's request.

Respond with a JSON object of this exact shape:
{
  "appType": "widget",
  "name": "Short App Name",
  "description": "One sentence describing what the app does",
  "icon": "a single emoji",
  "code": "the component source",
  "config": {}
}

Rules for "code":
1. Start with `function ComponentName({ config }) {` and declare nothing else at the top level.
2. Use React.useState for state.
3. Use React.useEffect for side effects.
4. No imports or require calls; React is available globally.
5. Inline styles only.
6. Keep it simple and focused on one task.
7. Return a single root div.

Put default settings the component reads from `config` in "config".
Respond ONLY with the JSON object."#;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("invalid API key")]
    InvalidCredential,
    #[error("generation failed: {0}")]
    GenerationFailed(String),
    #[error("malformed generation response: {0}")]
    MalformedResponse(String),
}

impl crate::error::ErrorCode for GenerationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredential => "E_INVALID_CREDENTIAL",
            Self::GenerationFailed(_) => "E_GENERATION_FAILED",
            Self::MalformedResponse(_) => "E_MALFORMED_RESPONSE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::GenerationFailed(_) | Self::MalformedResponse(_))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(alias = "apiKey")]
    pub credential: Credential,
    /// Also place the new app on the dashboard as a medium widget.
    #[serde(default)]
    pub place: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppType {
    #[default]
    Widget,
    Launcher,
}

/// Payload the model is asked to produce.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedApp {
    #[serde(default)]
    pub app_type: AppType,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub icon: Option<String>,
    /// Kept as raw JSON so a non-string source is reported as such.
    #[serde(alias = "code")]
    pub source_text: serde_json::Value,
    #[serde(default, alias = "config")]
    pub default_config: Option<Config>,
    #[serde(default)]
    pub entry_point: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum GenerationOutcome {
    #[serde(rename_all = "camelCase")]
    Committed {
        app: AppDefinition,
        app_type: AppType,
        entry_point: EntryPoint,
        #[serde(skip_serializing_if = "Option::is_none")]
        widget: Option<Widget>,
    },
    /// Apps were cleared or generation was abandoned mid-flight.
    Stale,
}

// =============================================================================
// PARSING
// =============================================================================

fn fence_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```[A-Za-z]*[ \t]*\r?\n(.*)\r?\n[ \t]*```").ok())
        .as_ref()
}

/// Remove a surrounding Markdown code fence, if any.
#[must_use]
pub fn strip_fence(text: &str) -> &str {
    fence_re()
        .and_then(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map_or(text, |m| m.as_str())
        .trim()
}

/// Decode the model's reply.
///
/// # Errors
///
/// Returns `MalformedResponse` if the text is not the expected JSON object.
pub fn parse_payload(text: &str) -> Result<GeneratedApp, GenerationError> {
    serde_json::from_str(strip_fence(text)).map_err(|e| GenerationError::MalformedResponse(e.to_string()))
}

/// Validate a decoded payload and build the app it describes.
///
/// # Errors
///
/// Returns `MalformedResponse` for a blank name or a source the validator rejects.
pub fn build_app(payload: GeneratedApp) -> Result<(AppDefinition, AppType), GenerationError> {
    let name = payload.name.trim().to_owned();
    if name.is_empty() {
        return Err(GenerationError::MalformedResponse("app name is empty".into()));
    }
    let hints = EntryHints { manifest: payload.entry_point.as_deref(), name: Some(&name) };
    validator::validate_value(&payload.source_text, hints)
        .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

    let source_text = payload
        .source_text
        .as_str()
        .map(str::trim)
        .unwrap_or_default()
        .to_owned();
    let icon = payload
        .icon
        .map(|i| i.trim().to_owned())
        .filter(|i| !i.is_empty())
        .unwrap_or_else(|| DEFAULT_ICON.to_owned());

    let app = AppDefinition {
        id: Uuid::new_v4(),
        name,
        description: payload.description.trim().to_owned(),
        icon,
        source_text,
        default_config: payload.default_config.unwrap_or_default(),
        entry_point: payload.entry_point,
        created_at: now_ms(),
    };
    Ok((app, payload.app_type))
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Generate an app from `request.prompt` and commit it unless stale.
///
/// # Errors
///
/// Returns `InvalidCredential` on a blank or rejected key,
/// `GenerationFailed` when no provider is configured or the call fails, and
/// `MalformedResponse` when the reply cannot be turned into a valid app.
pub async fn generate(state: &AppState, request: GenerateRequest) -> Result<GenerationOutcome, GenerationError> {
    let Some(llm) = state.llm.as_ref() else {
        return Err(GenerationError::GenerationFailed("no LLM provider configured".into()));
    };
    if request.credential.is_blank() {
        return Err(GenerationError::InvalidCredential);
    }
    let prompt = request.prompt.trim();
    if prompt.is_empty() {
        return Err(GenerationError::GenerationFailed("prompt is empty".into()));
    }

    let ticket = state.registry.generation_ticket();
    let response = llm
        .chat(
            &request.credential,
            state.config.generation_max_tokens,
            SYSTEM_PROMPT,
            &[Message::user(prompt)],
        )
        .await
        .map_err(map_llm_error)?;
    info!(
        model = %response.model,
        input_tokens = response.input_tokens,
        output_tokens = response.output_tokens,
        stop_reason = %response.stop_reason,
        "generation: response received"
    );

    let (app, app_type) = build_app(parse_payload(&response.text)?)?;
    let entry_point = match state.registry.commit_generated(ticket, app.clone()) {
        Ok(entry) => entry,
        Err(RegistryError::StaleGeneration { ticket, current }) => {
            info!(ticket, current, name = %app.name, "generation: discarding stale result");
            return Ok(GenerationOutcome::Stale);
        }
        Err(e) => return Err(GenerationError::MalformedResponse(e.to_string())),
    };

    let widget = if request.place {
        let draft = WidgetDraft::new(app.id).with_size(SizeClass::Medium);
        match dashboard::add_widget(state, draft) {
            Ok(widget) => Some(widget),
            Err(e) => {
                // The app may have been removed between commit and placement.
                warn!(app_id = %app.id, error = %e, "generation: auto-placement skipped");
                None
            }
        }
    } else {
        None
    };

    Ok(GenerationOutcome::Committed { app, app_type, entry_point, widget })
}

/// Invalidate every in-flight generation.
pub fn abandon(state: &AppState) -> u64 {
    let epoch = state.registry.abandon_generations();
    info!(epoch, "generation: in-flight requests abandoned");
    epoch
}

fn map_llm_error(err: LlmError) -> GenerationError {
    if err.is_auth_failure() {
        return GenerationError::InvalidCredential;
    }
    match err {
        LlmError::ApiResponse { status, body } => {
            debug!(status, %body, "generation: provider error body");
            GenerationError::GenerationFailed(format!("provider returned status {status}"))
        }
        other => GenerationError::GenerationFailed(other.to_string()),
    }
}

#[cfg(test)]
#[path = "generation_test.rs"]
mod tests;
