//! App registry and built-in catalog routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::registry::RegistrySnapshot;
use crate::registry::types::{AppDefinition, AppDraft};
use crate::services::catalog::{self, CatalogEntry};
use crate::services::dashboard;
use crate::state::AppState;
use crate::validator::EntryPoint;

/// A newly admitted app with the entry point the validator chose.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmittedApp {
    pub app: AppDefinition,
    pub entry_point: EntryPoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl AdmittedApp {
    fn new(app: AppDefinition, entry_point: EntryPoint) -> Self {
        let warning = entry_point.warning();
        Self { app, entry_point, warning }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedWidgets {
    pub removed_widgets: Vec<Uuid>,
}

/// `GET /api/snapshot` — the whole registry as persisted.
pub async fn snapshot(State(state): State<AppState>) -> Json<RegistrySnapshot> {
    Json(RegistrySnapshot::clone(&state.registry.snapshot()))
}

/// `GET /api/apps` — list registered apps.
pub async fn list_apps(State(state): State<AppState>) -> Json<Vec<AppDefinition>> {
    Json(state.registry.snapshot().micro_apps.clone())
}

/// `POST /api/apps` — validate and register an app.
pub async fn create_app(
    State(state): State<AppState>,
    Json(draft): Json<AppDraft>,
) -> Result<(StatusCode, Json<AdmittedApp>), ApiError> {
    if draft.name.trim().is_empty() {
        return Err(ApiError::bad_request("app name is required"));
    }
    let (app, entry_point) = state.registry.add_app(draft)?;
    Ok((StatusCode::CREATED, Json(AdmittedApp::new(app, entry_point))))
}

/// `GET /api/apps/:id` — fetch one app.
pub async fn get_app(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<AppDefinition>, ApiError> {
    state
        .registry
        .snapshot()
        .app(id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("app not found: {id}")))
}

/// `DELETE /api/apps/:id` — remove an app and every widget that uses it.
pub async fn delete_app(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RemovedWidgets>, ApiError> {
    let removed_widgets = dashboard::remove_app(&state, id)?;
    Ok(Json(RemovedWidgets { removed_widgets }))
}

/// `DELETE /api/apps` — remove every app and widget.
pub async fn clear_apps(State(state): State<AppState>) -> Json<RemovedWidgets> {
    Json(RemovedWidgets { removed_widgets: dashboard::clear_apps(&state) })
}

/// `GET /api/catalog` — list installable built-ins.
pub async fn list_catalog() -> Json<Vec<CatalogEntry>> {
    Json(catalog::catalog())
}

/// `POST /api/catalog/:key/install` — register a fresh copy of a built-in.
pub async fn install_catalog_app(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<(StatusCode, Json<AdmittedApp>), ApiError> {
    let (app, entry_point) = catalog::install_builtin(&state.registry, &key)?;
    Ok((StatusCode::CREATED, Json(AdmittedApp::new(app, entry_point))))
}

#[cfg(test)]
#[path = "apps_test.rs"]
mod tests;
