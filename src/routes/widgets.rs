//! Widget routes: placement, patches, sizing, and sandbox mounts.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::layout::LayoutState;
use crate::registry::types::{Position, SizeClass, Widget, WidgetDraft, WidgetPatch};
use crate::routes::apps::RemovedWidgets;
use crate::sandbox::{SandboxHandle, SandboxView};
use crate::services::dashboard;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeBody {
    #[serde(alias = "size")]
    pub size_class: SizeClass,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MountResponse {
    pub handle: SandboxHandle,
    pub view: SandboxView,
    pub sandbox_attribute: String,
}

#[derive(Deserialize)]
pub struct UnmountQuery {
    pub generation: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct UnmountResponse {
    pub released: bool,
}

/// `GET /api/widgets` — list widgets in insertion order.
pub async fn list_widgets(State(state): State<AppState>) -> Json<Vec<Widget>> {
    Json(state.registry.snapshot().widgets.clone())
}

/// `POST /api/widgets` — place a widget for an existing app.
pub async fn create_widget(
    State(state): State<AppState>,
    Json(draft): Json<WidgetDraft>,
) -> Result<(StatusCode, Json<Widget>), ApiError> {
    let widget = dashboard::add_widget(&state, draft)?;
    Ok((StatusCode::CREATED, Json(widget)))
}

/// `DELETE /api/widgets` — remove every widget; apps stay installed.
pub async fn clear_widgets(State(state): State<AppState>) -> Json<RemovedWidgets> {
    Json(RemovedWidgets { removed_widgets: dashboard::clear_widgets(&state) })
}

/// `PATCH /api/widgets/:id` — rename, resize, move, or change config.
pub async fn patch_widget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<WidgetPatch>,
) -> Result<Json<Widget>, ApiError> {
    Ok(Json(dashboard::update_widget(&state, id, patch)?))
}

/// `DELETE /api/widgets/:id` — remove a widget; returns the new layout.
pub async fn delete_widget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LayoutState>, ApiError> {
    Ok(Json(dashboard::remove_widget(&state, id)?))
}

/// `POST /api/widgets/:id/resize` — set an explicit size class.
pub async fn resize_widget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<ResizeBody>,
) -> Result<Json<Widget>, ApiError> {
    Ok(Json(dashboard::resize_widget(&state, id, body.size_class)?))
}

/// `POST /api/widgets/:id/cycle-size` — small → medium → large → small.
pub async fn cycle_size(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Widget>, ApiError> {
    Ok(Json(dashboard::cycle_size(&state, id)?))
}

/// `POST /api/widgets/:id/move` — set the advisory grid position.
pub async fn move_widget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(position): Json<Position>,
) -> Result<Json<Widget>, ApiError> {
    Ok(Json(dashboard::move_widget(&state, id, position)?))
}

/// `POST /api/widgets/:id/mount` — (re)mount the widget in a fresh realm.
pub async fn mount_widget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<MountResponse>, ApiError> {
    let (handle, view) = dashboard::mount_widget(&state, id)?;
    Ok(Json(MountResponse { handle, view, sandbox_attribute: state.sandbox.policy().sandbox_attribute() }))
}

/// `DELETE /api/widgets/:id/mount?generation=` — release the widget's realm.
/// With `generation`, a newer mount is left alone.
pub async fn unmount_widget(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<UnmountQuery>,
) -> Json<UnmountResponse> {
    Json(UnmountResponse { released: dashboard::unmount_widget(&state, id, query.generation) })
}

#[cfg(test)]
#[path = "widgets_test.rs"]
mod tests;
