//! Layout and dashboard rendering routes.

use axum::extract::{Query, State};
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;
use crate::layout::LayoutState;
use crate::layout::grid::LayoutEntry;
use crate::services::dashboard::{self, RenderPlan};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct WidthQuery {
    pub width: Option<u32>,
}

#[derive(Deserialize)]
pub struct RearrangeBody {
    pub entries: Vec<LayoutEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropDeleteBody {
    pub widget_id: Uuid,
}

/// `GET /api/layout?width=` — current layout, reflowed for `width` if given.
pub async fn get_layout(
    State(state): State<AppState>,
    Query(query): Query<WidthQuery>,
) -> Result<Json<LayoutState>, ApiError> {
    let snapshot = state.registry.snapshot();
    let layout = match query.width {
        Some(width) => {
            let columns = state.layout.columns_for_width(width);
            state.layout.on_column_count_change(&snapshot, columns)?
        }
        None => state.layout.refresh(&snapshot),
    };
    Ok(Json(layout))
}

/// `PUT /api/layout` — accept a user drag-and-drop arrangement.
pub async fn put_layout(State(state): State<AppState>, Json(body): Json<RearrangeBody>) -> Json<LayoutState> {
    Json(dashboard::rearrange(&state, &body.entries))
}

/// `POST /api/layout/drop-delete` — a widget was dropped on the delete target.
pub async fn drop_delete(
    State(state): State<AppState>,
    Json(body): Json<DropDeleteBody>,
) -> Result<Json<LayoutState>, ApiError> {
    Ok(Json(dashboard::drop_delete(&state, body.widget_id)?))
}

/// `GET /api/dashboard?width=` — layout joined with apps and sandbox views.
/// Read-only; without `width` the current column count is used.
pub async fn dashboard(State(state): State<AppState>, Query(query): Query<WidthQuery>) -> Json<RenderPlan> {
    Json(dashboard::render_plan(&state, query.width))
}

#[cfg(test)]
#[path = "layout_test.rs"]
mod tests;
