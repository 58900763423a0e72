//! Dashboard service — registry mutations that keep the layout and the
//! sandbox host in step.
//!
//! DESIGN
//! ======
//! Route handlers never touch the registry directly for widget or app
//! removal: removing a widget must also release its realm, and removing an
//! app must release the realms of every cascaded widget. Each operation
//! here commits to the registry first, then reconciles the sandbox host,
//! then refreshes the layout from the new snapshot.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::layout::grid::LayoutEntry;
use crate::layout::LayoutState;
use crate::registry::types::{Position, SizeClass, Widget, WidgetDraft, WidgetPatch};
use crate::registry::{RegistryError, RegistrySnapshot};
use crate::sandbox::{SandboxHandle, SandboxMountError, SandboxView};
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Mount(#[from] SandboxMountError),
    #[error("widget {widget_id} references missing app {app_id}")]
    IntegrityViolation { widget_id: Uuid, app_id: Uuid },
}

impl crate::error::ErrorCode for DashboardError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Registry(e) => crate::error::ErrorCode::error_code(e),
            Self::Mount(e) => crate::error::ErrorCode::error_code(e),
            Self::IntegrityViolation { .. } => "E_INTEGRITY_VIOLATION",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Mount(e) => crate::error::ErrorCode::retryable(e),
            _ => false,
        }
    }
}

// =============================================================================
// WIDGETS
// =============================================================================

/// Place a widget and refresh the layout.
///
/// # Errors
///
/// Returns `UnknownApp` if the draft references a missing app.
pub fn add_widget(state: &AppState, draft: WidgetDraft) -> Result<Widget, DashboardError> {
    let widget = state.registry.add_widget(draft)?;
    info!(widget_id = %widget.id, app_id = %widget.app_id, size = widget.size_class.as_str(), "dashboard: widget added");
    refresh_layout(state);
    Ok(widget)
}

/// Remove a widget, release its realm, and recompute the layout.
///
/// # Errors
///
/// Returns `WidgetNotFound` if no such widget exists.
pub fn remove_widget(state: &AppState, id: Uuid) -> Result<LayoutState, DashboardError> {
    let widget = state.registry.remove_widget(id)?;
    state.sandbox.unmount_widget(widget.id);
    info!(widget_id = %widget.id, "dashboard: widget removed");
    Ok(refresh_layout(state))
}

/// Drag-to-delete: remove the dropped widget and return the compacted layout.
///
/// # Errors
///
/// Returns `WidgetNotFound` if no such widget exists.
pub fn drop_delete(state: &AppState, id: Uuid) -> Result<LayoutState, DashboardError> {
    remove_widget(state, id)
}

/// Remove every widget and release every realm.
pub fn clear_widgets(state: &AppState) -> Vec<Uuid> {
    let removed = state.registry.clear_widgets();
    state.sandbox.retain(&HashSet::new());
    refresh_layout(state);
    removed
}

/// Apply a patch; a mounted widget is remounted so it sees its new config.
///
/// # Errors
///
/// Returns `WidgetNotFound` if no such widget exists.
pub fn update_widget(state: &AppState, id: Uuid, patch: WidgetPatch) -> Result<Widget, DashboardError> {
    let config_changed = patch.config_override.is_some();
    let widget = state.registry.update_widget(id, patch)?;
    refresh_layout(state);
    if config_changed && state.sandbox.handle(id).is_some() {
        if let Err(e) = mount_widget(state, id) {
            warn!(widget_id = %id, error = %e, "dashboard: remount after config change failed");
        }
    }
    Ok(widget)
}

/// # Errors
///
/// Returns `WidgetNotFound` if no such widget exists.
pub fn resize_widget(state: &AppState, id: Uuid, size: SizeClass) -> Result<Widget, DashboardError> {
    let widget = state.registry.resize_widget(id, size)?;
    refresh_layout(state);
    Ok(widget)
}

/// # Errors
///
/// Returns `WidgetNotFound` if no such widget exists.
pub fn cycle_size(state: &AppState, id: Uuid) -> Result<Widget, DashboardError> {
    let widget = state.registry.cycle_size(id)?;
    refresh_layout(state);
    Ok(widget)
}

/// # Errors
///
/// Returns `WidgetNotFound` if no such widget exists.
pub fn move_widget(state: &AppState, id: Uuid, position: Position) -> Result<Widget, DashboardError> {
    let widget = state.registry.move_widget(id, position)?;
    refresh_layout(state);
    Ok(widget)
}

/// Accept a user-dragged layout.
pub fn rearrange(state: &AppState, entries: &[LayoutEntry]) -> LayoutState {
    state.layout.on_user_rearrange(&state.registry, entries)
}

// =============================================================================
// APPS
// =============================================================================

/// Remove an app, its widgets, and their realms. Returns the removed widget ids.
///
/// # Errors
///
/// Returns `AppNotFound` if no such app exists.
pub fn remove_app(state: &AppState, id: Uuid) -> Result<Vec<Uuid>, DashboardError> {
    let removed = state.registry.remove_app(id)?;
    release_missing(state, &state.registry.snapshot());
    refresh_layout(state);
    Ok(removed)
}

/// Remove every app and widget. Outstanding generations become stale.
pub fn clear_apps(state: &AppState) -> Vec<Uuid> {
    let removed = state.registry.clear_apps();
    state.sandbox.retain(&HashSet::new());
    refresh_layout(state);
    removed
}

// =============================================================================
// SANDBOX
// =============================================================================

/// Mount (or remount) a widget's app in a fresh realm.
///
/// # Errors
///
/// Returns `WidgetNotFound` (also when the widget is removed mid-mount),
/// `IntegrityViolation` when the app is missing, or the sandbox mount error.
/// On a mount error the widget shows a placeholder.
pub fn mount_widget(state: &AppState, id: Uuid) -> Result<(SandboxHandle, SandboxView), DashboardError> {
    let snapshot = state.registry.snapshot();
    let widget = snapshot.widget(id).ok_or(RegistryError::WidgetNotFound(id))?;
    let Some(app) = snapshot.app(widget.app_id) else {
        error!(widget_id = %id, app_id = %widget.app_id, "IntegrityViolation: widget references missing app");
        return Err(DashboardError::IntegrityViolation { widget_id: id, app_id: widget.app_id });
    };
    let mounted = state.sandbox.mount(app, widget);

    // A concurrent removal may have committed while the realm was opening;
    // its unmount found nothing, so the slot is released here instead.
    if state.registry.snapshot().widget(id).is_none() {
        state.sandbox.unmount_widget(id);
        warn!(widget_id = %id, "dashboard: widget removed during mount; realm released");
        return Err(RegistryError::WidgetNotFound(id).into());
    }
    let handle = mounted?;
    Ok((handle, state.sandbox.view(id)))
}

/// Release a widget's realm. With a generation, only that mount is released.
pub fn unmount_widget(state: &AppState, id: Uuid, generation: Option<u64>) -> bool {
    match generation {
        Some(generation) => state.sandbox.unmount(SandboxHandle { widget_id: id, generation }),
        None => state.sandbox.unmount_widget(id),
    }
}

// =============================================================================
// RENDER PLAN
// =============================================================================

/// App fields a cell needs for its header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSummary {
    pub id: Uuid,
    pub name: String,
    pub icon: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderCell {
    #[serde(flatten)]
    pub entry: LayoutEntry,
    pub widget: Widget,
    pub app: AppSummary,
    pub sandbox: SandboxView,
}

/// Everything the client needs to draw the dashboard at one width.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPlan {
    pub columns: u32,
    pub cells: Vec<RenderCell>,
    /// Iframe `sandbox` attribute for every cell.
    pub sandbox_attribute: String,
}

/// Lay out for `width` and join each entry with its widget, app and view.
/// Without a width the engine's current column count is used. The engine's
/// own state is never changed, so viewers at different widths do not reflow
/// each other's layout.
#[must_use]
pub fn render_plan(state: &AppState, width: Option<u32>) -> RenderPlan {
    let snapshot = state.registry.snapshot();
    let columns = match width {
        Some(width) => state.layout.columns_for_width(width),
        None => state.layout.current().columns,
    };
    let entries = state.layout.compute(&snapshot, columns);

    let cells = entries
        .iter()
        .filter_map(|entry| {
            let widget = snapshot.widget(entry.widget_id)?;
            let Some(app) = snapshot.app(widget.app_id) else {
                error!(widget_id = %widget.id, app_id = %widget.app_id, "IntegrityViolation: skipping widget with missing app");
                return None;
            };
            Some(RenderCell {
                entry: *entry,
                widget: widget.clone(),
                app: AppSummary { id: app.id, name: app.name.clone(), icon: app.icon.clone() },
                sandbox: state.sandbox.view(widget.id),
            })
        })
        .collect();

    RenderPlan { columns, cells, sandbox_attribute: state.sandbox.policy().sandbox_attribute() }
}

// =============================================================================
// HELPERS
// =============================================================================

fn refresh_layout(state: &AppState) -> LayoutState {
    state.layout.refresh(&state.registry.snapshot())
}

fn release_missing(state: &AppState, snapshot: &RegistrySnapshot) {
    let keep: HashSet<Uuid> = snapshot.widgets.iter().map(|w| w.id).collect();
    state.sandbox.retain(&keep);
}

#[cfg(test)]
#[path = "dashboard_test.rs"]
mod tests;
