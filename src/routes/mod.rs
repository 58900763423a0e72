//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the JSON API used by the dashboard client and the
//! `/sandbox/{token}` document endpoint that isolated realms load from.
//! Domain errors are converted to [`ApiError`] here so handlers can use `?`.

pub mod apps;
pub mod generate;
pub mod layout;
pub mod sandbox;
pub mod widgets;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::layout::LayoutError;
use crate::registry::RegistryError;
use crate::sandbox::SandboxMountError;
use crate::services::catalog::CatalogError;
use crate::services::dashboard::DashboardError;
use crate::services::generation::GenerationError;
use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/snapshot", get(apps::snapshot))
        .route("/api/apps", get(apps::list_apps).post(apps::create_app).delete(apps::clear_apps))
        .route("/api/apps/{id}", get(apps::get_app).delete(apps::delete_app))
        .route("/api/catalog", get(apps::list_catalog))
        .route("/api/catalog/{key}/install", post(apps::install_catalog_app))
        .route(
            "/api/widgets",
            get(widgets::list_widgets)
                .post(widgets::create_widget)
                .delete(widgets::clear_widgets),
        )
        .route(
            "/api/widgets/{id}",
            patch(widgets::patch_widget).delete(widgets::delete_widget),
        )
        .route("/api/widgets/{id}/resize", post(widgets::resize_widget))
        .route("/api/widgets/{id}/cycle-size", post(widgets::cycle_size))
        .route("/api/widgets/{id}/move", post(widgets::move_widget))
        .route(
            "/api/widgets/{id}/mount",
            post(widgets::mount_widget).delete(widgets::unmount_widget),
        )
        .route("/api/layout", get(layout::get_layout).put(layout::put_layout))
        .route("/api/layout/drop-delete", post(layout::drop_delete))
        .route("/api/dashboard", get(layout::dashboard))
        .route("/api/generate-app", post(generate::generate_app))
        .route("/api/generate-app/abandon", post(generate::abandon))
        .route("/sandbox/{token}", get(sandbox::serve_document))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

pub(crate) fn registry_status(err: &RegistryError) -> StatusCode {
    match err {
        RegistryError::AppNotFound(_) | RegistryError::WidgetNotFound(_) => StatusCode::NOT_FOUND,
        RegistryError::Validation(_) | RegistryError::UnknownApp(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RegistryError::DuplicateApp(_) | RegistryError::StaleGeneration { .. } => StatusCode::CONFLICT,
    }
}

pub(crate) fn mount_status(err: &SandboxMountError) -> StatusCode {
    match err {
        SandboxMountError::IsolationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        SandboxMountError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        SandboxMountError::AppMismatch { .. } => StatusCode::CONFLICT,
        SandboxMountError::Realm(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        Self::from_code(registry_status(&err), &err)
    }
}

impl From<LayoutError> for ApiError {
    fn from(err: LayoutError) -> Self {
        Self::from_code(StatusCode::BAD_REQUEST, &err)
    }
}

impl From<DashboardError> for ApiError {
    fn from(err: DashboardError) -> Self {
        let status = match &err {
            DashboardError::Registry(e) => registry_status(e),
            DashboardError::Mount(e) => mount_status(e),
            DashboardError::IntegrityViolation { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::from_code(status, &err)
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        let status = match &err {
            CatalogError::UnknownEntry(_) => StatusCode::NOT_FOUND,
            CatalogError::Registry(e) => registry_status(e),
        };
        Self::from_code(status, &err)
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        let status = match &err {
            GenerationError::InvalidCredential => StatusCode::UNAUTHORIZED,
            GenerationError::GenerationFailed(_) | GenerationError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
        };
        Self::from_code(status, &err)
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
