use super::*;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::validator::ValidationError;

#[test]
fn registry_errors_map_to_statuses() {
    assert_eq!(registry_status(&RegistryError::AppNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(registry_status(&RegistryError::WidgetNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(
        registry_status(&RegistryError::Validation(ValidationError::Empty)),
        StatusCode::UNPROCESSABLE_ENTITY
    );
    assert_eq!(registry_status(&RegistryError::UnknownApp(Uuid::nil())), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(registry_status(&RegistryError::DuplicateApp(Uuid::nil())), StatusCode::CONFLICT);
}

#[test]
fn isolation_unavailable_is_service_unavailable() {
    let err = SandboxMountError::IsolationUnavailable("off".into());
    assert_eq!(mount_status(&err), StatusCode::SERVICE_UNAVAILABLE);
    let api: ApiError = DashboardError::Mount(err).into();
    assert_eq!(api.code, "E_ISOLATION_UNAVAILABLE");
}

#[test]
fn invalid_credential_is_unauthorized() {
    let api: ApiError = GenerationError::InvalidCredential.into();
    assert_eq!(api.status, StatusCode::UNAUTHORIZED);
    assert_eq!(api.message, "invalid API key");
    assert!(!api.retryable);
}

#[test]
fn unknown_catalog_entry_is_not_found() {
    let api: ApiError = CatalogError::UnknownEntry("nope".into()).into();
    assert_eq!(api.status, StatusCode::NOT_FOUND);
    assert_eq!(api.code, "E_UNKNOWN_CATALOG_ENTRY");
}

#[tokio::test]
async fn healthz_is_ok() {
    assert_eq!(healthz().await.into_response().status(), StatusCode::OK);
}

#[tokio::test]
async fn router_builds_with_test_state() {
    let _router = app(crate::state::test_helpers::test_app_state());
}
