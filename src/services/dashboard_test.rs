use super::*;
use std::sync::Arc;

use crate::sandbox::scripted::ScriptedBackend;
use crate::services::catalog;
use crate::state::test_helpers;

// =============================================================================
// widget lifecycle
// =============================================================================

#[test]
fn calculator_scenario_drop_delete_keeps_the_app() {
    let state = test_helpers::test_app_state();
    let (calc, _) = catalog::install_builtin(&state.registry, "calculator").unwrap();

    let widget = add_widget(&state, WidgetDraft::new(calc.id).with_size(SizeClass::Medium)).unwrap();
    assert_eq!(widget.size_class, SizeClass::Medium);
    let resized = resize_widget(&state, widget.id, SizeClass::Large).unwrap();
    assert_eq!(resized.size_class, SizeClass::Large);
    assert_eq!(state.layout.current().entries[0].w, 3);

    let layout = drop_delete(&state, widget.id).unwrap();
    assert!(layout.entries.is_empty());
    let snap = state.registry.snapshot();
    assert!(snap.widgets.is_empty());
    assert_eq!(snap.micro_apps.len(), 1);
    assert_eq!(snap.micro_apps[0].id, calc.id);
}

#[test]
fn add_widget_for_missing_app_fails() {
    let state = test_helpers::test_app_state();
    let err = add_widget(&state, WidgetDraft::new(Uuid::new_v4())).unwrap_err();
    assert!(matches!(err, DashboardError::Registry(RegistryError::UnknownApp(_))));
}

#[test]
fn cycle_size_walks_small_medium_large() {
    let state = test_helpers::test_app_state();
    let app = test_helpers::seed_app(&state, "Clock", "Clock");
    let widget = add_widget(&state, WidgetDraft::new(app.id).with_size(SizeClass::Small)).unwrap();
    assert_eq!(cycle_size(&state, widget.id).unwrap().size_class, SizeClass::Medium);
    assert_eq!(cycle_size(&state, widget.id).unwrap().size_class, SizeClass::Large);
    assert_eq!(cycle_size(&state, widget.id).unwrap().size_class, SizeClass::Small);
}

#[test]
fn removing_a_widget_releases_its_realm() {
    let (state, backend) = test_helpers::test_app_state_with_backend(Arc::new(ScriptedBackend::new()));
    let app = test_helpers::seed_app(&state, "Clock", "Clock");
    let widget = add_widget(&state, WidgetDraft::new(app.id)).unwrap();
    mount_widget(&state, widget.id).unwrap();
    assert_eq!(state.sandbox.live_realms(), 1);

    remove_widget(&state, widget.id).unwrap();
    assert_eq!(state.sandbox.live_realms(), 0);
    assert_eq!(backend.allocated(), backend.revoked());
}

#[test]
fn drop_delete_compacts_the_hole() {
    let state = test_helpers::test_app_state();
    let app = test_helpers::seed_app(&state, "Clock", "Clock");
    let first = add_widget(&state, WidgetDraft::new(app.id).with_size(SizeClass::Large)).unwrap();
    let second = add_widget(&state, WidgetDraft::new(app.id).with_size(SizeClass::Small)).unwrap();
    let snap = state.registry.snapshot();
    state.layout.on_column_count_change(&snap, 3).unwrap();

    let layout = drop_delete(&state, first.id).unwrap();
    assert_eq!(layout.entries.len(), 1);
    assert_eq!(layout.entries[0].widget_id, second.id);
    assert_eq!((layout.entries[0].x, layout.entries[0].y), (0, 0));
}

#[test]
fn config_update_remounts_a_mounted_widget() {
    let (state, backend) = test_helpers::test_app_state_with_backend(Arc::new(ScriptedBackend::new()));
    let app = test_helpers::seed_app(&state, "Clock", "Clock");
    let widget = add_widget(&state, WidgetDraft::new(app.id)).unwrap();
    let (first, _) = mount_widget(&state, widget.id).unwrap();

    let mut config = crate::registry::types::Config::new();
    config.insert("city".into(), "Paris".into());
    let patch = WidgetPatch { config_override: Some(config), ..WidgetPatch::default() };
    update_widget(&state, widget.id, patch).unwrap();

    let current = state.sandbox.handle(widget.id).unwrap();
    assert!(current.generation > first.generation);
    assert_eq!(state.sandbox.live_realms(), 1);
    assert_eq!(backend.allocated(), 2);
}

// =============================================================================
// apps
// =============================================================================

#[test]
fn remove_app_cascades_and_releases_realms() {
    let state = test_helpers::test_app_state();
    let keep = test_helpers::seed_app(&state, "Keep", "Keep");
    let gone = test_helpers::seed_app(&state, "Gone", "Gone");
    let kept = add_widget(&state, WidgetDraft::new(keep.id)).unwrap();
    let doomed = add_widget(&state, WidgetDraft::new(gone.id)).unwrap();
    mount_widget(&state, kept.id).unwrap();
    mount_widget(&state, doomed.id).unwrap();

    let removed = remove_app(&state, gone.id).unwrap();
    assert_eq!(removed, vec![doomed.id]);
    assert_eq!(state.sandbox.live_realms(), 1);
    assert!(matches!(state.sandbox.view(kept.id), SandboxView::Mounted { .. }));
    assert_eq!(state.sandbox.view(doomed.id), SandboxView::Unmounted);
    assert_eq!(state.layout.current().entries.len(), 1);
}

#[test]
fn clear_apps_empties_everything() {
    let state = test_helpers::test_app_state();
    let app = test_helpers::seed_app(&state, "Clock", "Clock");
    let widget = add_widget(&state, WidgetDraft::new(app.id)).unwrap();
    mount_widget(&state, widget.id).unwrap();

    let removed = clear_apps(&state);
    assert_eq!(removed, vec![widget.id]);
    let snap = state.registry.snapshot();
    assert!(snap.micro_apps.is_empty());
    assert!(snap.widgets.is_empty());
    assert_eq!(state.sandbox.live_realms(), 0);
}

// =============================================================================
// mount / unmount
// =============================================================================

#[test]
fn stale_generation_unmount_is_ignored() {
    let state = test_helpers::test_app_state();
    let app = test_helpers::seed_app(&state, "Clock", "Clock");
    let widget = add_widget(&state, WidgetDraft::new(app.id)).unwrap();
    let (old, _) = mount_widget(&state, widget.id).unwrap();
    let (new, _) = mount_widget(&state, widget.id).unwrap();

    assert!(!unmount_widget(&state, widget.id, Some(old.generation)));
    assert_eq!(state.sandbox.live_realms(), 1);
    assert!(unmount_widget(&state, widget.id, Some(new.generation)));
    assert_eq!(state.sandbox.live_realms(), 0);
}

#[test]
fn widget_removed_mid_mount_releases_the_realm() {
    let (state, backend) = test_helpers::test_app_state_with_backend(Arc::new(ScriptedBackend::new()));
    let app = test_helpers::seed_app(&state, "Clock", "Clock");
    let widget = add_widget(&state, WidgetDraft::new(app.id)).unwrap();

    let registry = Arc::clone(&state.registry);
    let id = widget.id;
    backend.on_open(move || {
        registry.remove_widget(id).ok();
    });

    let err = mount_widget(&state, widget.id).unwrap_err();
    assert!(matches!(err, DashboardError::Registry(RegistryError::WidgetNotFound(_))));
    assert_eq!(state.sandbox.live_realms(), 0);
    assert_eq!(state.sandbox.view(widget.id), SandboxView::Unmounted);
    assert_eq!(backend.allocated(), 1);
    assert_eq!(backend.allocated(), backend.revoked());
}

#[test]
fn widget_removed_during_config_remount_leaves_no_realm() {
    let (state, backend) = test_helpers::test_app_state_with_backend(Arc::new(ScriptedBackend::new()));
    let app = test_helpers::seed_app(&state, "Clock", "Clock");
    let widget = add_widget(&state, WidgetDraft::new(app.id)).unwrap();
    mount_widget(&state, widget.id).unwrap();

    let registry = Arc::clone(&state.registry);
    let id = widget.id;
    backend.on_open(move || {
        registry.remove_widget(id).ok();
    });

    let mut config = crate::registry::types::Config::new();
    config.insert("city".into(), "Paris".into());
    let patch = WidgetPatch { config_override: Some(config), ..WidgetPatch::default() };
    update_widget(&state, widget.id, patch).unwrap();

    assert_eq!(state.sandbox.live_realms(), 0);
    assert_eq!(backend.allocated(), backend.revoked());
}

#[test]
fn mount_unknown_widget_fails() {
    let state = test_helpers::test_app_state();
    let err = mount_widget(&state, Uuid::new_v4()).unwrap_err();
    assert!(matches!(err, DashboardError::Registry(RegistryError::WidgetNotFound(_))));
}

#[test]
fn mount_with_isolation_unavailable_shows_placeholder() {
    let (state, backend) = test_helpers::test_app_state_with_backend(Arc::new(ScriptedBackend::unavailable()));
    let app = test_helpers::seed_app(&state, "Clock", "Clock");
    let widget = add_widget(&state, WidgetDraft::new(app.id)).unwrap();

    let err = mount_widget(&state, widget.id).unwrap_err();
    assert!(matches!(err, DashboardError::Mount(SandboxMountError::IsolationUnavailable(_))));
    assert_eq!(backend.executions(), 0);
    assert!(state.registry.snapshot().widget(widget.id).is_some());
    assert!(matches!(state.sandbox.view(widget.id), SandboxView::Placeholder { .. }));
}

// =============================================================================
// render_plan
// =============================================================================

#[test]
fn render_plan_joins_layout_app_and_view() {
    let state = test_helpers::test_app_state();
    let app = test_helpers::seed_app(&state, "Clock", "Clock");
    let mounted = add_widget(&state, WidgetDraft::new(app.id).with_size(SizeClass::Large)).unwrap();
    let idle = add_widget(&state, WidgetDraft::new(app.id).with_size(SizeClass::Small)).unwrap();
    mount_widget(&state, mounted.id).unwrap();

    let plan = render_plan(&state, Some(700));
    assert_eq!(plan.columns, 2);
    assert_eq!(plan.cells.len(), 2);
    assert_eq!(plan.cells[0].widget.id, mounted.id);
    assert_eq!((plan.cells[0].entry.x, plan.cells[0].entry.y, plan.cells[0].entry.w), (0, 0, 2));
    assert_eq!(plan.cells[0].app.name, "Clock");
    assert!(matches!(plan.cells[0].sandbox, SandboxView::Mounted { .. }));
    assert_eq!(plan.cells[1].widget.id, idle.id);
    assert_eq!(plan.cells[1].sandbox, SandboxView::Unmounted);
    assert!(!plan.sandbox_attribute.contains("allow-same-origin"));
}

#[test]
fn render_plan_switches_columns_with_width() {
    let state = test_helpers::test_app_state();
    let app = test_helpers::seed_app(&state, "Clock", "Clock");
    add_widget(&state, WidgetDraft::new(app.id)).unwrap();

    assert_eq!(render_plan(&state, Some(320)).columns, 1);
    assert_eq!(render_plan(&state, Some(1280)).columns, 4);
    assert_eq!(state.layout.current().columns, 4);
}

#[test]
fn render_plan_leaves_the_engine_alone() {
    let state = test_helpers::test_app_state();
    let app = test_helpers::seed_app(&state, "Clock", "Clock");
    add_widget(&state, WidgetDraft::new(app.id).with_size(SizeClass::Large)).unwrap();
    let before = state.layout.on_column_count_change(&state.registry.snapshot(), 2).unwrap();

    let narrow = render_plan(&state, Some(320));
    assert_eq!(narrow.columns, 1);
    assert_eq!(narrow.cells[0].entry.w, 1);
    assert_eq!(state.layout.current(), before);

    let current = render_plan(&state, None);
    assert_eq!(current.columns, 2);
    assert_eq!(current.cells[0].entry.w, 2);
}

#[test]
fn render_plan_skips_widget_with_missing_app() {
    let state = test_helpers::test_app_state();
    let kept = test_helpers::seed_app(&state, "Keep", "Keep");
    let lost = test_helpers::seed_app(&state, "Lost", "Lost");
    let good = add_widget(&state, WidgetDraft::new(kept.id)).unwrap();
    add_widget(&state, WidgetDraft::new(lost.id)).unwrap();

    let mut corrupted = RegistrySnapshot::clone(&state.registry.snapshot());
    corrupted.micro_apps.retain(|a| a.id != lost.id);
    state.registry.publish_unchecked(corrupted);

    let plan = render_plan(&state, Some(1280));
    assert_eq!(plan.cells.len(), 1);
    assert_eq!(plan.cells[0].widget.id, good.id);
}

#[test]
fn render_cell_serializes_flat_entry() {
    let state = test_helpers::test_app_state();
    let app = test_helpers::seed_app(&state, "Clock", "Clock");
    add_widget(&state, WidgetDraft::new(app.id)).unwrap();
    let plan = render_plan(&state, Some(1280));
    let json = serde_json::to_value(&plan).unwrap();
    let cell = &json["cells"][0];
    assert!(cell["widgetId"].is_string());
    assert_eq!(cell["w"], 2);
    assert_eq!(cell["sandbox"]["state"], "unmounted");
    assert_eq!(cell["app"]["icon"], "🧪");
}
