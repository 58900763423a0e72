use super::*;
use crate::registry::types::{Config, merge_config};
use crate::state::test_helpers;

fn widget_count_for(registry: &Registry, app_id: Uuid) -> usize {
    registry
        .snapshot()
        .widgets
        .iter()
        .filter(|w| w.app_id == app_id)
        .count()
}

#[test]
fn add_app_assigns_id_and_entry_point() {
    let registry = Registry::new();
    let (app, entry) = registry.add_app(test_helpers::draft("Clock", "Clock")).unwrap();
    assert_eq!(entry.symbol, "Clock");
    assert!(app.created_at > 0);
    let snap = registry.snapshot();
    assert_eq!(snap.micro_apps.len(), 1);
    assert_eq!(snap.revision, 1);
}

#[test]
fn add_app_rejects_empty_source_without_mutating() {
    let registry = Registry::new();
    let mut draft = test_helpers::draft("Broken", "Broken");
    draft.source_text = "   ".into();
    let err = registry.add_app(draft).unwrap_err();
    assert!(matches!(err, RegistryError::Validation(ValidationError::Empty)));
    let snap = registry.snapshot();
    assert!(snap.micro_apps.is_empty());
    assert_eq!(snap.revision, 0);
}

#[test]
fn insert_app_rejects_duplicate_id() {
    let registry = Registry::new();
    let (app, _) = registry.add_app(test_helpers::draft("Clock", "Clock")).unwrap();
    let err = registry.insert_app(app).unwrap_err();
    assert!(matches!(err, RegistryError::DuplicateApp(_)));
}

#[test]
fn remove_app_cascades_to_widgets() {
    let registry = Registry::new();
    let (keep, _) = registry.add_app(test_helpers::draft("Keep", "Keep")).unwrap();
    let (gone, _) = registry.add_app(test_helpers::draft("Gone", "Gone")).unwrap();
    registry.add_widget(WidgetDraft::new(gone.id)).unwrap();
    registry.add_widget(WidgetDraft::new(keep.id)).unwrap();
    registry.add_widget(WidgetDraft::new(gone.id)).unwrap();

    let before = registry.snapshot();
    let removed = registry.remove_app(gone.id).unwrap();
    assert_eq!(removed.len(), 2);
    assert_eq!(widget_count_for(&registry, gone.id), 0);
    assert_eq!(widget_count_for(&registry, keep.id), 1);

    // A reader holding the old snapshot still sees a consistent pre-removal world.
    assert!(before.app(gone.id).is_some());
    assert_eq!(before.widgets.iter().filter(|w| w.app_id == gone.id).count(), 2);
}

#[test]
fn every_snapshot_is_free_of_dangling_widgets() {
    let registry = Registry::new();
    let mut apps = Vec::new();
    for i in 0..4 {
        let (app, _) = registry
            .add_app(test_helpers::draft(&format!("App{i}"), &format!("App{i}")))
            .unwrap();
        for _ in 0..3 {
            registry.add_widget(WidgetDraft::new(app.id)).unwrap();
        }
        apps.push(app.id);
    }
    for id in apps {
        registry.remove_app(id).unwrap();
        let snap = registry.snapshot();
        for widget in &snap.widgets {
            assert!(snap.app(widget.app_id).is_some(), "dangling widget {}", widget.id);
        }
    }
}

#[test]
fn remove_missing_app_is_an_error() {
    let registry = Registry::new();
    assert!(matches!(registry.remove_app(Uuid::new_v4()), Err(RegistryError::AppNotFound(_))));
}

#[test]
fn add_widget_defaults_from_app() {
    let registry = Registry::new();
    let (app, _) = registry.add_app(test_helpers::draft("World Clock", "WorldClock")).unwrap();
    let widget = registry.add_widget(WidgetDraft::new(app.id)).unwrap();
    assert_eq!(widget.name, "World Clock");
    assert_eq!(widget.size_class, SizeClass::Medium);
    assert_eq!(widget.position, Position::new(0, 0));
    assert!(widget.config_override.is_none());
}

#[test]
fn add_widget_for_unknown_app_fails() {
    let registry = Registry::new();
    let err = registry.add_widget(WidgetDraft::new(Uuid::new_v4())).unwrap_err();
    assert!(matches!(err, RegistryError::UnknownApp(_)));
    assert!(registry.snapshot().widgets.is_empty());
}

#[test]
fn update_widget_applies_partial_patch() {
    let registry = Registry::new();
    let (app, _) = registry.add_app(test_helpers::draft("Clock", "Clock")).unwrap();
    let widget = registry.add_widget(WidgetDraft::new(app.id)).unwrap();

    let mut overrides = Config::new();
    overrides.insert("tz".into(), serde_json::json!("UTC"));
    let patch = WidgetPatch { config_override: Some(overrides), ..WidgetPatch::default() };
    let updated = registry.update_widget(widget.id, patch).unwrap();
    assert_eq!(updated.size_class, SizeClass::Medium);
    assert_eq!(updated.config_override.unwrap()["tz"], "UTC");

    let cleared = registry
        .update_widget(widget.id, WidgetPatch { config_override: Some(Config::new()), ..WidgetPatch::default() })
        .unwrap();
    assert!(cleared.config_override.is_none());
}

#[test]
fn resize_and_cycle_size() {
    let registry = Registry::new();
    let (app, _) = registry.add_app(test_helpers::draft("Clock", "Clock")).unwrap();
    let widget = registry.add_widget(WidgetDraft::new(app.id)).unwrap();
    assert_eq!(registry.resize_widget(widget.id, SizeClass::Small).unwrap().size_class, SizeClass::Small);
    assert_eq!(registry.cycle_size(widget.id).unwrap().size_class, SizeClass::Medium);
    assert_eq!(registry.cycle_size(widget.id).unwrap().size_class, SizeClass::Large);
    assert_eq!(registry.cycle_size(widget.id).unwrap().size_class, SizeClass::Small);
}

#[test]
fn move_and_apply_positions() {
    let registry = Registry::new();
    let (app, _) = registry.add_app(test_helpers::draft("Clock", "Clock")).unwrap();
    let a = registry.add_widget(WidgetDraft::new(app.id)).unwrap();
    let b = registry.add_widget(WidgetDraft::new(app.id)).unwrap();
    registry.move_widget(a.id, Position::new(2, 1)).unwrap();

    let stray = Uuid::new_v4();
    let unknown = registry.apply_positions(&[(b.id, Position::new(1, 3)), (stray, Position::new(0, 0))]);
    assert_eq!(unknown, vec![stray]);
    let snap = registry.snapshot();
    assert_eq!(snap.widget(a.id).unwrap().position, Position::new(2, 1));
    assert_eq!(snap.widget(b.id).unwrap().position, Position::new(1, 3));
}

#[test]
fn clear_widgets_keeps_apps() {
    let registry = Registry::new();
    let (app, _) = registry.add_app(test_helpers::draft("Clock", "Clock")).unwrap();
    registry.add_widget(WidgetDraft::new(app.id)).unwrap();
    registry.add_widget(WidgetDraft::new(app.id)).unwrap();
    assert_eq!(registry.clear_widgets().len(), 2);
    let snap = registry.snapshot();
    assert!(snap.widgets.is_empty());
    assert_eq!(snap.micro_apps.len(), 1);
}

#[test]
fn clear_apps_removes_everything_and_advances_epoch() {
    let registry = Registry::new();
    let (app, _) = registry.add_app(test_helpers::draft("Clock", "Clock")).unwrap();
    registry.add_widget(WidgetDraft::new(app.id)).unwrap();
    let epoch = registry.snapshot().epoch;
    assert_eq!(registry.clear_apps().len(), 1);
    let snap = registry.snapshot();
    assert!(snap.micro_apps.is_empty());
    assert!(snap.widgets.is_empty());
    assert_eq!(snap.epoch, epoch + 1);
}

#[test]
fn stale_generation_ticket_is_rejected() {
    let registry = Registry::new();
    let ticket = registry.generation_ticket();
    registry.clear_apps();
    let app = test_helpers::app("Late", "Late");
    let err = registry.commit_generated(ticket, app).unwrap_err();
    assert!(matches!(err, RegistryError::StaleGeneration { ticket: 0, current: 1 }));
    assert!(registry.snapshot().micro_apps.is_empty());
}

#[test]
fn fresh_generation_ticket_commits() {
    let registry = Registry::new();
    let ticket = registry.generation_ticket();
    let app = test_helpers::app("Fresh", "Fresh");
    let entry = registry.commit_generated(ticket, app.clone()).unwrap();
    assert_eq!(entry.symbol, "Fresh");
    assert!(registry.snapshot().app(app.id).is_some());
}

#[test]
fn abandon_generations_invalidates_tickets() {
    let registry = Registry::new();
    let ticket = registry.generation_ticket();
    registry.abandon_generations();
    assert!(registry.commit_generated(ticket, test_helpers::app("X", "X")).is_err());
}

#[test]
fn from_snapshot_prunes_orphans() {
    let app = test_helpers::app("Clock", "Clock");
    let orphan_app = Uuid::new_v4();
    let snapshot = RegistrySnapshot {
        micro_apps: vec![app.clone()],
        widgets: vec![test_helpers::widget(app.id, SizeClass::Small), test_helpers::widget(orphan_app, SizeClass::Small)],
        revision: 0,
        epoch: 0,
    };
    let registry = Registry::from_snapshot(snapshot);
    let snap = registry.snapshot();
    assert_eq!(snap.widgets.len(), 1);
    assert_eq!(snap.widgets[0].app_id, app.id);
}

#[test]
fn snapshot_serializes_with_persisted_field_names() {
    let app = test_helpers::app("Clock", "Clock");
    let snapshot = RegistrySnapshot {
        micro_apps: vec![app.clone()],
        widgets: vec![test_helpers::widget(app.id, SizeClass::Large)],
        revision: 9,
        epoch: 3,
    };
    let json = serde_json::to_value(&snapshot).unwrap();
    assert!(json.get("microApps").is_some());
    assert_eq!(json["widgets"][0]["sizeClass"], "large");
    assert_eq!(json["microApps"][0]["sourceText"], app.source_text.as_str());
    assert!(json.get("revision").is_none());
}

#[test]
fn snapshot_accepts_original_field_aliases() {
    let id = Uuid::new_v4();
    let raw = serde_json::json!({
        "microApps": [{
            "id": id, "name": "Clock", "description": "", "icon": "⏰",
            "code": "function Clock({ config }) { return null; }",
            "config": { "tz": "UTC" }, "createdAt": 1
        }],
        "widgets": [{ "id": Uuid::new_v4(), "appId": id, "name": "Clock", "size": "small", "position": { "x": 1, "y": 0 } }]
    });
    let snapshot: RegistrySnapshot = serde_json::from_value(raw).unwrap();
    assert_eq!(snapshot.micro_apps[0].default_config["tz"], "UTC");
    assert_eq!(snapshot.widgets[0].size_class, SizeClass::Small);
}

#[test]
fn merge_config_override_wins_per_key() {
    let defaults: Config = serde_json::from_value(serde_json::json!({ "city": "New York", "unit": "C" })).unwrap();
    let overrides: Config = serde_json::from_value(serde_json::json!({ "city": "Paris" })).unwrap();
    let merged = merge_config(&defaults, Some(&overrides));
    assert_eq!(serde_json::Value::Object(merged), serde_json::json!({ "city": "Paris", "unit": "C" }));
    assert_eq!(merge_config(&defaults, None), defaults);
}
