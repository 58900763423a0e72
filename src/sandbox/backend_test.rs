use super::*;
use crate::registry::types::{Config, SizeClass};
use crate::state::test_helpers;
use crate::validator;

fn document() -> ExecutionDocument {
    let app = test_helpers::app("Clock", "Clock");
    let widget = test_helpers::widget(app.id, SizeClass::Small);
    let entry = validator::validate(&app.source_text).unwrap();
    ExecutionDocument::build(&app, &widget, entry, Config::new())
}

#[test]
fn tokens_are_unguessable_hex() {
    let a = generate_token();
    let b = generate_token();
    assert_eq!(a.len(), 32);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    assert_ne!(a, b);
}

#[test]
fn store_publishes_and_revokes() {
    let store = DocumentStore::new("/sandbox/");
    let token = store.publish("<html></html>".into());
    assert_eq!(store.url_for(&token), format!("/sandbox/{token}"));
    assert_eq!(store.get(&token).as_deref(), Some("<html></html>"));

    assert!(store.revoke(&token));
    assert!(!store.revoke(&token));
    assert!(store.get(&token).is_none());
    assert_eq!(store.stats(), ObjectUrlStats { allocated: 1, revoked: 1, live: 0 });
}

#[test]
fn frame_backend_fails_probe_when_disabled() {
    let store = Arc::new(DocumentStore::new("/sandbox"));
    assert!(FrameBackend::new(Arc::clone(&store), false).probe().is_err());
    assert!(FrameBackend::new(store, true).probe().is_ok());
}

#[test]
fn frame_realm_serves_until_closed() {
    let store = Arc::new(DocumentStore::new("/sandbox"));
    let backend = FrameBackend::new(Arc::clone(&store), true);
    let mut realm = backend.open(document()).unwrap();
    let url = realm.url().unwrap().to_owned();
    let token = url.trim_start_matches("/sandbox/").to_owned();
    assert!(store.get(&token).unwrap().contains("typeof Clock"));
    assert_eq!(realm.render(), RenderOutcome::Deferred);

    realm.close();
    realm.close();
    assert!(realm.url().is_none());
    assert!(store.get(&token).is_none());
    assert_eq!(store.stats(), ObjectUrlStats { allocated: 1, revoked: 1, live: 0 });
}

#[test]
fn dropping_a_realm_revokes_its_document() {
    let store = Arc::new(DocumentStore::new("/sandbox"));
    let backend = FrameBackend::new(Arc::clone(&store), true);
    drop(backend.open(document()).unwrap());
    assert_eq!(store.stats().live, 0);
}
