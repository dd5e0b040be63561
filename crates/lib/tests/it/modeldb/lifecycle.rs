//! Connection lifecycle tests: serving from memory, moving to the network
//! document, load failures and teardown.

use std::sync::Arc;

use cosync::bridge::StringChangeKind;
use cosync::realtime::memory::{MemoryDocument, MemoryList, MemoryProvider, MemoryString};
use cosync::realtime::{CollaborativeDocument, CollaborativeMap, RemoteValue};
use cosync::constants::COLLABORATORS_MAP;
use cosync::{
    CollaboratorMap, ConnectionState, ModelDB, ModelDbConfig, ObservableString, WriteSource,
};
use serde_json::json;

use super::helpers::*;
use crate::helpers::*;

fn network_json(provider: &MemoryProvider) -> serde_json::Value {
    provider
        .document(NOTEBOOK)
        .expect("document was loaded")
        .to_json()
}

#[tokio::test]
async fn test_factories_are_served_before_connecting() {
    let (provider, db) = open_db();
    assert!(db.state().is_initializing());
    assert!(db.document().is_none());
    assert!(db.collaborators().is_none());

    let title = db.create_string("title").unwrap();
    title.set_text("Draft").unwrap();
    let cells = db.create_list("cells").unwrap();
    cells.push("print('hi')".into()).unwrap();
    let count = db.create_value("count").unwrap();
    count.set(json!(3)).unwrap();

    // Nothing has reached the provider yet.
    assert!(provider.document(NOTEBOOK).is_none());

    db.connected().await.unwrap();

    assert_eq!(db.state(), ConnectionState::Connected);
    assert!(!db.is_prepopulated());
    let stored = network_json(&provider);
    assert_eq!(stored["title"], "Draft");
    assert_eq!(stored["cells"], json!(["print('hi')"]));
    assert_eq!(stored["count"], 3);
}

#[tokio::test]
async fn test_bridges_follow_the_network_document() {
    let (provider, db) = open_db();
    let title = db.create_string("title").unwrap();
    title.set_text("Draft").unwrap();
    let memory_id = title.remote_id();
    let events = Recorder::attach(title.changed());

    db.connected().await.unwrap();

    assert_ne!(title.remote_id(), memory_id);
    // Seeding an empty network document is silent.
    assert_eq!(events.len(), 0);

    title.insert(5, " 2").unwrap();
    assert_eq!(network_json(&provider)["title"], "Draft 2");
    assert_eq!(title.text(), "Draft 2");
}

#[tokio::test]
async fn test_undo_history_survives_seeding() {
    let (provider, db) = open_db();
    let cells = db.create_list("cells").unwrap();
    cells.push("a".into()).unwrap();
    cells.push("b".into()).unwrap();

    db.connected().await.unwrap();

    assert!(cells.can_undo());
    assert!(cells.undo().unwrap());
    assert_eq!(network_json(&provider)["cells"], json!(["a"]));
}

#[tokio::test]
async fn test_seeding_copies_shared_bridges_once() {
    let (provider, db) = open_db();
    let cell = db.create_map("cell").unwrap();
    let source = db.create_string("source").unwrap();
    source.set_text("x").unwrap();
    cell.set("source", source.clone().into()).unwrap();

    db.connected().await.unwrap();

    source.insert(1, "yz").unwrap();
    let stored = network_json(&provider);
    assert_eq!(stored["source"], "xyz");
    assert_eq!(stored["cell"]["source"], "xyz");
    assert_eq!(
        cell.get("source").and_then(|value| value.remote_id()),
        source.remote_id()
    );
}

#[tokio::test]
async fn test_disposed_nested_bridge_fails_before_moving_anything() {
    let (provider, db) = open_db();
    let cell = db.create_map("cell").unwrap();
    let cell_id = cell.remote_id();
    let title = db.create_string("title").unwrap();
    let title_id = title.remote_id();
    let output = ObservableString::create(&db.model(), "stale");
    cell.set("output", output.clone().into()).unwrap();
    output.dispose();

    let err = db.connected().await.unwrap_err();

    assert!(err.is_load_failure());
    assert!(db.state().is_failed());
    assert!(db.document().is_none());
    assert!(provider.document(NOTEBOOK).unwrap().is_closed());
    assert_eq!(cell.remote_id(), cell_id);
    assert_eq!(title.remote_id(), title_id);
    title.set_text("still here").unwrap();
    assert!(db.model().root().has("title"));
}

#[tokio::test]
async fn test_prepopulated_document_wins() {
    let document = Arc::new(MemoryDocument::new());
    let root = document.memory_model().root_map();
    root.remote_set(
        "title",
        RemoteValue::String(Arc::new(MemoryString::new("Shared title"))),
    );
    root.remote_set(
        "cells",
        RemoteValue::List(Arc::new(MemoryList::with_values(vec![primitive(json!("r1"))]))),
    );
    root.remote_set("count", primitive(json!(7)));

    let (provider, db) = open_existing(document.clone());
    let title = db.create_string("title").unwrap();
    title.set_text("Local draft").unwrap();
    let title_events = Recorder::attach(title.changed());
    let cells = db.create_list("cells").unwrap();
    cells.push("l1".into()).unwrap();
    let count = db.create_value("count").unwrap();
    count.set(json!(1)).unwrap();
    let scratch = db.create_map("scratch").unwrap();
    scratch.set("k", 1.into()).unwrap();

    db.connected().await.unwrap();

    assert!(db.is_prepopulated());
    assert_eq!(title.text(), "Shared title");
    let change = title_events.last().unwrap();
    assert_eq!(change.kind, StringChangeKind::Set);
    assert_eq!(change.origin, WriteSource::Remote);
    assert_eq!(title_events.len(), 1);

    assert_eq!(cells.to_json(), json!(["r1"]));
    assert!(!cells.can_undo());
    assert_eq!(count.get(), json!(7));
    assert_eq!(db.get_value("count").unwrap(), json!(7));

    // Entries the network document lacked are seeded into it.
    let stored = network_json(&provider);
    assert_eq!(stored["scratch"], json!({"k": 1}));
    assert_eq!(stored["title"], "Shared title");

    title.insert(0, "> ").unwrap();
    assert_eq!(document.to_json()["title"], "> Shared title");
}

#[tokio::test]
async fn test_prepopulated_kind_mismatch_keeps_memory_copy() {
    let document = Arc::new(MemoryDocument::new());
    document
        .memory_model()
        .root_map()
        .remote_set("title", primitive(json!("plain")));

    let (_provider, db) = open_existing(document.clone());
    let title = db.create_string("title").unwrap();
    title.set_text("memory").unwrap();

    db.connected().await.unwrap();

    assert!(db.state().is_connected());
    assert_eq!(title.text(), "memory");
    assert_eq!(document.to_json()["title"], "plain");
}

#[tokio::test]
async fn test_presence_key_alone_is_not_content() {
    let document = Arc::new(MemoryDocument::new());
    document.join(session("old", "Old Session", false));
    let presence = CollaboratorMap::new(document.clone(), COLLABORATORS_MAP).unwrap();
    presence.dispose();
    assert!(document.to_json()[COLLABORATORS_MAP].is_object());

    let (_provider, db) = open_existing(document.clone());
    db.create_string("title").unwrap();
    db.connected().await.unwrap();

    assert!(!db.is_prepopulated());
    assert_eq!(document.to_json()["title"], "");
}

#[tokio::test]
async fn test_load_failure_keeps_store_in_memory() {
    let provider = Arc::new(MemoryProvider::new());
    provider.fail_next_load("service unavailable");
    let db = ModelDB::open(ModelDbConfig::new(NOTEBOOK), provider.clone());
    let title = db.create_string("title").unwrap();

    let err = db.connected().await.unwrap_err();

    assert!(err.is_load_failure());
    assert!(err.to_string().contains("service unavailable"));
    assert!(db.state().is_failed());
    assert!(db.document().is_none());
    title.set_text("still editable").unwrap();
    assert_eq!(title.text(), "still editable");
    assert!(db.create_list("cells").is_ok());
}

#[tokio::test]
async fn test_unresolvable_path_fails() {
    let provider = Arc::new(MemoryProvider::new());
    let db = ModelDB::open(ModelDbConfig::new(""), provider);

    let err = db.connected().await.unwrap_err();

    assert!(err.is_load_failure());
    assert!(matches!(db.state(), ConnectionState::Failed(_)));
}

#[tokio::test]
async fn test_collaborators_are_available_once_connected() {
    let provider = Arc::new(
        MemoryProvider::new().with_local_user(session("me", "Ada Lovelace", false)),
    );
    let db = ModelDB::open(ModelDbConfig::new(NOTEBOOK), provider.clone());
    assert!(db.collaborators().is_none());

    db.connected().await.unwrap();

    let collaborators = db.collaborators().unwrap();
    let me = collaborators.local_collaborator().unwrap();
    assert_eq!(me.session_id, "me");
    assert_eq!(me.short_name, "AL");

    let document = provider.document(NOTEBOOK).unwrap();
    document.join(session("peer", "Grace Hopper", false));
    assert_eq!(collaborators.keys(), vec!["me", "peer"]);
}

#[tokio::test]
async fn test_dispose_tears_everything_down() {
    let (provider, db) = connected_db().await;
    let title = db.create_string("title").unwrap();
    let cells = db.create_list("cells").unwrap();
    let collaborators = db.collaborators().unwrap();

    db.dispose();
    db.dispose();

    assert!(db.is_disposed());
    assert_eq!(db.state(), ConnectionState::Disposed);
    assert!(title.is_disposed());
    assert!(cells.is_disposed());
    assert!(collaborators.is_disposed());
    assert!(provider.document(NOTEBOOK).unwrap().is_closed());

    assert!(db.create_string("other").unwrap_err().is_disposed());
    assert!(db.get("title").is_none());
    assert!(!db.has("title"));
    assert!(db.connected().await.unwrap_err().is_disposed());
}

#[tokio::test]
async fn test_dispose_before_connecting_cancels_load() {
    let (provider, db) = open_db();
    let title = db.create_string("title").unwrap();

    db.dispose();
    tokio::task::yield_now().await;

    assert!(title.is_disposed());
    assert!(db.connected().await.unwrap_err().is_disposed());
    assert!(provider.document(NOTEBOOK).is_none());
}
