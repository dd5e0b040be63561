//! Store operation tests: paths, views, values and linking.

use std::sync::Arc;

use cosync::bridge::ValueChange;
use cosync::realtime::memory::{MemoryDocument, MemoryMap, MemoryProvider};
use cosync::realtime::{CollaborativeMap, RemoteValue};
use cosync::{
    ModelDB, ModelDbConfig, Observable, ObservableKind, ObservableList, ObservableUndoableList,
    WriteSource,
};
use serde_json::json;

use super::helpers::*;
use crate::helpers::*;

#[tokio::test]
async fn test_factory_returns_registered_observable() {
    let (_provider, db) = open_db();

    let first = db.create_list("cells").unwrap();
    let second = db.create_list("cells").unwrap();
    assert!(first.list().ptr_eq(second.list()));

    let map = db.create_map("metadata").unwrap();
    let again = db.create_map("metadata").unwrap();
    assert!(map.ptr_eq(&again));
}

#[tokio::test]
async fn test_factory_kind_mismatch() {
    let (_provider, db) = connected_db().await;
    db.create_string("source").unwrap();

    let err = db.create_list("source").unwrap_err();
    assert!(err.is_usage_error());
    assert!(err.to_string().contains("source"));
    assert!(db.create_value("source").unwrap_err().is_usage_error());
    assert!(db.create_string("source").is_ok());
}

#[tokio::test]
async fn test_values() {
    let (_provider, db) = connected_db().await;
    let trusted = db.create_value("trusted").unwrap();
    assert_eq!(trusted.get(), json!(null));
    assert_eq!(db.get_value("trusted").unwrap(), json!(null));

    db.set_value("trusted", json!(true)).unwrap();
    assert_eq!(trusted.get(), json!(true));
    assert_eq!(db.get_value("trusted").unwrap(), json!(true));

    let err = db.get_value("missing").unwrap_err();
    assert!(err.is_not_found());
    db.create_string("title").unwrap();
    assert!(db.set_value("title", json!(1)).unwrap_err().is_usage_error());
}

#[tokio::test]
async fn test_value_sees_collaborator_writes() {
    let document = Arc::new(MemoryDocument::new());
    let (_provider, db) = open_existing(document.clone());
    db.connected().await.unwrap();
    let count = db.create_value("count").unwrap();
    let events = Recorder::attach(count.changed());

    document
        .memory_model()
        .root_map()
        .remote_set("count", primitive(json!(9)));

    assert_eq!(count.get(), json!(9));
    assert_eq!(
        events.events(),
        vec![ValueChange {
            old_value: json!(null),
            new_value: json!(9),
            origin: WriteSource::Remote,
        }]
    );
}

#[tokio::test]
async fn test_get_wraps_existing_entries_lazily() {
    let document = Arc::new(MemoryDocument::new());
    let metadata = Arc::new(MemoryMap::new());
    metadata.remote_set("kernel", primitive(json!("python3")));
    let root = document.memory_model().root_map();
    root.remote_set("metadata", RemoteValue::Map(metadata));
    root.remote_set("nbformat", primitive(json!(4)));

    let (_provider, db) = open_existing(document);
    db.connected().await.unwrap();

    assert!(db.has("metadata"));
    let Some(Observable::Map(map)) = db.get("metadata") else {
        panic!("Expected a map at 'metadata'");
    };
    assert_eq!(map.to_json(), json!({"kernel": "python3"}));
    assert!(db.create_map("metadata").unwrap().ptr_eq(&map));

    assert_eq!(db.get("nbformat").map(|o| o.kind()), Some("value"));
    assert_eq!(
        db.get("metadata").map(|o| o.observable_kind()),
        Some(ObservableKind::Map)
    );
    assert_eq!(db.get_value("nbformat").unwrap(), json!(4));
    assert!(db.get("absent").is_none());
    assert!(!db.has("absent"));
}

#[tokio::test]
async fn test_views_prefix_paths() {
    let (provider, db) = connected_db().await;
    let cell = db.view("cells.0");
    assert!(cell.is_view());
    assert_eq!(cell.base_path(), "cells.0");

    let source = cell.create_string("source").unwrap();
    source.set_text("print(1)").unwrap();

    assert!(db.has("cells.0.source"));
    let Some(Observable::String(same)) = db.get("cells.0.source") else {
        panic!("Expected a string at 'cells.0.source'");
    };
    assert!(same.ptr_eq(&source));
    let stored = provider.document(NOTEBOOK).unwrap().to_json();
    assert_eq!(stored["cells.0.source"], "print(1)");

    let outputs = cell.view("outputs");
    assert_eq!(outputs.base_path(), "cells.0.outputs");
    outputs.create_list("items").unwrap();
    assert!(db.has("cells.0.outputs.items"));
}

#[tokio::test]
async fn test_view_dispose_is_a_no_op() {
    let (_provider, db) = connected_db().await;
    let view = db.view("cell");
    let source = view.create_string("source").unwrap();

    view.dispose();

    assert!(!db.is_disposed());
    assert!(!view.is_disposed());
    assert!(!source.is_disposed());
}

#[tokio::test]
async fn test_configured_base_path() {
    let provider = Arc::new(MemoryProvider::new());
    let config = ModelDbConfig::new(NOTEBOOK).with_base_path("notebook");
    let db = ModelDB::open(config, provider.clone());
    assert!(!db.is_view());
    assert_eq!(db.base_path(), "notebook");

    db.create_map("metadata").unwrap();
    db.connected().await.unwrap();

    let stored = provider.document(NOTEBOOK).unwrap().to_json();
    assert_eq!(stored["notebook.metadata"], json!({}));
    assert_eq!(db.view("cells").base_path(), "notebook.cells");
}

#[tokio::test]
async fn test_set_links_existing_container() {
    let (provider, db) = connected_db().await;
    let scratch = memory_model();
    let outputs = ObservableList::create(&scratch);
    outputs.push("stream".into()).unwrap();

    db.set("outputs", Observable::List(ObservableUndoableList::new(outputs.clone())))
        .unwrap();

    let Some(Observable::List(stored)) = db.get("outputs") else {
        panic!("Expected a list at 'outputs'");
    };
    assert!(stored.list().ptr_eq(&outputs));
    outputs.push("display_data".into()).unwrap();
    let network = provider.document(NOTEBOOK).unwrap().to_json();
    assert_eq!(network["outputs"], json!(["stream", "display_data"]));
}

#[tokio::test]
async fn test_set_rejects_values() {
    let (_provider, db) = connected_db().await;
    let value = db.create_value("flag").unwrap();

    let err = db.set("copy", Observable::Value(value)).unwrap_err();

    assert!(err.is_usage_error());
    assert!(!db.has("copy"));
}

#[tokio::test]
async fn test_model_switches_on_connect() {
    let (_provider, db) = open_db();
    let memory_root = db.model().root();
    db.create_string("title").unwrap();

    db.connected().await.unwrap();

    let network_root = db.model().root();
    assert_ne!(memory_root.id(), network_root.id());
    assert!(network_root.has("title"));
    assert!(db.document().is_some());
}

#[tokio::test]
async fn test_set_reuses_containers_already_in_the_store() {
    let (provider, db) = connected_db().await;
    let source = db.create_string("source").unwrap();
    source.set_text("x").unwrap();
    let source_id = source.remote_id();

    db.set("alias", Observable::String(source.clone())).unwrap();

    assert_eq!(source.remote_id(), source_id);
    source.insert(1, "yz").unwrap();
    let network = provider.document(NOTEBOOK).unwrap().to_json();
    assert_eq!(network["alias"], "xyz");
    assert_eq!(network["source"], "xyz");
}

#[tokio::test]
async fn test_kind_mismatch_names_both_kinds() {
    let (_provider, db) = connected_db().await;
    db.create_map("metadata").unwrap();

    let err = db.create_value("metadata").unwrap_err();

    let message = err.to_string();
    assert!(message.contains("value"));
    assert!(message.contains("map"));
}
