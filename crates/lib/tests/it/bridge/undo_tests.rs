//! Undoable list tests

use std::sync::Arc;

use cosync::realtime::memory::MemoryList;
use cosync::{ObservableList, ObservableUndoableList, Value};
use serde_json::json;

use crate::helpers::*;

fn undoable(values: &[&str]) -> (Arc<MemoryList>, ObservableUndoableList) {
    let model = memory_model();
    let remote = Arc::new(MemoryList::new());
    let list = ObservableUndoableList::new(ObservableList::from_remote(remote.clone(), &model));
    if !values.is_empty() {
        list.push_all(values.iter().map(|v| Value::from(*v)).collect())
            .unwrap();
        list.clear_undo();
    }
    (remote, list)
}

#[test]
fn test_undo_reverts_each_kind_of_change() {
    let (_remote, list) = undoable(&["a", "b", "c"]);
    let start = list.to_json();

    list.push("d".into()).unwrap();
    list.remove(0).unwrap();
    list.set(1, "C".into()).unwrap();
    list.move_item(0, 2).unwrap();
    assert_eq!(list.to_json(), json!(["C", "d", "b"]));

    let mut undone = 0;
    while list.undo().unwrap() {
        undone += 1;
    }

    assert_eq!(undone, 4);
    assert_eq!(list.to_json(), start);
    assert!(!list.can_undo());
}

#[test]
fn test_redo_reapplies_in_order() {
    let (remote, list) = undoable(&["a", "b"]);

    list.insert(1, "x".into()).unwrap();
    list.move_item(0, 2).unwrap();
    let edited = list.to_json();

    assert!(list.undo().unwrap());
    assert!(list.undo().unwrap());
    assert_eq!(list.to_json(), json!(["a", "b"]));
    assert!(list.can_redo());

    assert!(list.redo().unwrap());
    assert!(list.redo().unwrap());
    assert!(!list.redo().unwrap());
    assert_eq!(list.to_json(), edited);
    assert_eq!(cosync::realtime::RemoteValue::List(remote).to_json(), edited);
}

#[test]
fn test_compound_operation_undoes_together() {
    let (_remote, list) = undoable(&["a"]);

    list.begin_compound_operation(true);
    list.push("b".into()).unwrap();
    list.push("c".into()).unwrap();
    list.set(0, "A".into()).unwrap();
    list.end_compound_operation();

    assert_eq!(list.to_json(), json!(["A", "b", "c"]));
    assert!(list.undo().unwrap());
    assert_eq!(list.to_json(), json!(["a"]));
    assert!(!list.can_undo());

    assert!(list.redo().unwrap());
    assert_eq!(list.to_json(), json!(["A", "b", "c"]));
}

#[test]
fn test_non_undoable_compound_is_not_recorded() {
    let (_remote, list) = undoable(&[]);

    list.push("kept".into()).unwrap();
    list.begin_compound_operation(false);
    list.push("hidden".into()).unwrap();
    list.end_compound_operation();

    assert!(list.undo().unwrap());
    // Only the recorded push is reverted; indices are taken as recorded.
    assert_eq!(list.to_json(), json!(["hidden"]));
    assert!(!list.can_undo());
}

#[test]
fn test_empty_compound_records_nothing() {
    let (_remote, list) = undoable(&["a"]);

    list.begin_compound_operation(true);
    list.end_compound_operation();

    assert!(!list.can_undo());
    assert!(!list.undo().unwrap());
}

#[test]
fn test_remote_changes_are_not_recorded() {
    let (remote, list) = undoable(&["a"]);

    remote.remote_push(primitive(json!("from-peer")));
    assert_eq!(list.to_json(), json!(["a", "from-peer"]));
    assert!(!list.can_undo());

    list.push("mine".into()).unwrap();
    assert!(list.undo().unwrap());
    assert_eq!(list.to_json(), json!(["a", "from-peer"]));
}

#[test]
fn test_new_change_after_undo_drops_redo() {
    let (_remote, list) = undoable(&[]);

    list.push("one".into()).unwrap();
    list.push("two".into()).unwrap();
    list.undo().unwrap();
    assert!(list.can_redo());

    list.push("three".into()).unwrap();
    assert!(!list.can_redo());
    assert_eq!(list.to_json(), json!(["one", "three"]));

    list.undo().unwrap();
    list.undo().unwrap();
    assert!(list.to_json().as_array().unwrap().is_empty());
}

#[test]
fn test_undo_and_redo_are_not_recorded() {
    let (_remote, list) = undoable(&[]);

    list.push("a".into()).unwrap();
    list.undo().unwrap();
    list.redo().unwrap();
    list.undo().unwrap();

    assert!(!list.can_undo());
    assert!(list.can_redo());
}

#[test]
fn test_clear_undo_forgets_history() {
    let (_remote, list) = undoable(&[]);

    list.push("a".into()).unwrap();
    list.push("b".into()).unwrap();
    list.undo().unwrap();
    list.clear_undo();

    assert!(!list.can_undo());
    assert!(!list.can_redo());
    assert!(!list.undo().unwrap());
    assert!(!list.redo().unwrap());
    assert_eq!(list.to_json(), json!(["a"]));
}

#[test]
fn test_dispose_stops_recording() {
    let (remote, list) = undoable(&["a"]);
    let handle = list.list().clone();

    list.dispose();

    assert!(handle.is_disposed());
    assert!(!list.can_undo());
    assert_eq!(remote.listener_count(), 0);
}

#[test]
fn test_clear_undo_inside_compound() {
    let (_remote, list) = undoable(&[]);

    list.begin_compound_operation(true);
    list.push("a".into()).unwrap();
    list.clear_undo();
    list.end_compound_operation();

    assert!(!list.can_undo());
    assert!(!list.undo().unwrap());
    assert_eq!(list.to_json(), json!(["a"]));

    list.push("b".into()).unwrap();
    assert!(list.undo().unwrap());
    assert_eq!(list.to_json(), json!(["a"]));
}

#[test]
fn test_undo_follows_collaborator_insert() {
    let (remote, list) = undoable(&["a"]);

    list.push("mine".into()).unwrap();
    remote.remote_insert(0, primitive(json!("peer")));
    assert_eq!(list.to_json(), json!(["peer", "a", "mine"]));

    assert!(list.undo().unwrap());
    assert_eq!(list.to_json(), json!(["peer", "a"]));
    assert_eq!(cosync::realtime::RemoteValue::List(remote.clone()).to_json(), json!(["peer", "a"]));

    assert!(list.redo().unwrap());
    assert_eq!(list.to_json(), json!(["peer", "a", "mine"]));
}

#[test]
fn test_undo_follows_collaborator_removal_before_change() {
    let (remote, list) = undoable(&["a", "b"]);

    list.set(1, "B".into()).unwrap();
    remote.remote_remove_range(0, 1);
    assert_eq!(list.to_json(), json!(["B"]));

    assert!(list.undo().unwrap());
    assert_eq!(list.to_json(), json!(["b"]));
}

#[test]
fn test_collaborator_edit_of_recorded_change_drops_history() {
    let (remote, list) = undoable(&["a"]);

    list.push("mine".into()).unwrap();
    remote.remote_set(1, primitive(json!("theirs")));

    assert!(!list.can_undo());
    assert!(!list.undo().unwrap());
    assert_eq!(list.to_json(), json!(["a", "theirs"]));
}
