//! List bridge tests

use std::sync::Arc;

use cosync::bridge::{ListChange, ListDelta};
use cosync::realtime::memory::MemoryList;
use cosync::realtime::{CollaborativeList, RemoteValue};
use cosync::{ObservableList, ObservableMap, Value, WriteSource};
use serde_json::json;

use crate::helpers::*;

fn bridged() -> (Arc<MemoryList>, ObservableList) {
    let model = memory_model();
    let remote = Arc::new(MemoryList::new());
    let list = ObservableList::from_remote(remote.clone(), &model);
    (remote, list)
}

fn abcd() -> (Arc<MemoryList>, ObservableList) {
    let (remote, list) = bridged();
    list.push_all(vec!["a".into(), "b".into(), "c".into(), "d".into()])
        .unwrap();
    (remote, list)
}

fn remote_json(remote: &Arc<MemoryList>) -> serde_json::Value {
    RemoteValue::List(remote.clone()).to_json()
}

#[test]
fn test_list_move_forward() {
    let (remote, list) = abcd();
    let events = Recorder::attach(list.changed());

    list.move_item(0, 2).unwrap();

    assert_eq!(list.to_json(), json!(["b", "c", "a", "d"]));
    assert_eq!(remote_json(&remote), json!(["b", "c", "a", "d"]));
    assert_eq!(
        events.events(),
        vec![ListChange {
            delta: ListDelta::Move {
                from: 0,
                to: 2,
                values: vec!["a".into()],
            },
            origin: WriteSource::Local,
        }]
    );
}

#[test]
fn test_list_move_backward() {
    let (remote, list) = abcd();

    list.move_item(3, 0).unwrap();

    assert_eq!(list.to_json(), json!(["d", "a", "b", "c"]));
    assert_eq!(remote_json(&remote), json!(["d", "a", "b", "c"]));
}

#[test]
fn test_list_move_to_every_position_stays_in_sync() {
    for from in 0..4 {
        for to in 0..4 {
            let (remote, list) = abcd();
            list.move_item(from, to).unwrap();
            assert_eq!(list.to_json(), remote_json(&remote), "move({from}, {to})");
            assert_eq!(list.get(to), remote.get(to).map(|v| Value::Json(v.to_json())));
        }
    }
}

#[test]
fn test_list_push_all_emits_one_event() {
    let (remote, list) = bridged();
    let events = Recorder::attach(list.changed());

    let len = list.push_all(vec![1.into(), 2.into(), 3.into()]).unwrap();

    assert_eq!(len, 3);
    assert_eq!(remote.len(), 3);
    assert_eq!(events.len(), 1);
    let change = events.last().unwrap();
    match change.delta {
        ListDelta::Add { index, values } => {
            assert_eq!(index, 0);
            assert_eq!(values, vec![Value::from(1), Value::from(2), Value::from(3)]);
        }
        other => panic!("Expected an add, got {other:?}"),
    }
}

#[test]
fn test_list_insert_and_remove() {
    let (remote, list) = abcd();

    assert_eq!(list.insert(1, "x".into()).unwrap(), 5);
    assert_eq!(list.to_json(), json!(["a", "x", "b", "c", "d"]));

    let removed = list.remove(0).unwrap();
    assert!(removed == "a");
    let removed = list.remove_range(1, 3).unwrap();
    assert_eq!(removed, vec![Value::from("b"), Value::from("c")]);

    assert_eq!(list.to_json(), json!(["x", "d"]));
    assert_eq!(remote_json(&remote), json!(["x", "d"]));

    list.clear().unwrap();
    assert!(list.is_empty());
    assert!(remote.is_empty());
}

#[test]
fn test_list_set_returns_old_and_skips_equal() {
    let (remote, list) = abcd();
    let events = Recorder::attach(list.changed());

    let old = list.set(1, "B".into()).unwrap();
    assert!(old == "b");
    assert_eq!(events.len(), 1);

    let old = list.set(1, "B".into()).unwrap();
    assert!(old == "B");
    assert_eq!(events.len(), 1);
    assert_eq!(remote_json(&remote), json!(["a", "B", "c", "d"]));
}

#[test]
fn test_list_remove_value_uses_comparator() {
    let (_remote, list) = bridged();
    let list = list.with_comparator(Arc::new(|a: &Value, b: &Value| {
        match (a.as_str(), b.as_str()) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            _ => a == b,
        }
    }));
    list.push_all(vec!["Markdown".into(), "Code".into()]).unwrap();

    assert_eq!(list.remove_value(&"code".into()).unwrap(), Some(1));
    assert_eq!(list.remove_value(&"raw".into()).unwrap(), None);
    assert_eq!(list.to_json(), json!(["Markdown"]));
}

#[test]
fn test_list_remote_changes_propagate() {
    let (remote, list) = abcd();
    let events = Recorder::attach(list.changed());

    remote.remote_insert(1, primitive(json!("x")));
    assert_eq!(list.to_json(), json!(["a", "x", "b", "c", "d"]));
    remote.remote_remove_range(3, 5);
    assert_eq!(list.to_json(), json!(["a", "x", "b"]));
    remote.remote_set(0, primitive(json!("A")));
    assert_eq!(list.to_json(), json!(["A", "x", "b"]));

    let kinds: Vec<_> = events.events().iter().map(|e| e.delta.kind()).collect();
    assert_eq!(kinds, vec!["add", "remove", "set"]);
    assert!(events.events().iter().all(|e| e.origin == WriteSource::Remote));
}

#[test]
fn test_list_local_writes_do_not_echo() {
    let (_remote, list) = abcd();
    let events = Recorder::attach(list.changed());

    list.push("e".into()).unwrap();
    list.move_item(4, 0).unwrap();
    list.remove(2).unwrap();

    assert_eq!(events.len(), 3);
    assert!(events.events().iter().all(|e| e.origin == WriteSource::Local));
}

#[test]
fn test_list_remote_move_keeps_nested_bridge() {
    let model = memory_model();
    let list = ObservableList::create(&model);
    let cell = ObservableMap::create(&model);
    cell.set("source", "print(1)".into()).unwrap();
    list.push_all(vec![Value::from(cell.clone()), "b".into(), "c".into()])
        .unwrap();

    let remote = list.remote().unwrap();
    let memory = Arc::new(MemoryList::with_values(remote.values()));
    list.swap_remote(memory.clone(), &model).unwrap();
    memory.remote_move(0, 2);

    assert_eq!(list.to_json(), json!(["b", {"source": "print(1)"}, "c"]));
    let moved = list.get(1).unwrap();
    assert!(moved.as_map().unwrap().ptr_eq(&cell));
}

#[test]
fn test_list_rejects_unbridged_container() {
    let model = memory_model();
    let (remote, list) = bridged();
    let orphan = ObservableMap::create(&model);
    orphan.dispose();

    let err = list
        .push_all(vec!["ok".into(), Value::from(orphan)])
        .unwrap_err();

    assert!(err.is_usage_error());
    assert!(list.is_empty());
    assert!(remote.is_empty());
}

#[test]
fn test_list_index_errors() {
    let (_remote, list) = abcd();

    assert!(list.get(4).is_none());
    assert!(list.set(4, "x".into()).unwrap_err().is_usage_error());
    assert!(list.insert(5, "x".into()).unwrap_err().is_usage_error());
    assert!(list.remove(4).unwrap_err().is_usage_error());
    assert!(list.remove_range(3, 5).unwrap_err().is_usage_error());
    assert!(list.move_item(0, 4).unwrap_err().is_usage_error());
    assert_eq!(list.len(), 4);

    let Err(cosync::Error::Bridge(err)) = list.remove_range(2, 1) else {
        panic!("Expected a bridge error for a reversed range");
    };
    assert!(err.is_index_error());
    assert!(!err.is_disposed());
}

#[test]
fn test_list_iter_and_dispose() {
    let (remote, list) = abcd();
    let collected: Vec<String> = list
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    assert_eq!(collected, vec!["a", "b", "c", "d"]);

    list.dispose();
    list.dispose();
    assert!(list.is_disposed());
    assert_eq!(remote.listener_count(), 0);
    assert!(list.push("e".into()).unwrap_err().is_disposed());
}
