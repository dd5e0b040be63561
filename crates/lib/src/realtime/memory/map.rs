//! In-memory collaborative map.

use std::collections::BTreeMap;
use std::sync::Mutex;

use uuid::Uuid;

use crate::realtime::{CollaborativeMap, Listener, ListenerId, MapEvent, RemoteValue};
use crate::signal::Signal;

/// A collaborative map held in process memory.
///
/// Trait writes are reported with `is_local = true`, the `remote_*` methods
/// with `is_local = false`.
#[derive(Debug)]
pub struct MemoryMap {
    id: String,
    entries: Mutex<BTreeMap<String, RemoteValue>>,
    listeners: Signal<MapEvent>,
}

impl MemoryMap {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entries: Mutex::new(BTreeMap::new()),
            listeners: Signal::new(),
        }
    }

    /// Set a key on behalf of another collaborator.
    pub fn remote_set(&self, key: &str, value: RemoteValue) -> Option<RemoteValue> {
        self.apply_set(key, value, false)
    }

    /// Delete a key on behalf of another collaborator.
    pub fn remote_delete(&self, key: &str) -> Option<RemoteValue> {
        self.apply_delete(key, false)
    }

    /// Deep JSON snapshot of the map.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries()
                .into_iter()
                .map(|(key, value)| (key, value.to_json()))
                .collect(),
        )
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn apply_set(&self, key: &str, value: RemoteValue, is_local: bool) -> Option<RemoteValue> {
        let old = self
            .entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.clone());
        self.listeners.emit(&MapEvent {
            property: key.to_string(),
            old_value: old.clone(),
            new_value: Some(value),
            is_local,
        });
        old
    }

    fn apply_delete(&self, key: &str, is_local: bool) -> Option<RemoteValue> {
        let old = self.entries.lock().unwrap().remove(key)?;
        self.listeners.emit(&MapEvent {
            property: key.to_string(),
            old_value: Some(old.clone()),
            new_value: None,
            is_local,
        });
        Some(old)
    }
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

impl CollaborativeMap for MemoryMap {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: &str) -> Option<RemoteValue> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: RemoteValue) -> Option<RemoteValue> {
        self.apply_set(key, value, true)
    }

    fn delete(&self, key: &str) -> Option<RemoteValue> {
        self.apply_delete(key, true)
    }

    fn keys(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    fn entries(&self) -> Vec<(String, RemoteValue)> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    fn add_listener(&self, listener: Listener<MapEvent>) -> ListenerId {
        self.listeners.connect_slot(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.disconnect(id)
    }
}
