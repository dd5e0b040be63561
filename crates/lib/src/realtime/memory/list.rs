//! In-memory collaborative list.

use std::sync::Mutex;

use uuid::Uuid;

use crate::realtime::{CollaborativeList, ListEvent, Listener, ListenerId, RemoteValue};
use crate::signal::Signal;

/// A collaborative list held in process memory.
///
/// Trait writes are reported with `is_local = true`, the `remote_*` methods
/// with `is_local = false`. A move is reported as a removal followed by an
/// addition, the way the realtime service reports it.
#[derive(Debug)]
pub struct MemoryList {
    id: String,
    items: Mutex<Vec<RemoteValue>>,
    listeners: Signal<ListEvent>,
}

impl MemoryList {
    pub fn new() -> Self {
        Self::with_values(Vec::new())
    }

    pub fn with_values(values: Vec<RemoteValue>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            items: Mutex::new(values),
            listeners: Signal::new(),
        }
    }

    /// Insert a value on behalf of another collaborator.
    pub fn remote_insert(&self, index: usize, value: RemoteValue) {
        self.apply_insert(index, vec![value], false);
    }

    /// Append a value on behalf of another collaborator.
    pub fn remote_push(&self, value: RemoteValue) {
        let len = self.len();
        self.apply_insert(len, vec![value], false);
    }

    /// Remove `start..end` on behalf of another collaborator.
    pub fn remote_remove_range(&self, start: usize, end: usize) {
        self.apply_remove(start, end, false);
    }

    /// Replace the value at `index` on behalf of another collaborator.
    pub fn remote_set(&self, index: usize, value: RemoteValue) {
        self.apply_set(index, value, false);
    }

    /// Move an element on behalf of another collaborator.
    pub fn remote_move(&self, index: usize, destination: usize) {
        self.apply_move(index, destination, false);
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn apply_insert(&self, index: usize, values: Vec<RemoteValue>, is_local: bool) {
        if values.is_empty() {
            return;
        }
        {
            let mut items = self.items.lock().unwrap();
            if index > items.len() {
                tracing::warn!(id = %self.id, index, len = items.len(), "Insert past the end of list ignored");
                return;
            }
            items.splice(index..index, values.iter().cloned());
        }
        self.listeners.emit(&ListEvent::ValuesAdded {
            index,
            values,
            is_local,
        });
    }

    fn apply_remove(&self, start: usize, end: usize, is_local: bool) {
        let removed: Vec<RemoteValue> = {
            let mut items = self.items.lock().unwrap();
            if start >= end || end > items.len() {
                tracing::warn!(id = %self.id, start, end, len = items.len(), "Invalid list range ignored");
                return;
            }
            items.drain(start..end).collect()
        };
        self.listeners.emit(&ListEvent::ValuesRemoved {
            index: start,
            values: removed,
            is_local,
        });
    }

    fn apply_set(&self, index: usize, value: RemoteValue, is_local: bool) {
        let old = {
            let mut items = self.items.lock().unwrap();
            match items.get_mut(index) {
                Some(slot) => std::mem::replace(slot, value.clone()),
                None => {
                    tracing::warn!(id = %self.id, index, "Set past the end of list ignored");
                    return;
                }
            }
        };
        self.listeners.emit(&ListEvent::ValuesSet {
            index,
            old_values: vec![old],
            new_values: vec![value],
            is_local,
        });
    }

    fn apply_move(&self, index: usize, destination: usize, is_local: bool) {
        let len = self.len();
        if index >= len || destination > len {
            tracing::warn!(id = %self.id, index, destination, len, "Invalid move ignored");
            return;
        }
        // The destination names a slot in the list as it was before the move.
        let target = if destination > index {
            destination - 1
        } else {
            destination
        };
        if target == index {
            return;
        }
        let value = self.items.lock().unwrap()[index].clone();
        self.apply_remove(index, index + 1, is_local);
        self.apply_insert(target, vec![value], is_local);
    }
}

impl Default for MemoryList {
    fn default() -> Self {
        Self::new()
    }
}

impl CollaborativeList for MemoryList {
    fn id(&self) -> &str {
        &self.id
    }

    fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    fn get(&self, index: usize) -> Option<RemoteValue> {
        self.items.lock().unwrap().get(index).cloned()
    }

    fn values(&self) -> Vec<RemoteValue> {
        self.items.lock().unwrap().clone()
    }

    fn set(&self, index: usize, value: RemoteValue) {
        self.apply_set(index, value, true);
    }

    fn insert(&self, index: usize, value: RemoteValue) {
        self.apply_insert(index, vec![value], true);
    }

    fn remove(&self, index: usize) {
        self.apply_remove(index, index + 1, true);
    }

    fn remove_range(&self, start: usize, end: usize) {
        self.apply_remove(start, end, true);
    }

    fn move_item(&self, index: usize, destination: usize) {
        self.apply_move(index, destination, true);
    }

    fn add_listener(&self, listener: Listener<ListEvent>) -> ListenerId {
        self.listeners.connect_slot(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.disconnect(id)
    }
}
