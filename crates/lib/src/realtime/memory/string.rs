//! In-memory collaborative string.

use uuid::Uuid;

use std::sync::Mutex;

use crate::realtime::{CollaborativeString, Listener, ListenerId, StringEvent};
use crate::signal::Signal;
use crate::utils::{byte_offset, byte_range, char_len};

/// A collaborative string held in process memory.
///
/// Writes made through the [`CollaborativeString`] trait are reported to
/// listeners with `is_local = true`. The `remote_*` methods apply an edit as if
/// another collaborator had made it and report it with `is_local = false`.
#[derive(Debug)]
pub struct MemoryString {
    id: String,
    text: Mutex<String>,
    listeners: Signal<StringEvent>,
}

impl MemoryString {
    pub fn new(initial: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: Mutex::new(initial.to_string()),
            listeners: Signal::new(),
        }
    }

    /// Insert text on behalf of another collaborator.
    pub fn remote_insert(&self, index: usize, text: &str) {
        self.apply_insert(index, text, false);
    }

    /// Remove `start..end` on behalf of another collaborator.
    pub fn remote_remove(&self, start: usize, end: usize) {
        self.apply_remove(start, end, false);
    }

    /// Replace the whole text on behalf of another collaborator.
    pub fn remote_set_text(&self, text: &str) {
        self.apply_set(text, false);
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn apply_insert(&self, index: usize, text: &str, is_local: bool) {
        if text.is_empty() {
            return;
        }
        {
            let mut current = self.text.lock().unwrap();
            if index > char_len(&current) {
                tracing::warn!(id = %self.id, index, "Insert past the end of string ignored");
                return;
            }
            let offset = byte_offset(&current, index);
            current.insert_str(offset, text);
        }
        self.listeners.emit(&StringEvent::Inserted {
            index,
            text: text.to_string(),
            is_local,
        });
    }

    fn apply_remove(&self, start: usize, end: usize, is_local: bool) {
        let removed = {
            let mut current = self.text.lock().unwrap();
            if start >= end || end > char_len(&current) {
                tracing::warn!(id = %self.id, start, end, "Invalid string range ignored");
                return;
            }
            let range = byte_range(&current, start, end);
            current.drain(range).collect::<String>()
        };
        self.listeners.emit(&StringEvent::Deleted {
            index: start,
            text: removed,
            is_local,
        });
    }

    fn apply_set(&self, text: &str, is_local: bool) {
        let old = {
            let mut current = self.text.lock().unwrap();
            std::mem::replace(&mut *current, text.to_string())
        };
        if !old.is_empty() {
            self.listeners.emit(&StringEvent::Deleted {
                index: 0,
                text: old,
                is_local,
            });
        }
        if !text.is_empty() {
            self.listeners.emit(&StringEvent::Inserted {
                index: 0,
                text: text.to_string(),
                is_local,
            });
        }
    }
}

impl Default for MemoryString {
    fn default() -> Self {
        Self::new("")
    }
}

impl CollaborativeString for MemoryString {
    fn id(&self) -> &str {
        &self.id
    }

    fn text(&self) -> String {
        self.text.lock().unwrap().clone()
    }

    fn len(&self) -> usize {
        char_len(&self.text.lock().unwrap())
    }

    fn set_text(&self, text: &str) {
        self.apply_set(text, true);
    }

    fn insert_string(&self, index: usize, text: &str) {
        self.apply_insert(index, text, true);
    }

    fn remove_range(&self, start: usize, end: usize) {
        self.apply_remove(start, end, true);
    }

    fn add_listener(&self, listener: Listener<StringEvent>) -> ListenerId {
        self.listeners.connect_slot(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.disconnect(id)
    }
}
