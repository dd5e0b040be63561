//! A single JSON value stored under one key of a collaborative map.

use std::sync::{Arc, Mutex};

use super::{BridgeError, WriteSource};
use crate::Result;
use crate::realtime::{CollaborativeMap, ListenerId, MapEvent, RemoteValue};
use crate::signal::Signal;

/// Change event of an [`ObservableValue`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValueChange {
    pub old_value: serde_json::Value,
    pub new_value: serde_json::Value,
    pub origin: WriteSource,
}

/// An observable JSON value kept at `key` of a collaborative map.
///
/// A missing key reads as `null`.
#[derive(Clone)]
pub struct ObservableValue {
    inner: Arc<ValueInner>,
}

struct ValueInner {
    key: String,
    state: Mutex<ValueState>,
    changed: Signal<ValueChange>,
}

struct ValueState {
    root: Option<Arc<dyn CollaborativeMap>>,
    listener: Option<ListenerId>,
    value: serde_json::Value,
}

impl ObservableValue {
    /// Bridge the entry `key` of `root`, storing `null` there if it is missing.
    pub fn new(root: Arc<dyn CollaborativeMap>, key: impl Into<String>) -> Self {
        let key = key.into();
        if !root.has(&key) {
            root.set(&key, RemoteValue::Primitive(serde_json::Value::Null));
        }
        let inner = Arc::new(ValueInner {
            key,
            state: Mutex::new(ValueState {
                root: None,
                listener: None,
                value: serde_json::Value::Null,
            }),
            changed: Signal::new(),
        });
        let listener = inner.attach(&root);
        {
            let mut state = inner.state.lock().unwrap();
            state.value = read(&root, &inner.key);
            state.root = Some(root);
            state.listener = Some(listener);
        }
        Self { inner }
    }

    /// The key this value is stored under.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn get(&self) -> serde_json::Value {
        self.inner.state.lock().unwrap().value.clone()
    }

    /// Store a new value. Storing an equal value is a no-op.
    pub fn set(&self, value: serde_json::Value) -> Result<()> {
        let root = self
            .inner
            .state
            .lock()
            .unwrap()
            .root
            .clone()
            .ok_or(BridgeError::Disposed { kind: "value" })?;
        let old_value = self.get();
        if old_value == value {
            return Ok(());
        }

        root.set(&self.inner.key, RemoteValue::Primitive(value.clone()));
        self.inner.state.lock().unwrap().value = value.clone();

        self.inner.changed.emit(&ValueChange {
            old_value,
            new_value: value,
            origin: WriteSource::Local,
        });
        Ok(())
    }

    pub fn changed(&self) -> &Signal<ValueChange> {
        &self.inner.changed
    }

    /// Re-point the value at the same key of another map.
    ///
    /// Emits one change with [`WriteSource::Remote`] if the stored value differs.
    pub fn swap_root(&self, root: Arc<dyn CollaborativeMap>) -> Result<()> {
        let listener = self.inner.attach(&root);
        let change = {
            let mut state = self.inner.state.lock().unwrap();
            let Some(old) = state.root.take() else {
                root.remove_listener(listener);
                return Err(BridgeError::Disposed { kind: "value" }.into());
            };
            if let Some(id) = state.listener.take() {
                old.remove_listener(id);
            }
            let value = read(&root, &self.inner.key);
            state.root = Some(root);
            state.listener = Some(listener);
            if value == state.value {
                None
            } else {
                Some(ValueChange {
                    old_value: std::mem::replace(&mut state.value, value.clone()),
                    new_value: value,
                    origin: WriteSource::Remote,
                })
            }
        };

        if let Some(change) = change {
            self.inner.changed.emit(&change);
        }
        Ok(())
    }

    /// Detach from the map and drop all subscribers. Disposing twice is a no-op.
    pub fn dispose(&self) {
        let detached = {
            let mut state = self.inner.state.lock().unwrap();
            state.root.take().map(|root| (root, state.listener.take()))
        };
        if let Some((root, listener)) = detached {
            if let Some(id) = listener {
                root.remove_listener(id);
            }
            self.inner.changed.disconnect_all();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().unwrap().root.is_none()
    }

    pub fn ptr_eq(&self, other: &ObservableValue) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl ValueInner {
    fn attach(self: &Arc<Self>, root: &Arc<dyn CollaborativeMap>) -> ListenerId {
        let weak = Arc::downgrade(self);
        root.add_listener(Arc::new(move |event: &MapEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.on_remote_event(event);
            }
        }))
    }

    fn on_remote_event(&self, event: &MapEvent) {
        if event.property != self.key {
            return;
        }
        if event.is_local {
            tracing::trace!(key = %self.key, "Dropping local echo on value bridge");
            return;
        }

        let new_value = event
            .new_value
            .as_ref()
            .map(RemoteValue::to_json)
            .unwrap_or(serde_json::Value::Null);
        let change = {
            let mut state = self.state.lock().unwrap();
            if state.root.is_none() || state.value == new_value {
                return;
            }
            ValueChange {
                old_value: std::mem::replace(&mut state.value, new_value.clone()),
                new_value,
                origin: WriteSource::Remote,
            }
        };
        self.changed.emit(&change);
    }
}

impl Drop for ValueInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap();
        if let (Some(root), Some(id)) = (state.root.take(), state.listener.take()) {
            root.remove_listener(id);
        }
    }
}

impl std::fmt::Debug for ObservableValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableValue")
            .field("key", &self.inner.key)
            .field("value", &self.get())
            .finish()
    }
}

fn read(root: &Arc<dyn CollaborativeMap>, key: &str) -> serde_json::Value {
    root.get(key)
        .map(|value| value.to_json())
        .unwrap_or(serde_json::Value::Null)
}
