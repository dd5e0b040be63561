//! Map bridge.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use super::value::index_children;
use super::{BridgeError, Comparator, ModelRef, Reuse, Value, WriteSource, model_ref, strict_equality};
use crate::Result;
use crate::realtime::{CollaborativeMap, CollaborativeModel, ListenerId, MapEvent};
use crate::signal::Signal;

/// What a [`MapChange`] did to its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapChangeKind {
    Add,
    Remove,
    Change,
}

/// Change event of an [`ObservableMap`].
#[derive(Debug, Clone, PartialEq)]
pub struct MapChange {
    pub kind: MapChangeKind,
    pub key: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub origin: WriteSource,
}

/// An observable key/value container mirrored against a collaborative map.
///
/// Cheap to clone; clones share the same bridge. Values that are collaborative
/// objects on the remote side are wrapped in nested bridges.
#[derive(Clone)]
pub struct ObservableMap {
    inner: Arc<MapInner>,
}

struct MapInner {
    state: Mutex<MapState>,
    changed: Signal<MapChange>,
}

struct MapState {
    remote: Option<Arc<dyn CollaborativeMap>>,
    listener: Option<ListenerId>,
    model: ModelRef,
    entries: BTreeMap<String, Value>,
    comparator: Comparator,
}

impl ObservableMap {
    /// Create a new collaborative map in `model` and bridge it.
    pub fn create(model: &Arc<dyn CollaborativeModel>) -> Self {
        Self::from_remote(model.create_map(), model)
    }

    /// Bridge an existing collaborative map whose objects live in `model`.
    pub fn from_remote(remote: Arc<dyn CollaborativeMap>, model: &Arc<dyn CollaborativeModel>) -> Self {
        Self::attach(remote, model_ref(model), &Reuse::new())
    }

    pub(crate) fn attach(remote: Arc<dyn CollaborativeMap>, model: ModelRef, reuse: &Reuse) -> Self {
        let entries = remote
            .entries()
            .iter()
            .map(|(key, value)| (key.clone(), Value::from_remote(value, &model, reuse)))
            .collect();
        let inner = Arc::new(MapInner {
            state: Mutex::new(MapState {
                remote: None,
                listener: None,
                model,
                entries,
                comparator: strict_equality(),
            }),
            changed: Signal::new(),
        });
        let listener = inner.attach(&remote);
        {
            let mut state = inner.state.lock().unwrap();
            state.remote = Some(remote);
            state.listener = Some(listener);
        }
        Self { inner }
    }

    /// Replace the equality used to detect no-op writes.
    pub fn with_comparator(self, comparator: Comparator) -> Self {
        self.inner.state.lock().unwrap().comparator = comparator;
        self
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.state.lock().unwrap().entries.get(key).cloned()
    }

    pub fn has(&self, key: &str) -> bool {
        self.inner.state.lock().unwrap().entries.contains_key(key)
    }

    /// Keys in ascending order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.state.lock().unwrap().entries.keys().cloned().collect()
    }

    pub fn values(&self) -> Vec<Value> {
        self.inner.state.lock().unwrap().entries.values().cloned().collect()
    }

    pub fn entries(&self) -> Vec<(String, Value)> {
        self.inner
            .state
            .lock()
            .unwrap()
            .entries
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().unwrap().entries.is_empty()
    }

    /// Set `key` to `value`, returning the previous value.
    ///
    /// If the key already holds a value the comparator considers equal,
    /// nothing is written and no event is emitted.
    pub fn set(&self, key: &str, value: Value) -> Result<Option<Value>> {
        let remote = self.remote_or_disposed()?;
        let (old, comparator) = {
            let state = self.inner.state.lock().unwrap();
            (state.entries.get(key).cloned(), state.comparator.clone())
        };
        if let Some(old) = &old {
            if comparator(old, &value) {
                return Ok(Some(old.clone()));
            }
        }

        remote.set(key, value.to_remote()?);
        self.inner
            .state
            .lock()
            .unwrap()
            .entries
            .insert(key.to_string(), value.clone());

        self.inner.changed.emit(&MapChange {
            kind: if old.is_some() {
                MapChangeKind::Change
            } else {
                MapChangeKind::Add
            },
            key: key.to_string(),
            old_value: old.clone(),
            new_value: Some(value),
            origin: WriteSource::Local,
        });
        Ok(old)
    }

    /// Move a container into this map's model and store it under `key`.
    ///
    /// The container and everything nested in it are copied into new remote
    /// objects of the model this map creates children in; the existing bridges
    /// are re-pointed at the copies, so handles held elsewhere stay valid.
    pub fn link_set(&self, key: &str, value: Value) -> Result<Option<Value>> {
        if !value.is_container() {
            return Err(BridgeError::NotLinkable {
                key: key.to_string(),
                kind: value.kind(),
            }
            .into());
        }
        let model = {
            let state = self.inner.state.lock().unwrap();
            if state.remote.is_none() {
                return Err(BridgeError::Disposed { kind: "map" }.into());
            }
            state.model.upgrade()
        }
        .ok_or(BridgeError::ModelUnavailable { kind: "map" })?;

        value.relink(&model)?;
        self.set(key, value)
    }

    /// Delete `key`, returning its value. Deleting a missing key is a no-op.
    pub fn delete(&self, key: &str) -> Result<Option<Value>> {
        let remote = self.remote_or_disposed()?;
        if !self.has(key) {
            return Ok(None);
        }

        remote.delete(key);
        let old = self.inner.state.lock().unwrap().entries.remove(key);

        self.inner.changed.emit(&MapChange {
            kind: MapChangeKind::Remove,
            key: key.to_string(),
            old_value: old.clone(),
            new_value: None,
            origin: WriteSource::Local,
        });
        Ok(old)
    }

    /// Delete every key, one change per key.
    pub fn clear(&self) -> Result<()> {
        for key in self.keys() {
            self.delete(&key)?;
        }
        Ok(())
    }

    /// Change events for local and remote edits.
    pub fn changed(&self) -> &Signal<MapChange> {
        &self.inner.changed
    }

    /// The bridged remote map, `None` once disposed.
    pub fn remote(&self) -> Option<Arc<dyn CollaborativeMap>> {
        self.inner.state.lock().unwrap().remote.clone()
    }

    /// Object id of the bridged remote map.
    pub fn remote_id(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .unwrap()
            .remote
            .as_ref()
            .map(|remote| remote.id().to_string())
    }

    /// Re-point the bridge at another remote map whose objects live in `model`.
    ///
    /// Nested bridges that already mirror an object of the new map are kept.
    /// One event with [`WriteSource::Remote`] is emitted for every key whose
    /// content differs.
    pub fn swap_remote(
        &self,
        remote: Arc<dyn CollaborativeMap>,
        model: &Arc<dyn CollaborativeModel>,
    ) -> Result<()> {
        let listener = self.inner.attach(&remote);
        let changes = {
            let mut state = self.inner.state.lock().unwrap();
            let Some(old) = state.remote.take() else {
                remote.remove_listener(listener);
                return Err(BridgeError::Disposed { kind: "map" }.into());
            };
            if let Some(id) = state.listener.take() {
                old.remove_listener(id);
            }
            tracing::debug!(from = %old.id(), to = %remote.id(), "Re-pointing map bridge");

            state.model = model_ref(model);
            let changes = state.rebuild(&remote);
            state.remote = Some(remote);
            state.listener = Some(listener);
            changes
        };

        for change in &changes {
            self.inner.changed.emit(change);
        }
        Ok(())
    }

    /// Detach from the remote map and drop all subscribers.
    ///
    /// Nested bridges are left alone. Disposing twice is a no-op.
    pub fn dispose(&self) {
        let detached = {
            let mut state = self.inner.state.lock().unwrap();
            state.remote.take().map(|remote| (remote, state.listener.take()))
        };
        if let Some((remote, listener)) = detached {
            if let Some(id) = listener {
                remote.remove_listener(id);
            }
            self.inner.changed.disconnect_all();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().unwrap().remote.is_none()
    }

    /// Check whether two handles refer to the same bridge.
    pub fn ptr_eq(&self, other: &ObservableMap) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
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

    fn remote_or_disposed(&self) -> Result<Arc<dyn CollaborativeMap>> {
        self.remote()
            .ok_or_else(|| BridgeError::Disposed { kind: "map" }.into())
    }
}

impl MapInner {
    fn attach(self: &Arc<Self>, remote: &Arc<dyn CollaborativeMap>) -> ListenerId {
        let weak = Arc::downgrade(self);
        remote.add_listener(Arc::new(move |event: &MapEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.on_remote_event(event);
            }
        }))
    }

    fn on_remote_event(&self, event: &MapEvent) {
        if event.is_local {
            tracing::trace!(key = %event.property, "Dropping local echo on map bridge");
            return;
        }

        let change = {
            let mut state = self.state.lock().unwrap();
            if state.remote.is_none() {
                return;
            }
            let key = event.property.clone();
            match &event.new_value {
                None => {
                    let Some(old) = state.entries.remove(&key) else {
                        return;
                    };
                    MapChange {
                        kind: MapChangeKind::Remove,
                        key,
                        old_value: Some(old),
                        new_value: None,
                        origin: WriteSource::Remote,
                    }
                }
                Some(new_value) => {
                    let old = state.entries.get(&key).cloned();
                    let reuse = index_children(old.iter());
                    let value = Value::from_remote(new_value, &state.model, &reuse);
                    state.entries.insert(key.clone(), value.clone());
                    MapChange {
                        kind: if old.is_some() {
                            MapChangeKind::Change
                        } else {
                            MapChangeKind::Add
                        },
                        key,
                        old_value: old,
                        new_value: Some(value),
                        origin: WriteSource::Remote,
                    }
                }
            }
        };
        self.changed.emit(&change);
    }
}

impl MapState {
    /// Reload the mirror from `remote` and describe every key that changed.
    fn rebuild(&mut self, remote: &Arc<dyn CollaborativeMap>) -> Vec<MapChange> {
        let reuse = index_children(self.entries.values());
        let fresh: BTreeMap<String, Value> = remote
            .entries()
            .iter()
            .map(|(key, value)| (key.clone(), Value::from_remote(value, &self.model, &reuse)))
            .collect();
        let previous = std::mem::replace(&mut self.entries, fresh);

        let keys: BTreeSet<&String> = previous.keys().chain(self.entries.keys()).collect();
        keys.into_iter()
            .filter_map(|key| {
                let old = previous.get(key);
                let new = self.entries.get(key);
                let kind = match (old, new) {
                    (None, Some(_)) => MapChangeKind::Add,
                    (Some(_), None) => MapChangeKind::Remove,
                    (Some(a), Some(b)) if a.to_json() != b.to_json() => MapChangeKind::Change,
                    _ => return None,
                };
                Some(MapChange {
                    kind,
                    key: key.clone(),
                    old_value: old.cloned(),
                    new_value: new.cloned(),
                    origin: WriteSource::Remote,
                })
            })
            .collect()
    }
}

impl Drop for MapInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap();
        if let (Some(remote), Some(id)) = (state.remote.take(), state.listener.take()) {
            remote.remove_listener(id);
        }
    }
}

impl std::fmt::Debug for ObservableMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableMap")
            .field("remote", &self.remote_id())
            .field("keys", &self.keys())
            .finish()
    }
}
