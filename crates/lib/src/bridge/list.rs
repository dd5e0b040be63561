//! List bridge.

use std::sync::{Arc, Mutex};

use super::value::index_children;
use super::{BridgeError, Comparator, ModelRef, Reuse, Value, WriteSource, model_ref, strict_equality};
use crate::Result;
use crate::realtime::{CollaborativeList, CollaborativeModel, ListEvent, ListenerId, RemoteValue};
use crate::signal::Signal;

/// What happened to a list.
///
/// Indices refer to the list before the change for removals and moves, and
/// after it for additions. After a `Move` the moved value sits at `to`.
#[derive(Debug, Clone, PartialEq)]
pub enum ListDelta {
    Add {
        index: usize,
        values: Vec<Value>,
    },
    Remove {
        index: usize,
        values: Vec<Value>,
    },
    Set {
        index: usize,
        old_values: Vec<Value>,
        new_values: Vec<Value>,
    },
    Move {
        from: usize,
        to: usize,
        values: Vec<Value>,
    },
}

impl ListDelta {
    /// Returns the variant name as a string
    pub fn kind(&self) -> &'static str {
        match self {
            ListDelta::Add { .. } => "add",
            ListDelta::Remove { .. } => "remove",
            ListDelta::Set { .. } => "set",
            ListDelta::Move { .. } => "move",
        }
    }
}

/// Change event of an [`ObservableList`].
#[derive(Debug, Clone, PartialEq)]
pub struct ListChange {
    pub delta: ListDelta,
    pub origin: WriteSource,
}

/// Destination to hand the realtime service for a local move.
///
/// Locally `to` is where the value ends up. The service instead expects the
/// slot, counted before the move, in front of which the value is placed.
pub(crate) fn remote_move_destination(from: usize, to: usize) -> usize {
    if from < to { to + 1 } else { to }
}

/// An observable sequence mirrored against a collaborative list.
///
/// Cheap to clone; clones share the same bridge. Nested remote objects are
/// wrapped in their own bridges and stay the same bridge across remote moves.
#[derive(Clone)]
pub struct ObservableList {
    inner: Arc<ListInner>,
}

struct ListInner {
    state: Mutex<ListState>,
    changed: Signal<ListChange>,
}

struct ListState {
    remote: Option<Arc<dyn CollaborativeList>>,
    listener: Option<ListenerId>,
    model: ModelRef,
    values: Vec<Value>,
    comparator: Comparator,
    /// Containers from the last remote removal, reused if they come back.
    recently_removed: Reuse,
}

impl ObservableList {
    /// Create a new collaborative list in `model` and bridge it.
    pub fn create(model: &Arc<dyn CollaborativeModel>) -> Self {
        Self::from_remote(model.create_list(), model)
    }

    /// Bridge an existing collaborative list whose objects live in `model`.
    pub fn from_remote(remote: Arc<dyn CollaborativeList>, model: &Arc<dyn CollaborativeModel>) -> Self {
        Self::attach(remote, model_ref(model), &Reuse::new())
    }

    pub(crate) fn attach(remote: Arc<dyn CollaborativeList>, model: ModelRef, reuse: &Reuse) -> Self {
        let values = wrap_all(&remote.values(), &model, reuse);
        let inner = Arc::new(ListInner {
            state: Mutex::new(ListState {
                remote: None,
                listener: None,
                model,
                values,
                comparator: strict_equality(),
                recently_removed: Reuse::new(),
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

    /// Replace the equality used for no-op detection and [`remove_value`](Self::remove_value).
    pub fn with_comparator(self, comparator: Comparator) -> Self {
        self.inner.state.lock().unwrap().comparator = comparator;
        self
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().unwrap().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().unwrap().values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner.state.lock().unwrap().values.get(index).cloned()
    }

    /// Snapshot of the mirrored values.
    pub fn values(&self) -> Vec<Value> {
        self.inner.state.lock().unwrap().values.clone()
    }

    /// Iterate over a snapshot of the mirrored values.
    pub fn iter(&self) -> std::vec::IntoIter<Value> {
        self.values().into_iter()
    }

    /// Index of the first value equal to `value` under the list's comparator.
    pub fn index_of(&self, value: &Value) -> Option<usize> {
        let (values, comparator) = {
            let state = self.inner.state.lock().unwrap();
            (state.values.clone(), state.comparator.clone())
        };
        values.iter().position(|candidate| comparator(candidate, value))
    }

    /// Replace the value at `index`, returning the previous one.
    ///
    /// Nothing is written if the comparator says the values are equal.
    pub fn set(&self, index: usize, value: Value) -> Result<Value> {
        let remote = self.remote_or_disposed()?;
        let (old, comparator) = {
            let state = self.inner.state.lock().unwrap();
            let len = state.values.len();
            let old = state
                .values
                .get(index)
                .cloned()
                .ok_or(BridgeError::IndexOutOfBounds { index, len })?;
            (old, state.comparator.clone())
        };
        if comparator(&old, &value) {
            return Ok(old);
        }

        remote.set(index, value.to_remote()?);
        self.inner.state.lock().unwrap().values[index] = value.clone();

        self.emit_local(ListDelta::Set {
            index,
            old_values: vec![old.clone()],
            new_values: vec![value],
        });
        Ok(old)
    }

    /// Append a value, returning the new length.
    pub fn push(&self, value: Value) -> Result<usize> {
        let len = self.len();
        self.insert_all(len, vec![value])
    }

    /// Append several values as one change, returning the new length.
    pub fn push_all(&self, values: Vec<Value>) -> Result<usize> {
        let len = self.len();
        self.insert_all(len, values)
    }

    /// Insert a value at `index`, returning the new length.
    pub fn insert(&self, index: usize, value: Value) -> Result<usize> {
        self.insert_all(index, vec![value])
    }

    /// Insert several values starting at `index` as one change.
    ///
    /// Every value is checked before anything is written, so an un-bridged
    /// container leaves the list untouched.
    pub fn insert_all(&self, index: usize, values: Vec<Value>) -> Result<usize> {
        let remote = self.remote_or_disposed()?;
        let len = self.len();
        if index > len {
            return Err(BridgeError::IndexOutOfBounds { index, len }.into());
        }
        if values.is_empty() {
            return Ok(len);
        }

        let remote_values = values
            .iter()
            .map(Value::to_remote)
            .collect::<Result<Vec<RemoteValue>>>()?;
        for (offset, remote_value) in remote_values.into_iter().enumerate() {
            remote.insert(index + offset, remote_value);
        }
        let new_len = {
            let mut state = self.inner.state.lock().unwrap();
            state.values.splice(index..index, values.iter().cloned());
            state.values.len()
        };

        self.emit_local(ListDelta::Add { index, values });
        Ok(new_len)
    }

    /// Remove and return the value at `index`.
    pub fn remove(&self, index: usize) -> Result<Value> {
        let remote = self.remote_or_disposed()?;
        let len = self.len();
        if index >= len {
            return Err(BridgeError::IndexOutOfBounds { index, len }.into());
        }

        remote.remove(index);
        let value = self.inner.state.lock().unwrap().values.remove(index);

        self.emit_local(ListDelta::Remove {
            index,
            values: vec![value.clone()],
        });
        Ok(value)
    }

    /// Remove the first value equal to `value`, returning its former index.
    pub fn remove_value(&self, value: &Value) -> Result<Option<usize>> {
        self.remote_or_disposed()?;
        match self.index_of(value) {
            Some(index) => {
                self.remove(index)?;
                Ok(Some(index))
            }
            None => Ok(None),
        }
    }

    /// Remove the values in `start..end` as one change.
    pub fn remove_range(&self, start: usize, end: usize) -> Result<Vec<Value>> {
        let remote = self.remote_or_disposed()?;
        let len = self.len();
        if start > end || end > len {
            return Err(BridgeError::InvalidRange { start, end, len }.into());
        }
        if start == end {
            return Ok(Vec::new());
        }

        remote.remove_range(start, end);
        let removed: Vec<Value> = self
            .inner
            .state
            .lock()
            .unwrap()
            .values
            .drain(start..end)
            .collect();

        self.emit_local(ListDelta::Remove {
            index: start,
            values: removed.clone(),
        });
        Ok(removed)
    }

    /// Remove every value.
    pub fn clear(&self) -> Result<()> {
        let len = self.len();
        self.remove_range(0, len).map(|_| ())
    }

    /// Move the value at `from` so that it ends up at index `to`.
    pub fn move_item(&self, from: usize, to: usize) -> Result<()> {
        let remote = self.remote_or_disposed()?;
        let len = self.len();
        if from >= len {
            return Err(BridgeError::IndexOutOfBounds { index: from, len }.into());
        }
        if to >= len {
            return Err(BridgeError::IndexOutOfBounds { index: to, len }.into());
        }
        if from == to {
            return Ok(());
        }

        remote.move_item(from, remote_move_destination(from, to));
        let value = {
            let mut state = self.inner.state.lock().unwrap();
            let value = state.values.remove(from);
            state.values.insert(to, value.clone());
            value
        };

        self.emit_local(ListDelta::Move {
            from,
            to,
            values: vec![value],
        });
        Ok(())
    }

    /// Change events for local and remote edits.
    pub fn changed(&self) -> &Signal<ListChange> {
        &self.inner.changed
    }

    /// The bridged remote list, `None` once disposed.
    pub fn remote(&self) -> Option<Arc<dyn CollaborativeList>> {
        self.inner.state.lock().unwrap().remote.clone()
    }

    /// Object id of the bridged remote list.
    pub fn remote_id(&self) -> Option<String> {
        self.inner
            .state
            .lock()
            .unwrap()
            .remote
            .as_ref()
            .map(|remote| remote.id().to_string())
    }

    /// Re-point the bridge at another remote list whose objects live in `model`.
    ///
    /// Nested bridges that already mirror an object of the new list are kept.
    /// If the content differs, one `Set` over the whole list is emitted with
    /// [`WriteSource::Remote`].
    pub fn swap_remote(
        &self,
        remote: Arc<dyn CollaborativeList>,
        model: &Arc<dyn CollaborativeModel>,
    ) -> Result<()> {
        let listener = self.inner.attach(&remote);
        let delta = {
            let mut state = self.inner.state.lock().unwrap();
            let Some(old) = state.remote.take() else {
                remote.remove_listener(listener);
                return Err(BridgeError::Disposed { kind: "list" }.into());
            };
            if let Some(id) = state.listener.take() {
                old.remove_listener(id);
            }
            tracing::debug!(from = %old.id(), to = %remote.id(), "Re-pointing list bridge");

            let before = json_of(&state.values);
            state.model = model_ref(model);
            let delta = state.rebuild(&remote);
            state.remote = Some(remote);
            state.listener = Some(listener);
            if json_of(&state.values) == before {
                None
            } else {
                Some(delta)
            }
        };

        if let Some(delta) = delta {
            self.inner.changed.emit(&ListChange {
                delta,
                origin: WriteSource::Remote,
            });
        }
        Ok(())
    }

    /// Detach from the remote list and drop all subscribers.
    ///
    /// Nested bridges are left alone. Disposing twice is a no-op.
    pub fn dispose(&self) {
        let detached = {
            let mut state = self.inner.state.lock().unwrap();
            state.recently_removed.clear();
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
    pub fn ptr_eq(&self, other: &ObservableList) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Deep JSON snapshot of the list.
    pub fn to_json(&self) -> serde_json::Value {
        json_of(&self.values())
    }

    fn remote_or_disposed(&self) -> Result<Arc<dyn CollaborativeList>> {
        self.remote()
            .ok_or_else(|| BridgeError::Disposed { kind: "list" }.into())
    }

    fn emit_local(&self, delta: ListDelta) {
        self.inner.changed.emit(&ListChange {
            delta,
            origin: WriteSource::Local,
        });
    }
}

impl ListInner {
    fn attach(self: &Arc<Self>, remote: &Arc<dyn CollaborativeList>) -> ListenerId {
        let weak = Arc::downgrade(self);
        remote.add_listener(Arc::new(move |event: &ListEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.on_remote_event(event);
            }
        }))
    }

    fn on_remote_event(&self, event: &ListEvent) {
        if event.is_local() {
            tracing::trace!("Dropping local echo on list bridge");
            return;
        }

        let delta = {
            let mut state = self.state.lock().unwrap();
            let Some(remote) = state.remote.clone() else {
                return;
            };
            let len = state.values.len();
            match event {
                ListEvent::ValuesAdded { index, values, .. } if *index <= len => {
                    let reuse = std::mem::take(&mut state.recently_removed);
                    let added = wrap_all(values, &state.model, &reuse);
                    state.values.splice(*index..*index, added.iter().cloned());
                    ListDelta::Add {
                        index: *index,
                        values: added,
                    }
                }
                ListEvent::ValuesRemoved { index, values, .. } if index + values.len() <= len => {
                    let removed: Vec<Value> =
                        state.values.drain(*index..index + values.len()).collect();
                    state.recently_removed = index_children(&removed);
                    ListDelta::Remove {
                        index: *index,
                        values: removed,
                    }
                }
                ListEvent::ValuesSet {
                    index, new_values, ..
                } if index + new_values.len() <= len => {
                    state.recently_removed.clear();
                    let end = index + new_values.len();
                    let reuse = index_children(&state.values[*index..end]);
                    let added = wrap_all(new_values, &state.model, &reuse);
                    let old_values: Vec<Value> =
                        state.values.splice(*index..end, added.iter().cloned()).collect();
                    ListDelta::Set {
                        index: *index,
                        old_values,
                        new_values: added,
                    }
                }
                _ => {
                    tracing::warn!(id = %remote.id(), "List event out of range, resyncing mirror");
                    state.rebuild(&remote)
                }
            }
        };

        self.changed.emit(&ListChange {
            delta,
            origin: WriteSource::Remote,
        });
    }
}

impl ListState {
    /// Reload the mirror from `remote`, reusing existing nested bridges.
    fn rebuild(&mut self, remote: &Arc<dyn CollaborativeList>) -> ListDelta {
        let reuse = index_children(&self.values);
        self.recently_removed.clear();
        let new_values = wrap_all(&remote.values(), &self.model, &reuse);
        let old_values = std::mem::replace(&mut self.values, new_values.clone());
        ListDelta::Set {
            index: 0,
            old_values,
            new_values,
        }
    }
}

impl Drop for ListInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap();
        if let (Some(remote), Some(id)) = (state.remote.take(), state.listener.take()) {
            remote.remove_listener(id);
        }
    }
}

impl std::fmt::Debug for ObservableList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableList")
            .field("remote", &self.remote_id())
            .field("len", &self.len())
            .finish()
    }
}

fn wrap_all(values: &[RemoteValue], model: &ModelRef, reuse: &Reuse) -> Vec<Value> {
    values
        .iter()
        .map(|value| Value::from_remote(value, model, reuse))
        .collect()
}

fn json_of(values: &[Value]) -> serde_json::Value {
    serde_json::Value::Array(values.iter().map(Value::to_json).collect())
}
