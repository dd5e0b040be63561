//! The value type of mirrored containers.
//!
//! A [`Value`] is either plain JSON or a reference to another bridge. The
//! conversions in this module are the only places where local values cross
//! into remote ones and back; each one matches every variant explicitly.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::{BridgeError, ModelRef, ObservableList, ObservableMap, ObservableString, Reuse};
use crate::Result;
use crate::realtime::{CollaborativeModel, RemoteValue};

/// A value that can live inside a mirrored list or map.
///
/// # Equality
///
/// JSON values compare by content. Container values compare by identity: two
/// `Value::List`s are equal only if they are handles to the same bridge. Use
/// [`Value::to_json`] to compare content.
#[derive(Clone)]
pub enum Value {
    /// A JSON primitive, array or object
    Json(serde_json::Value),
    /// A nested string bridge
    String(ObservableString),
    /// A nested list bridge
    List(ObservableList),
    /// A nested map bridge
    Map(ObservableMap),
}

impl Value {
    /// Returns the variant name as a string
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Json(_) => "json",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    /// Returns true if this value references another bridge
    pub fn is_container(&self) -> bool {
        !matches!(self, Value::Json(_))
    }

    /// Returns true if this is a container whose bridge was disposed
    pub fn is_disposed(&self) -> bool {
        match self {
            Value::Json(_) => false,
            Value::String(s) => s.is_disposed(),
            Value::List(l) => l.is_disposed(),
            Value::Map(m) => m.is_disposed(),
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Value::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&ObservableString> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ObservableList> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ObservableMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Attempts to read a JSON string
    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(serde_json::Value::as_str)
    }

    /// Attempts to read a JSON integer
    pub fn as_i64(&self) -> Option<i64> {
        self.as_json().and_then(serde_json::Value::as_i64)
    }

    /// Id of the remote object a container mirrors.
    pub fn remote_id(&self) -> Option<String> {
        match self {
            Value::Json(_) => None,
            Value::String(s) => s.remote_id(),
            Value::List(l) => l.remote_id(),
            Value::Map(m) => m.remote_id(),
        }
    }

    /// Deep JSON snapshot of the value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Json(value) => value.clone(),
            Value::String(s) => s.to_json(),
            Value::List(l) => l.to_json(),
            Value::Map(m) => m.to_json(),
        }
    }

    /// The remote value to store when this value is inserted into a container.
    ///
    /// Containers must still own a remote handle.
    pub fn to_remote(&self) -> Result<RemoteValue> {
        let not_bridged = || BridgeError::NotBridged { kind: self.kind() };
        Ok(match self {
            Value::Json(value) => RemoteValue::Primitive(value.clone()),
            Value::String(s) => RemoteValue::String(s.remote().ok_or_else(not_bridged)?),
            Value::List(l) => RemoteValue::List(l.remote().ok_or_else(not_bridged)?),
            Value::Map(m) => RemoteValue::Map(m.remote().ok_or_else(not_bridged)?),
        })
    }

    /// Wrap a remote value in the matching local type.
    ///
    /// Collaborative objects already mirrored by a bridge in `reuse` get that
    /// bridge back; others are wrapped in a new bridge, recursively.
    pub(crate) fn from_remote(remote: &RemoteValue, model: &ModelRef, reuse: &Reuse) -> Value {
        if let Some(existing) = remote.object_id().and_then(|id| reuse.get(id)) {
            if existing.kind() == remote.kind() {
                return existing.clone();
            }
        }
        match remote {
            RemoteValue::Primitive(value) => Value::Json(value.clone()),
            RemoteValue::String(handle) => Value::String(ObservableString::from_remote(handle.clone())),
            RemoteValue::List(handle) => {
                Value::List(ObservableList::attach(handle.clone(), model.clone(), reuse))
            }
            RemoteValue::Map(handle) => {
                Value::Map(ObservableMap::attach(handle.clone(), model.clone(), reuse))
            }
        }
    }

    /// Copy this value into freshly created objects of `model`.
    ///
    /// Containers are re-pointed at their new remote objects, nested
    /// containers first, so every bridge in the tree ends up backed by `model`.
    pub(crate) fn relink(&self, model: &Arc<dyn CollaborativeModel>) -> Result<RemoteValue> {
        Relinker::new(model).relink(self)
    }

    /// Fail with [`BridgeError::NotBridged`] if this value or any container
    /// nested in it was disposed.
    pub(crate) fn check_bridged(&self) -> Result<()> {
        self.check_bridged_in(&mut HashSet::new())
    }

    fn check_bridged_in(&self, seen: &mut HashSet<String>) -> Result<()> {
        if self.is_disposed() {
            return Err(BridgeError::NotBridged { kind: self.kind() }.into());
        }
        let Some(id) = self.remote_id() else {
            return Ok(());
        };
        if !seen.insert(id) {
            return Ok(());
        }
        match self {
            Value::List(l) => l.values().iter().try_for_each(|child| child.check_bridged_in(seen)),
            Value::Map(m) => m.values().iter().try_for_each(|child| child.check_bridged_in(seen)),
            Value::Json(_) | Value::String(_) => Ok(()),
        }
    }

    /// Same underlying bridge, or equal JSON.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Json(a), Value::Json(b)) => a == b,
            (Value::String(a), Value::String(b)) => a.ptr_eq(b),
            (Value::List(a), Value::List(b)) => a.ptr_eq(b),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Index the containers among `values` by the remote object they mirror.
pub(crate) fn index_children<'a>(values: impl IntoIterator<Item = &'a Value>) -> Reuse {
    values
        .into_iter()
        .filter_map(|value| value.remote_id().map(|id| (id, value.clone())))
        .collect()
}

/// Copies bridges into one target model, each remote object at most once.
///
/// Copies are remembered under the id of the object they replace and under
/// their own id, so a bridge reached a second time, directly or through
/// another container, resolves to the copy it already has.
pub(crate) struct Relinker<'a> {
    model: &'a Arc<dyn CollaborativeModel>,
    copies: HashMap<String, RemoteValue>,
}

impl<'a> Relinker<'a> {
    pub(crate) fn new(model: &'a Arc<dyn CollaborativeModel>) -> Self {
        Self {
            model,
            copies: HashMap::new(),
        }
    }

    /// A relinker that leaves every object reachable from the model's root
    /// where it is.
    pub(crate) fn with_reachable(model: &'a Arc<dyn CollaborativeModel>) -> Self {
        let mut relinker = Self::new(model);
        for (_, entry) in model.root().entries() {
            relinker.index(&entry);
        }
        relinker
    }

    /// The model copies are created in.
    pub(crate) fn model(&self) -> &'a Arc<dyn CollaborativeModel> {
        self.model
    }

    fn index(&mut self, remote: &RemoteValue) {
        let Some(id) = remote.object_id() else {
            return;
        };
        if self.copies.contains_key(id) {
            return;
        }
        self.copies.insert(id.to_string(), remote.clone());
        match remote {
            RemoteValue::List(list) => {
                for child in list.values() {
                    self.index(&child);
                }
            }
            RemoteValue::Map(map) => {
                for (_, child) in map.entries() {
                    self.index(&child);
                }
            }
            RemoteValue::Primitive(_) | RemoteValue::String(_) => {}
        }
    }

    /// The remote value `value` is stored as in the target model.
    pub(crate) fn relink(&mut self, value: &Value) -> Result<RemoteValue> {
        if value.is_disposed() {
            return Err(BridgeError::NotBridged { kind: value.kind() }.into());
        }
        let Some(id) = value.remote_id() else {
            return value.to_remote();
        };
        if let Some(copy) = self.copies.get(&id).cloned() {
            if copy.object_id() != Some(id.as_str()) {
                self.repoint(value, &copy)?;
            }
            return Ok(copy);
        }

        let copy = match value {
            Value::Json(json) => return Ok(RemoteValue::Primitive(json.clone())),
            Value::String(s) => RemoteValue::String(self.model.create_string(&s.text())),
            Value::List(_) => RemoteValue::List(self.model.create_list()),
            Value::Map(_) => RemoteValue::Map(self.model.create_map()),
        };
        self.remember(id, &copy);
        match (value, &copy) {
            (Value::List(l), RemoteValue::List(handle)) => {
                for child in l.values() {
                    handle.push(self.relink(&child)?);
                }
            }
            (Value::Map(m), RemoteValue::Map(handle)) => {
                for (key, child) in m.entries() {
                    handle.set(&key, self.relink(&child)?);
                }
            }
            _ => {}
        }
        self.repoint(value, &copy)?;
        Ok(copy)
    }

    fn remember(&mut self, original: String, copy: &RemoteValue) {
        if let Some(id) = copy.object_id() {
            self.copies.insert(id.to_string(), copy.clone());
        }
        self.copies.insert(original, copy.clone());
    }

    fn repoint(&self, value: &Value, copy: &RemoteValue) -> Result<()> {
        match (value, copy) {
            (Value::String(s), RemoteValue::String(handle)) => s.swap_remote(handle.clone()),
            (Value::List(l), RemoteValue::List(handle)) => l.swap_remote(handle.clone(), self.model),
            (Value::Map(m), RemoteValue::Map(handle)) => m.swap_remote(handle.clone(), self.model),
            _ => Ok(()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Json(value) => f.debug_tuple("Json").field(value).finish(),
            Value::String(s) => f.debug_tuple("String").field(&s.remote_id()).finish(),
            Value::List(l) => f.debug_tuple("List").field(&l.remote_id()).finish(),
            Value::Map(m) => f.debug_tuple("Map").field(&m.remote_id()).finish(),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Value::Json(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Json(serde_json::Value::String(value.to_string()))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Json(serde_json::Value::String(value))
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Json(value.into())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Json(value.into())
    }
}

impl From<ObservableString> for Value {
    fn from(value: ObservableString) -> Self {
        Value::String(value)
    }
}

impl From<ObservableList> for Value {
    fn from(value: ObservableList) -> Self {
        Value::List(value)
    }
}

impl From<ObservableMap> for Value {
    fn from(value: ObservableMap) -> Self {
        Value::Map(value)
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

impl PartialEq<i64> for Value {
    fn eq(&self, other: &i64) -> bool {
        self.as_i64() == Some(*other)
    }
}
