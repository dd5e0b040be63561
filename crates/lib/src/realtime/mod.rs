//! The realtime collaboration provider seam.
//!
//! A realtime editing service supplies ordered, eventually-consistent
//! collaborative primitives (string, list, map) created through a document
//! model, plus a collaborator join/leave feed. This module defines the traits
//! the bridges consume; the service's own conflict resolution is out of scope.
//!
//! Every remote event carries an `is_local` flag that is true when the event
//! reports a write made through this client. Bridges use it to drop the echoes
//! of their own writes.
//!
//! [`memory`] provides an in-process implementation of every trait.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::signal::{Slot, SlotId};

pub mod errors;
pub mod memory;

pub use errors::RealtimeError;

/// Listener callback for events of type `E`.
pub type Listener<E> = Slot<E>;

/// Id returned when registering a remote listener.
pub type ListenerId = SlotId;

/// Change notification from a collaborative string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringEvent {
    /// `text` was inserted at character offset `index`.
    Inserted {
        index: usize,
        text: String,
        is_local: bool,
    },
    /// `text` was deleted starting at character offset `index`.
    Deleted {
        index: usize,
        text: String,
        is_local: bool,
    },
}

impl StringEvent {
    /// Whether this event reports a write made through this client.
    pub fn is_local(&self) -> bool {
        match self {
            StringEvent::Inserted { is_local, .. } | StringEvent::Deleted { is_local, .. } => {
                *is_local
            }
        }
    }
}

/// Change notification from a collaborative list.
#[derive(Debug, Clone)]
pub enum ListEvent {
    /// `values` were inserted starting at `index`.
    ValuesAdded {
        index: usize,
        values: Vec<RemoteValue>,
        is_local: bool,
    },
    /// `values` were removed starting at `index`.
    ValuesRemoved {
        index: usize,
        values: Vec<RemoteValue>,
        is_local: bool,
    },
    /// The values starting at `index` were replaced.
    ValuesSet {
        index: usize,
        old_values: Vec<RemoteValue>,
        new_values: Vec<RemoteValue>,
        is_local: bool,
    },
}

impl ListEvent {
    /// Whether this event reports a write made through this client.
    pub fn is_local(&self) -> bool {
        match self {
            ListEvent::ValuesAdded { is_local, .. }
            | ListEvent::ValuesRemoved { is_local, .. }
            | ListEvent::ValuesSet { is_local, .. } => *is_local,
        }
    }
}

/// Change notification from a collaborative map.
///
/// An absent `old_value` means the key was added, an absent `new_value` means
/// it was deleted.
#[derive(Debug, Clone)]
pub struct MapEvent {
    pub property: String,
    pub old_value: Option<RemoteValue>,
    pub new_value: Option<RemoteValue>,
    pub is_local: bool,
}

/// A collaborator as reported by the realtime service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollaboratorInfo {
    pub user_id: String,
    pub session_id: String,
    pub display_name: String,
    pub color: String,
    /// True for the session of the user running this client.
    pub is_me: bool,
}

/// Collaborator join/leave notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorEvent {
    Joined(CollaboratorInfo),
    Left(CollaboratorInfo),
}

/// Identifies the stored file a realtime document is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    /// Provider-specific resource id
    pub id: String,
    /// The file path the resource was resolved from
    pub path: String,
}

/// A remote collaborative string.
///
/// Indices are character offsets.
pub trait CollaborativeString: Send + Sync {
    /// Stable object id, unique within the service.
    fn id(&self) -> &str;
    fn text(&self) -> String;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn set_text(&self, text: &str);
    fn insert_string(&self, index: usize, text: &str);
    /// Remove the characters in `start..end`.
    fn remove_range(&self, start: usize, end: usize);
    fn add_listener(&self, listener: Listener<StringEvent>) -> ListenerId;
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// A remote collaborative list.
pub trait CollaborativeList: Send + Sync {
    fn id(&self) -> &str;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn get(&self, index: usize) -> Option<RemoteValue>;
    fn values(&self) -> Vec<RemoteValue>;
    fn set(&self, index: usize, value: RemoteValue);
    fn insert(&self, index: usize, value: RemoteValue);
    fn push(&self, value: RemoteValue) {
        self.insert(self.len(), value);
    }
    fn remove(&self, index: usize);
    /// Remove the elements in `start..end`.
    fn remove_range(&self, start: usize, end: usize);
    fn clear(&self) {
        self.remove_range(0, self.len());
    }
    /// Move the element at `index` so it sits before the element that was at
    /// `destination` before the move. `destination == len()` moves to the end.
    fn move_item(&self, index: usize, destination: usize);
    fn add_listener(&self, listener: Listener<ListEvent>) -> ListenerId;
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// A remote collaborative map.
pub trait CollaborativeMap: Send + Sync {
    fn id(&self) -> &str;
    fn get(&self, key: &str) -> Option<RemoteValue>;
    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
    /// Set `key`, returning the previous value.
    fn set(&self, key: &str, value: RemoteValue) -> Option<RemoteValue>;
    /// Delete `key`, returning the previous value.
    fn delete(&self, key: &str) -> Option<RemoteValue>;
    fn keys(&self) -> Vec<String>;
    fn entries(&self) -> Vec<(String, RemoteValue)>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn add_listener(&self, listener: Listener<MapEvent>) -> ListenerId;
    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// The object model of a realtime document.
pub trait CollaborativeModel: Send + Sync {
    /// The root key/value container.
    fn root(&self) -> Arc<dyn CollaborativeMap>;
    fn create_string(&self, initial: &str) -> Arc<dyn CollaborativeString>;
    fn create_list(&self) -> Arc<dyn CollaborativeList>;
    fn create_map(&self) -> Arc<dyn CollaborativeMap>;
}

/// An open realtime document.
pub trait CollaborativeDocument: Send + Sync {
    fn model(&self) -> Arc<dyn CollaborativeModel>;
    /// Collaborators currently present, including this client's session.
    fn collaborators(&self) -> Vec<CollaboratorInfo>;
    fn add_collaborator_listener(&self, listener: Listener<CollaboratorEvent>) -> ListenerId;
    fn remove_collaborator_listener(&self, id: ListenerId) -> bool;
    /// Close the connection. Closing twice is a no-op.
    fn close(&self);
    fn is_closed(&self) -> bool;
}

/// The file-store side of the service: maps paths to realtime documents.
#[async_trait]
pub trait DocumentProvider: Send + Sync {
    /// Resolve a file path to its resource descriptor.
    async fn resolve(&self, path: &str) -> Result<ResourceDescriptor>;

    /// Load the realtime document attached to a resource, creating it if needed.
    async fn load(&self, resource: &ResourceDescriptor) -> Result<Arc<dyn CollaborativeDocument>>;
}

/// A value held by a remote collaborative container.
///
/// The remote service is untyped at this boundary; this closed variant is
/// matched exhaustively wherever a value crosses it.
#[derive(Clone)]
pub enum RemoteValue {
    Primitive(serde_json::Value),
    String(Arc<dyn CollaborativeString>),
    List(Arc<dyn CollaborativeList>),
    Map(Arc<dyn CollaborativeMap>),
}

impl RemoteValue {
    /// Returns the variant name as a string
    pub fn kind(&self) -> &'static str {
        match self {
            RemoteValue::Primitive(_) => "primitive",
            RemoteValue::String(_) => "string",
            RemoteValue::List(_) => "list",
            RemoteValue::Map(_) => "map",
        }
    }

    /// Object id of a collaborative object, `None` for primitives.
    pub fn object_id(&self) -> Option<&str> {
        match self {
            RemoteValue::Primitive(_) => None,
            RemoteValue::String(s) => Some(s.id()),
            RemoteValue::List(l) => Some(l.id()),
            RemoteValue::Map(m) => Some(m.id()),
        }
    }

    /// Deep JSON snapshot of the value.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            RemoteValue::Primitive(value) => value.clone(),
            RemoteValue::String(s) => serde_json::Value::String(s.text()),
            RemoteValue::List(l) => {
                serde_json::Value::Array(l.values().iter().map(RemoteValue::to_json).collect())
            }
            RemoteValue::Map(m) => serde_json::Value::Object(
                m.entries()
                    .into_iter()
                    .map(|(key, value)| (key, value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for RemoteValue {
    fn from(value: serde_json::Value) -> Self {
        RemoteValue::Primitive(value)
    }
}

impl fmt::Debug for RemoteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteValue::Primitive(value) => f.debug_tuple("Primitive").field(value).finish(),
            RemoteValue::String(s) => f.debug_tuple("String").field(&s.id()).finish(),
            RemoteValue::List(l) => f.debug_tuple("List").field(&l.id()).finish(),
            RemoteValue::Map(m) => f.debug_tuple("Map").field(&m.id()).finish(),
        }
    }
}
