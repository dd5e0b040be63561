//! Bridges between local observable containers and remote collaborative objects.
//!
//! Each bridge owns exactly one remote handle and a local mirror of its
//! content. Local mutations are written to the remote object first and then
//! applied to the mirror, all in the calling turn, followed by exactly one
//! change event with [`WriteSource::Local`]. Remote notifications flagged
//! `is_local` are echoes of those writes and are dropped; all others update the
//! mirror and are re-emitted with [`WriteSource::Remote`].
//!
//! # Core Types
//!
//! - [`ObservableString`] - mirrors a collaborative string
//! - [`ObservableList`] - mirrors a collaborative list
//! - [`ObservableMap`] - mirrors a collaborative map, wrapping nested objects
//! - [`ObservableUndoableList`] - a list bridge with undo/redo
//! - [`ObservableValue`] - a single JSON value stored under one map key
//! - [`Value`] - anything a mirrored container can hold

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::realtime::CollaborativeModel;

mod errors;
mod list;
mod map;
mod observable_value;
mod string;
mod undo;
mod value;

pub use errors::BridgeError;
pub use list::{ListChange, ListDelta, ObservableList};
pub use map::{MapChange, MapChangeKind, ObservableMap};
pub use observable_value::{ObservableValue, ValueChange};
pub use string::{ObservableString, StringChange, StringChangeKind};
pub use undo::ObservableUndoableList;
pub use value::Value;

pub(crate) use list::remote_move_destination;
pub(crate) use value::Relinker;

/// Indicates whether a change originated from this client or from the remote document.
///
/// Local changes are those issued through a bridge method. Remote changes are
/// collaborator edits propagated from the service, and the one-off resync a
/// bridge emits when it is re-pointed at a different remote object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteSource {
    /// Change issued through the bridge
    Local,
    /// Change received from the remote document
    Remote,
}

impl WriteSource {
    pub fn is_local(self) -> bool {
        matches!(self, WriteSource::Local)
    }
}

/// Equality used by lists and maps to detect no-op writes and to find values.
pub type Comparator = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// The default comparator: JSON values by content, containers by identity.
pub fn strict_equality() -> Comparator {
    Arc::new(|a: &Value, b: &Value| a == b)
}

/// Non-owning reference from a bridge to the model it creates children in.
pub(crate) type ModelRef = Weak<dyn CollaborativeModel>;

/// Existing local containers keyed by the id of the remote object they mirror.
///
/// Used when a mirror is rebuilt so bridges that already mirror an object
/// are reused instead of wrapped a second time.
pub(crate) type Reuse = HashMap<String, Value>;

pub(crate) fn model_ref(model: &Arc<dyn CollaborativeModel>) -> ModelRef {
    Arc::downgrade(model)
}
