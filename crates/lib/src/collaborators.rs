//! Collaborator presence.
//!
//! The realtime service reports which sessions are connected to a document.
//! [`CollaboratorMap`] mirrors that roster into a map stored in the document
//! itself, keyed by session id, so every client sees the same presence records
//! and can attach its own payload (a cursor position, a selection) to them.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::Result;
use crate::bridge::{MapChange, MapChangeKind, ObservableMap, Value, WriteSource};
use crate::realtime::{
    CollaborativeDocument, CollaboratorEvent, CollaboratorInfo, ListenerId, RealtimeError,
    RemoteValue,
};
use crate::signal::Signal;
use crate::utils::initials;

/// A collaborator presence record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collaborator {
    pub user_id: String,

    /// Key of the record in the presence map
    pub session_id: String,

    pub display_name: String,

    /// Display color assigned by the service
    pub color: String,

    /// Initials of the display name
    pub short_name: String,

    /// Application payload published by the collaborator
    #[serde(default)]
    pub presence: serde_json::Value,
}

impl Collaborator {
    pub fn from_info(info: &CollaboratorInfo) -> Self {
        Self {
            user_id: info.user_id.clone(),
            session_id: info.session_id.clone(),
            display_name: info.display_name.clone(),
            color: info.color.clone(),
            short_name: initials(&info.display_name),
            presence: serde_json::Value::Null,
        }
    }

    fn to_value(&self) -> Result<Value> {
        Ok(Value::Json(serde_json::to_value(self)?))
    }

    fn from_value(value: &Value) -> Option<Self> {
        let json = value.as_json()?;
        match serde_json::from_value(json.clone()) {
            Ok(collaborator) => Some(collaborator),
            Err(err) => {
                tracing::warn!(error = %err, "Ignoring malformed presence record");
                None
            }
        }
    }
}

/// Change event of a [`CollaboratorMap`].
#[derive(Debug, Clone, PartialEq)]
pub struct CollaboratorChange {
    pub kind: MapChangeKind,
    pub session_id: String,
    pub old_value: Option<Collaborator>,
    pub new_value: Option<Collaborator>,
    pub origin: WriteSource,
}

/// The collaborators of one document, keyed by session id.
///
/// Cheap to clone; clones share the same map.
#[derive(Clone)]
pub struct CollaboratorMap {
    inner: Arc<CollaboratorsInner>,
}

struct CollaboratorsInner {
    map: ObservableMap,
    document: Arc<dyn CollaborativeDocument>,
    listener: Mutex<Option<ListenerId>>,
    local: Mutex<Option<Collaborator>>,
    changed: Signal<CollaboratorChange>,
}

impl CollaboratorMap {
    /// Mirror the collaborators of `document` into the map at `presence_key`
    /// of its root, creating that map if needed.
    ///
    /// Records of sessions the service no longer reports are purged, and every
    /// present session gets a record.
    pub fn new(document: Arc<dyn CollaborativeDocument>, presence_key: &str) -> Result<Self> {
        if document.is_closed() {
            return Err(RealtimeError::DocumentClosed.into());
        }
        let model = document.model();
        let root = model.root();
        let remote = match root.get(presence_key) {
            Some(RemoteValue::Map(remote)) => remote,
            existing => {
                if let Some(other) = existing {
                    tracing::warn!(key = presence_key, kind = other.kind(), "Replacing non-map presence entry");
                }
                let remote = model.create_map();
                root.set(presence_key, RemoteValue::Map(remote.clone()));
                remote
            }
        };
        let map = ObservableMap::from_remote(remote, &model);

        let present = document.collaborators();
        for session_id in map.keys() {
            if !present.iter().any(|info| info.session_id == session_id) {
                tracing::debug!(session = %session_id, "Purging stale collaborator");
                map.delete(&session_id)?;
            }
        }
        let mut local = None;
        for info in &present {
            let collaborator = match map.get(&info.session_id).as_ref().and_then(Collaborator::from_value) {
                Some(existing) => existing,
                None => {
                    let collaborator = Collaborator::from_info(info);
                    map.set(&info.session_id, collaborator.to_value()?)?;
                    collaborator
                }
            };
            if info.is_me {
                local = Some(collaborator);
            }
        }

        let inner = Arc::new(CollaboratorsInner {
            map,
            document: document.clone(),
            listener: Mutex::new(None),
            local: Mutex::new(local),
            changed: Signal::new(),
        });

        let weak = Arc::downgrade(&inner);
        inner.map.changed().connect(move |change: &MapChange| {
            if let Some(inner) = weak.upgrade() {
                inner.forward(change);
            }
        });
        let weak = Arc::downgrade(&inner);
        let listener = document.add_collaborator_listener(Arc::new(move |event: &CollaboratorEvent| {
            if let Some(inner) = weak.upgrade() {
                inner.on_collaborator_event(event);
            }
        }));
        *inner.listener.lock().unwrap() = Some(listener);

        Ok(Self { inner })
    }

    /// The record of this client's own session.
    pub fn local_collaborator(&self) -> Option<Collaborator> {
        self.inner.local.lock().unwrap().clone()
    }

    /// Publish a presence payload for this client's session.
    ///
    /// Returns false if the service did not report a local session.
    pub fn set_local_presence(&self, presence: serde_json::Value) -> Result<bool> {
        let Some(mut local) = self.local_collaborator() else {
            return Ok(false);
        };
        local.presence = presence;
        self.inner.map.set(&local.session_id, local.to_value()?)?;
        *self.inner.local.lock().unwrap() = Some(local);
        Ok(true)
    }

    pub fn get(&self, session_id: &str) -> Option<Collaborator> {
        self.inner
            .map
            .get(session_id)
            .as_ref()
            .and_then(Collaborator::from_value)
    }

    pub fn has(&self, session_id: &str) -> bool {
        self.inner.map.has(session_id)
    }

    /// Session ids in ascending order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.map.keys()
    }

    pub fn values(&self) -> Vec<Collaborator> {
        self.inner
            .map
            .values()
            .iter()
            .filter_map(Collaborator::from_value)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.map.is_empty()
    }

    pub fn changed(&self) -> &Signal<CollaboratorChange> {
        &self.inner.changed
    }

    /// The underlying map bridge.
    pub fn map(&self) -> &ObservableMap {
        &self.inner.map
    }

    /// Stop following the roster and dispose the map bridge.
    pub fn dispose(&self) {
        if let Some(id) = self.inner.listener.lock().unwrap().take() {
            self.inner.document.remove_collaborator_listener(id);
        }
        self.inner.map.dispose();
        self.inner.changed.disconnect_all();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.map.is_disposed()
    }
}

impl CollaboratorsInner {
    fn on_collaborator_event(&self, event: &CollaboratorEvent) {
        let result = match event {
            CollaboratorEvent::Joined(info) => {
                tracing::debug!(session = %info.session_id, user = %info.user_id, "Collaborator joined");
                let collaborator = Collaborator::from_info(info);
                if info.is_me {
                    *self.local.lock().unwrap() = Some(collaborator.clone());
                }
                collaborator
                    .to_value()
                    .and_then(|value| self.map.set(&info.session_id, value))
                    .map(|_| ())
            }
            CollaboratorEvent::Left(info) => {
                tracing::debug!(session = %info.session_id, user = %info.user_id, "Collaborator left");
                {
                    let mut local = self.local.lock().unwrap();
                    if local.as_ref().is_some_and(|c| c.session_id == info.session_id) {
                        *local = None;
                    }
                }
                self.map.delete(&info.session_id).map(|_| ())
            }
        };
        if let Err(err) = result {
            tracing::warn!(error = %err, "Failed to update presence map");
        }
    }

    fn forward(&self, change: &MapChange) {
        self.changed.emit(&CollaboratorChange {
            kind: change.kind,
            session_id: change.key.clone(),
            old_value: change.old_value.as_ref().and_then(Collaborator::from_value),
            new_value: change.new_value.as_ref().and_then(Collaborator::from_value),
            origin: change.origin,
        });
    }
}

impl Drop for CollaboratorsInner {
    fn drop(&mut self) {
        if let Some(id) = self.listener.get_mut().unwrap().take() {
            self.document.remove_collaborator_listener(id);
        }
    }
}

impl std::fmt::Debug for CollaboratorMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollaboratorMap")
            .field("sessions", &self.keys())
            .field("local", &self.local_collaborator().map(|c| c.session_id))
            .finish()
    }
}
