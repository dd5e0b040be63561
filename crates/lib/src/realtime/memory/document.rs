//! In-memory realtime document with a collaborator roster.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use super::MemoryModel;
use crate::realtime::{
    CollaborativeDocument, CollaborativeModel, CollaboratorEvent, CollaboratorInfo, Listener,
    ListenerId,
};
use crate::signal::Signal;

/// A realtime document held in process memory.
#[derive(Debug)]
pub struct MemoryDocument {
    id: String,
    model: Arc<MemoryModel>,
    collaborators: Mutex<Vec<CollaboratorInfo>>,
    listeners: Signal<CollaboratorEvent>,
    closed: AtomicBool,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            model: Arc::new(MemoryModel::new()),
            collaborators: Mutex::new(Vec::new()),
            listeners: Signal::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The model as its concrete type.
    pub fn memory_model(&self) -> &Arc<MemoryModel> {
        &self.model
    }

    /// Register a collaborator session and notify listeners.
    ///
    /// Re-joining an existing session replaces its record.
    pub fn join(&self, info: CollaboratorInfo) {
        {
            let mut collaborators = self.collaborators.lock().unwrap();
            collaborators.retain(|c| c.session_id != info.session_id);
            collaborators.push(info.clone());
        }
        self.listeners.emit(&CollaboratorEvent::Joined(info));
    }

    /// Remove a collaborator session and notify listeners.
    pub fn leave(&self, session_id: &str) -> bool {
        let removed = {
            let mut collaborators = self.collaborators.lock().unwrap();
            let position = collaborators.iter().position(|c| c.session_id == session_id);
            position.map(|index| collaborators.remove(index))
        };
        match removed {
            Some(info) => {
                self.listeners.emit(&CollaboratorEvent::Left(info));
                true
            }
            None => false,
        }
    }

    /// Drop a session from the roster without sending a leave notification,
    /// as happens when a client disconnects abruptly.
    pub fn drop_session(&self, session_id: &str) {
        self.collaborators
            .lock()
            .unwrap()
            .retain(|c| c.session_id != session_id);
    }

    /// Check whether a session is in the roster.
    pub fn has_session(&self, session_id: &str) -> bool {
        self.collaborators
            .lock()
            .unwrap()
            .iter()
            .any(|c| c.session_id == session_id)
    }

    /// Number of registered collaborator listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deep JSON snapshot of the document content.
    pub fn to_json(&self) -> serde_json::Value {
        self.model.to_json()
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl CollaborativeDocument for MemoryDocument {
    fn model(&self) -> Arc<dyn CollaborativeModel> {
        self.model.clone()
    }

    fn collaborators(&self) -> Vec<CollaboratorInfo> {
        self.collaborators.lock().unwrap().clone()
    }

    fn add_collaborator_listener(&self, listener: Listener<CollaboratorEvent>) -> ListenerId {
        self.listeners.connect_slot(listener)
    }

    fn remove_collaborator_listener(&self, id: ListenerId) -> bool {
        self.listeners.disconnect(id)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(id = %self.id, "Closing in-memory document");
        self.listeners.disconnect_all();
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
