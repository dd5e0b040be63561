use std::sync::{Arc, Mutex};

use cosync::Signal;
use cosync::realtime::memory::MemoryModel;
use cosync::realtime::{CollaborativeModel, CollaboratorInfo, RemoteValue};

// Re-export tokio test macro for convenience
pub use tokio;

/// A fresh in-memory model to create bridges in.
pub fn memory_model() -> Arc<dyn CollaborativeModel> {
    Arc::new(MemoryModel::new())
}

/// A JSON primitive as stored by the remote service.
pub fn primitive(value: serde_json::Value) -> RemoteValue {
    RemoteValue::Primitive(value)
}

/// A collaborator session as reported by the service.
pub fn session(session_id: &str, display_name: &str, is_me: bool) -> CollaboratorInfo {
    CollaboratorInfo {
        user_id: format!("user-{session_id}"),
        session_id: session_id.to_string(),
        display_name: display_name.to_string(),
        color: "#3367d6".to_string(),
        is_me,
    }
}

/// Records every event emitted on a signal.
pub struct Recorder<T> {
    events: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn attach(signal: &Signal<T>) -> Self {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        signal.connect(move |event: &T| sink.lock().unwrap().push(event.clone()));
        Self { events }
    }

    pub fn events(&self) -> Vec<T> {
        self.events.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<T> {
        self.events.lock().unwrap().last().cloned()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}
