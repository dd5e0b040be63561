//! In-memory document provider.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::MemoryDocument;
use crate::Result;
use crate::constants::MEMORY_RESOURCE_PREFIX;
use crate::realtime::{
    CollaborativeDocument, CollaboratorInfo, DocumentProvider, RealtimeError, ResourceDescriptor,
};

/// A [`DocumentProvider`] that keeps one [`MemoryDocument`] per file path.
///
/// Loading a path that has no document yet creates an empty one. When a local
/// user is configured, every load joins that user's session to the document.
#[derive(Debug, Default)]
pub struct MemoryProvider {
    documents: Mutex<HashMap<String, Arc<MemoryDocument>>>,
    local_user: Option<CollaboratorInfo>,
    failures: Mutex<VecDeque<String>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join `user` to every document this provider loads.
    pub fn with_local_user(mut self, mut user: CollaboratorInfo) -> Self {
        user.is_me = true;
        self.local_user = Some(user);
        self
    }

    /// Attach an existing document to a path.
    pub fn insert_document(&self, path: &str, document: Arc<MemoryDocument>) {
        self.documents
            .lock()
            .unwrap()
            .insert(path.to_string(), document);
    }

    /// The document attached to a path, if any.
    pub fn document(&self, path: &str) -> Option<Arc<MemoryDocument>> {
        self.documents.lock().unwrap().get(path).cloned()
    }

    /// Make the next load fail with `reason`.
    pub fn fail_next_load(&self, reason: impl Into<String>) {
        self.failures.lock().unwrap().push_back(reason.into());
    }
}

#[async_trait]
impl DocumentProvider for MemoryProvider {
    async fn resolve(&self, path: &str) -> Result<ResourceDescriptor> {
        if path.is_empty() {
            return Err(RealtimeError::ResourceNotFound {
                path: path.to_string(),
            }
            .into());
        }
        Ok(ResourceDescriptor {
            id: format!("{MEMORY_RESOURCE_PREFIX}{path}"),
            path: path.to_string(),
        })
    }

    async fn load(&self, resource: &ResourceDescriptor) -> Result<Arc<dyn CollaborativeDocument>> {
        if let Some(reason) = self.failures.lock().unwrap().pop_front() {
            return Err(RealtimeError::LoadFailed {
                path: resource.path.clone(),
                reason,
            }
            .into());
        }

        let document = self
            .documents
            .lock()
            .unwrap()
            .entry(resource.path.clone())
            .or_insert_with(|| Arc::new(MemoryDocument::new()))
            .clone();

        if let Some(user) = &self.local_user {
            if !document.has_session(&user.session_id) {
                document.join(user.clone());
            }
        }

        tracing::debug!(path = %resource.path, id = %document.id(), "Loaded in-memory document");
        Ok(document)
    }
}
