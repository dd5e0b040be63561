//! In-process realtime provider.
//!
//! This module implements every trait of the realtime seam in memory. The
//! ModelDB uses [`MemoryDocument`] as the temporary document that serves
//! factory calls before the network document has loaded, and tests use the
//! whole module as a stand-in for the network service: each object exposes
//! `remote_*` methods that behave like edits made by another collaborator.

mod document;
mod list;
mod map;
mod provider;
mod string;

use std::sync::Arc;

pub use document::MemoryDocument;
pub use list::MemoryList;
pub use map::MemoryMap;
pub use provider::MemoryProvider;
pub use string::MemoryString;

use crate::realtime::{CollaborativeList, CollaborativeMap, CollaborativeModel, CollaborativeString};

/// Object model of an in-memory document.
#[derive(Debug)]
pub struct MemoryModel {
    root: Arc<MemoryMap>,
}

impl MemoryModel {
    pub fn new() -> Self {
        Self {
            root: Arc::new(MemoryMap::new()),
        }
    }

    /// The root map as its concrete type.
    pub fn root_map(&self) -> &Arc<MemoryMap> {
        &self.root
    }

    /// Deep JSON snapshot of the whole model.
    pub fn to_json(&self) -> serde_json::Value {
        self.root.to_json()
    }
}

impl Default for MemoryModel {
    fn default() -> Self {
        Self::new()
    }
}

impl CollaborativeModel for MemoryModel {
    fn root(&self) -> Arc<dyn CollaborativeMap> {
        self.root.clone()
    }

    fn create_string(&self, initial: &str) -> Arc<dyn CollaborativeString> {
        Arc::new(MemoryString::new(initial))
    }

    fn create_list(&self) -> Arc<dyn CollaborativeList> {
        Arc::new(MemoryList::new())
    }

    fn create_map(&self) -> Arc<dyn CollaborativeMap> {
        Arc::new(MemoryMap::new())
    }
}
