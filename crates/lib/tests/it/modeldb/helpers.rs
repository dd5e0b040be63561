//! Helpers for ModelDB tests

use std::sync::Arc;

use cosync::realtime::memory::{MemoryDocument, MemoryProvider};
use cosync::{ModelDB, ModelDbConfig};

pub const NOTEBOOK: &str = "notebooks/analysis.ipynb";

/// Open `NOTEBOOK` on a fresh provider without waiting for the connection.
pub fn open_db() -> (Arc<MemoryProvider>, ModelDB) {
    let provider = Arc::new(MemoryProvider::new());
    let db = ModelDB::open(ModelDbConfig::new(NOTEBOOK), provider.clone());
    (provider, db)
}

/// Open `NOTEBOOK` on a provider that already holds `document` for it.
pub fn open_existing(document: Arc<MemoryDocument>) -> (Arc<MemoryProvider>, ModelDB) {
    let provider = Arc::new(MemoryProvider::new());
    provider.insert_document(NOTEBOOK, document);
    let db = ModelDB::open(ModelDbConfig::new(NOTEBOOK), provider.clone());
    (provider, db)
}

/// Open and wait until connected.
pub async fn connected_db() -> (Arc<MemoryProvider>, ModelDB) {
    let (provider, db) = open_db();
    db.connected().await.expect("Failed to connect document");
    (provider, db)
}
