//!
//! Cosync: keeps observable notebook models mirrored against a realtime collaborative document.
//! This library provides the bridge components and the per-document store that owns them.
//!
//! ## Core Concepts
//!
//! * **Remote primitives (`realtime`)**: The opaque collaborative string, list and map objects supplied by a
//!   realtime editing service, plus the document/model that creates them and the collaborator feed.
//!   `realtime::memory` is an in-process implementation used for offline documents and tests.
//! * **Bridges (`bridge`)**: `ObservableString`, `ObservableList` and `ObservableMap` each own one remote handle
//!   and a local mirror, apply every local mutation to the remote object in the same turn, and re-emit
//!   collaborator edits while dropping the echoes of their own writes.
//! * **Values (`bridge::Value`)**: Anything storable in a mirrored container: JSON, or another bridge.
//! * **Undo (`bridge::ObservableUndoableList`)**: A list bridge with compound-operation aware undo/redo.
//! * **Presence (`collaborators::CollaboratorMap`)**: The live collaborator roster mirrored into the document.
//! * **ModelDB (`modeldb::ModelDB`)**: Owns one document. Serves factory calls from a temporary in-memory model
//!   right away and moves every bridge over to the network document once it loads.

pub mod bridge;
pub mod collaborators;
pub mod constants;
pub mod modeldb;
pub mod realtime;
pub mod signal;
pub(crate) mod utils;

pub use bridge::{
    ObservableList, ObservableMap, ObservableString, ObservableUndoableList, ObservableValue,
    Value, WriteSource,
};
pub use collaborators::{Collaborator, CollaboratorChange, CollaboratorMap};
pub use modeldb::{ConnectionState, ModelDB, ModelDbConfig, Observable, ObservableKind};
pub use signal::{Signal, SlotId};

/// Result type used throughout the Cosync library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the Cosync library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Errors reported by the realtime provider
    #[error(transparent)]
    Realtime(realtime::RealtimeError),

    /// Errors raised by bridge operations
    #[error(transparent)]
    Bridge(bridge::BridgeError),

    /// Errors raised by the document store
    #[error(transparent)]
    ModelDb(modeldb::ModelDbError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Realtime(_) => "realtime",
            Error::Bridge(_) => "bridge",
            Error::ModelDb(_) => "modeldb",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error indicates a resource was not found.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Realtime(err) => err.is_not_found(),
            Error::ModelDb(err) => err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error means the object or store was already torn down.
    pub fn is_disposed(&self) -> bool {
        match self {
            Error::Bridge(err) => err.is_disposed(),
            Error::ModelDb(err) => err.is_disposed(),
            Error::Realtime(err) => err.is_closed(),
            _ => false,
        }
    }

    /// Check if this error came from loading the remote document.
    pub fn is_load_failure(&self) -> bool {
        match self {
            Error::Realtime(err) => err.is_load_failure(),
            Error::ModelDb(err) => err.is_load_failure(),
            _ => false,
        }
    }

    /// Check if this error is a programming error (a usage the API forbids).
    pub fn is_usage_error(&self) -> bool {
        match self {
            Error::Bridge(err) => err.is_usage_error(),
            Error::ModelDb(err) => err.is_usage_error(),
            _ => false,
        }
    }
}
