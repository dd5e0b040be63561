//! Error types for the realtime provider seam.

use thiserror::Error;

/// Errors reported while locating, loading or talking to a realtime document.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// The file path could not be resolved to a resource
    #[error("Resource not found for path: {path}")]
    ResourceNotFound { path: String },

    /// The realtime document could not be loaded or created
    #[error("Failed to load realtime document '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    /// The document connection has been closed
    #[error("Realtime document is closed")]
    DocumentClosed,
}

impl RealtimeError {
    /// Check if this error indicates a resource was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, RealtimeError::ResourceNotFound { .. })
    }

    /// Check if this error happened while loading a document
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            RealtimeError::LoadFailed { .. } | RealtimeError::ResourceNotFound { .. }
        )
    }

    /// Check if the document was already closed
    pub fn is_closed(&self) -> bool {
        matches!(self, RealtimeError::DocumentClosed)
    }

    /// Get the path if this is a path-related error
    pub fn path(&self) -> Option<&str> {
        match self {
            RealtimeError::ResourceNotFound { path } | RealtimeError::LoadFailed { path, .. } => {
                Some(path)
            }
            _ => None,
        }
    }
}

impl From<RealtimeError> for crate::Error {
    fn from(err: RealtimeError) -> Self {
        crate::Error::Realtime(err)
    }
}
