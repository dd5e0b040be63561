//! Error types for the document store.

use thiserror::Error;

use super::ObservableKind;

/// Errors raised by [`ModelDB`](super::ModelDB) operations.
///
/// # Stability
///
/// - New variants may be added in minor versions (enum is `#[non_exhaustive]`)
/// - Helper methods like `is_*()` provide stable APIs
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ModelDbError {
    /// The network document could not be resolved or loaded.
    #[error("Failed to connect document '{path}': {reason}")]
    LoadFailed {
        /// File path of the document
        path: String,
        /// Rendered cause
        reason: String,
    },

    /// A value accessor was used on a path that does not hold a value.
    #[error("Path '{path}' does not hold a value")]
    NotAValue {
        /// The full path that was accessed
        path: String,
    },

    /// A factory was asked for a kind other than the one stored at the path.
    #[error("Path '{path}' holds a {actual}, not a {expected}")]
    KindMismatch {
        /// The full path that was accessed
        path: String,
        /// The kind the caller asked for
        expected: ObservableKind,
        /// The kind found at the path
        actual: ObservableKind,
    },

    /// The store was disposed.
    #[error("ModelDB has been disposed")]
    Disposed,
}

impl ModelDbError {
    /// Check if this error indicates nothing usable was found at a path
    pub fn is_not_found(&self) -> bool {
        matches!(self, ModelDbError::NotAValue { .. })
    }

    /// Check if the store was already disposed
    pub fn is_disposed(&self) -> bool {
        matches!(self, ModelDbError::Disposed)
    }

    /// Check if the network document failed to load
    pub fn is_load_failure(&self) -> bool {
        matches!(self, ModelDbError::LoadFailed { .. })
    }

    /// Check if this error is a usage the API forbids
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            ModelDbError::NotAValue { .. } | ModelDbError::KindMismatch { .. }
        )
    }

    /// Get the path if this is a path-related error
    pub fn path(&self) -> Option<&str> {
        match self {
            ModelDbError::LoadFailed { path, .. }
            | ModelDbError::NotAValue { path }
            | ModelDbError::KindMismatch { path, .. } => Some(path),
            ModelDbError::Disposed => None,
        }
    }
}

impl From<ModelDbError> for crate::Error {
    fn from(err: ModelDbError) -> Self {
        crate::Error::ModelDb(err)
    }
}
