//! Error types for bridge operations.

use thiserror::Error;

/// Structured error types for bridge operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The bridge was disposed and no longer owns a remote handle
    #[error("Observable {kind} has been disposed")]
    Disposed { kind: &'static str },

    /// A container without a live remote counterpart was inserted into another container
    #[error("Cannot insert an un-bridged {kind} into a collaborative container")]
    NotBridged { kind: &'static str },

    /// A value that cannot be linked was passed to a link operation
    #[error("Value of kind {kind} cannot be linked at '{key}'")]
    NotLinkable { key: String, kind: &'static str },

    /// Index outside of the container
    #[error("Index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Range outside of the container or reversed
    #[error("Invalid range {start}..{end} for length {len}")]
    InvalidRange { start: usize, end: usize, len: usize },

    /// The model used to create child objects has been dropped
    #[error("The collaborative model backing this {kind} is no longer available")]
    ModelUnavailable { kind: &'static str },
}

impl BridgeError {
    /// Check if the bridge was already disposed
    pub fn is_disposed(&self) -> bool {
        matches!(self, BridgeError::Disposed { .. })
    }

    /// Check if this error is a usage the API forbids
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            BridgeError::NotBridged { .. }
                | BridgeError::NotLinkable { .. }
                | BridgeError::IndexOutOfBounds { .. }
                | BridgeError::InvalidRange { .. }
        )
    }

    /// Check if this error is related to indexing
    pub fn is_index_error(&self) -> bool {
        matches!(
            self,
            BridgeError::IndexOutOfBounds { .. } | BridgeError::InvalidRange { .. }
        )
    }
}

impl From<BridgeError> for crate::Error {
    fn from(err: BridgeError) -> Self {
        crate::Error::Bridge(err)
    }
}
