//! Store error types.

use thiserror::Error;

/// Result type for object-store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur when talking to the object store.
///
/// Only [`StoreError::Connection`] is transient: it is the one class the
/// sync queue will retry. Everything else is permanent from the engine's
/// point of view.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Sync-time timestamp conflict: a key changed on both sides with an
    /// exactly tied clock. Reported per key in the sync pass summary.
    #[error("conflict for {key}: {reason}")]
    Conflict { key: String, reason: String },

    /// The cancellation token was observed cancelled before any dispatch,
    /// aborting a whole pass. Mid-batch cancellation is reported per key
    /// instead, via the batch result's `cancelled` set.
    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// True for failures worth putting on the retry queue.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Connection(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
