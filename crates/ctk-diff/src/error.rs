//! Error types for the diff-state cache.

use ctk_types::ConnectorId;

/// Errors that can occur while persisting or restoring diff states.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A persisted state could not be parsed back; the whole restore fails.
    #[error("failed to restore diff state for connector {connector}: {reason}")]
    CacheRestoreFailed {
        /// The connector whose state was unreadable.
        connector: ConnectorId,
        /// Parser message.
        reason: String,
    },

    /// A cached state could not be encoded.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Convenience alias for diff-state results.
pub type DiffResult<T> = Result<T, DiffError>;
