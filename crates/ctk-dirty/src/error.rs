//! Error types for dirty tracking.

use ctk_types::ConnectorId;

/// Errors that can occur while tracking dirty connectors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DirtyError {
    /// A connector was marked dirty while a response is being written.
    #[error("connector {id} should not be marked dirty while a response is being written")]
    InvalidPhase {
        /// The connector that was being marked.
        id: ConnectorId,
    },

    /// The write-phase flag was set to the value it already holds.
    #[error("write phase is already set to {writing}")]
    RedundantPhaseTransition {
        /// The value that was requested (and already held).
        writing: bool,
    },
}

/// Convenience alias for dirty-tracking results.
pub type DirtyResult<T> = Result<T, DirtyError>;
