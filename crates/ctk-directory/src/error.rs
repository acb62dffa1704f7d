//! Error types for directory operations.

use ctk_types::ConnectorId;

/// Errors that can occur during directory operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// Two distinct objects claim the same connector id.
    #[error("a different connector is already registered with id {id}")]
    IdentityConflict {
        /// The contested id.
        id: ConnectorId,
    },
}

/// Convenience alias for directory results.
pub type DirectoryResult<T> = Result<T, DirectoryError>;
