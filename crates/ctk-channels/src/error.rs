//! Error types for channel operations.

use ctk_types::ConnectorId;

/// Errors that can occur during channel registry operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChannelError {
    /// The owner id does not resolve to a live connector.
    #[error("cannot bind a channel to unknown connector {owner}")]
    UnknownOwner {
        /// The unresolved owner id.
        owner: ConnectorId,
    },
}

/// Convenience alias for channel results.
pub type ChannelResult<T> = Result<T, ChannelError>;
