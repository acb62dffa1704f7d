//! Error types for the connector tracker.

use ctk_types::ConnectorId;
use thiserror::Error;

/// Errors surfaced by [`ConnectorTracker`](crate::ConnectorTracker)
/// operations.
///
/// Bookkeeping drift (double unregister, unknown ids, missed detaches) is
/// logged and healed instead of being reported here.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("directory error: {0}")]
    Directory(#[from] ctk_directory::DirectoryError),

    #[error("dirty tracking error: {0}")]
    Dirty(#[from] ctk_dirty::DirtyError),

    #[error("diff state error: {0}")]
    Diff(#[from] ctk_diff::DiffError),

    #[error("channel error: {0}")]
    Channel(#[from] ctk_channels::ChannelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot error: {0}")]
    Snapshot(String),

    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedSnapshotVersion { found: u32, expected: u32 },

    #[error("snapshot belongs to root {expected}, not {actual}")]
    RootMismatch {
        expected: ConnectorId,
        actual: ConnectorId,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Convenience alias for tracker results.
pub type TrackerResult<T> = Result<T, TrackerError>;
