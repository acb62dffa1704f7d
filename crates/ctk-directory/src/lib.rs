//! Connector directory for the connector tracking kit.
//!
//! The directory maps every connector id to the one live object that owns it
//! and tracks each entry through a small registration lifecycle:
//!
//! - **Registered** — resolvable through [`Directory::lookup`].
//! - **Pending removal** — unregistered but kept until the next sweep, so a
//!   connector that is detached and re-attached within one request keeps its
//!   entry. Lookups already treat it as absent.
//! - **Absent** — removed by [`Directory::finalize_removals`] or
//!   [`Directory::evict`].
//!
//! Orthogonally, every entry carries a *client-uninitialized* flag: `true`
//! until the remote peer has received the connector's full state.
//!
//! # Modules
//!
//! - [`error`] — Error types for directory operations
//! - [`directory`] — The [`Directory`] index and its outcome enums

pub mod directory;
pub mod error;

pub use directory::{Directory, Registration, RegistrationState, Unregistration};
pub use error::{DirectoryError, DirectoryResult};
