//! Connector tracker for a server-driven UI session.
//!
//! [`ConnectorTracker`] is the bookkeeping core behind one session root: it
//! resolves connector ids to live objects, remembers which connectors the
//! client has never seen, collects the connectors that must be sent with the
//! next response, caches the last state sent for each of them, and keeps the
//! secret keys of their upload/download channels.
//!
//! # Architecture
//!
//! - **Directory** ([`ctk_directory`]) — id → object with a registration
//!   lifecycle. Everything else validates identity against it.
//! - **Dirty tracker** ([`ctk_dirty`]) — pending-push set guarded by the
//!   write phase.
//! - **Diff-state cache** ([`ctk_diff`]) — last-sent state per connector.
//! - **Channel registry** ([`ctk_channels`]) — named stream handles and
//!   their secret keys.
//!
//! The periodic [`ConnectorTracker::sweep`] reclaims all four in lockstep:
//! the directory pass completes before channel orphans are collected.
//!
//! # Modules
//!
//! - [`config`] — [`TrackerConfig`] and its TOML loader
//! - [`error`] — [`TrackerError`] aggregating the subsystem errors
//! - [`hooks`] — Collaborator traits: [`ResourceRelease`], [`ObjectResolver`]
//! - [`memory`] — [`MemoryHierarchy`], an in-memory connector tree
//! - [`snapshot`] — [`TrackerSnapshot`] persistence
//! - [`tracker`] — The [`ConnectorTracker`] façade

pub mod config;
pub mod error;
pub mod hooks;
pub mod memory;
pub mod snapshot;
pub mod tracker;

pub use config::TrackerConfig;
pub use error::{TrackerError, TrackerResult};
pub use hooks::{NoOpRelease, ObjectResolver, ObjectTable, ResourceRelease};
pub use memory::{MemoryHierarchy, TreeNode};
pub use snapshot::{ConnectorRecord, SnapshotFormat, TrackerSnapshot, SNAPSHOT_VERSION};
pub use tracker::{ConnectorTracker, SweepReport, WritePhase};

pub use ctk_channels::{ChannelBinding, ChannelHandle, StreamHandle, StreamVariable};
pub use ctk_diff::{DiffState, StateChange, StateDiff};
pub use ctk_directory::{Registration, RegistrationState, Unregistration};
pub use ctk_types::{
    same_connector, Connector, ConnectorHierarchy, ConnectorId, ConnectorIdAllocator,
    ConnectorRef, HandleId, SecretKey,
};
