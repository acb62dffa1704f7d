//! Diff-state cache for the connector tracking kit.
//!
//! For every connector the peer has received at least once, the cache keeps
//! the last state object that was sent. The transport layer compares a
//! connector's current state against that baseline to send only what
//! changed.
//!
//! # Key Types
//!
//! - [`DiffStateCache`] — Per-connector last-sent state snapshots
//! - [`DiffState`] — A state object (`serde_json::Map`)
//! - [`StateDiff`] / [`StateChange`] — Key-level changes between two states
//!
//! Cached values cross persistence boundaries only through
//! [`DiffStateCache::to_encoded`] / [`DiffStateCache::from_encoded`], which
//! flatten each state to JSON text.

pub mod cache;
pub mod error;
pub mod state_diff;

pub use cache::{DiffState, DiffStateCache};
pub use error::{DiffError, DiffResult};
pub use state_diff::{diff_states, StateChange, StateDiff};
