//! Dirty tracking for the connector tracking kit.
//!
//! A connector is *dirty* when something changed on the server that the
//! remote peer has to learn about in the next response. The
//! [`DirtyTracker`] keeps that set and a single cooperative guard, the
//! *write phase*: while a response is being written, marking anything dirty
//! is a contract violation ([`DirtyError::InvalidPhase`]) because the change
//! would be lost once the flush clears the set.
//!
//! # Modules
//!
//! - [`error`] — Error types for dirty tracking
//! - [`tracker`] — The [`DirtyTracker`] set and write-phase flag

pub mod error;
pub mod tracker;

pub use error::{DirtyError, DirtyResult};
pub use tracker::DirtyTracker;
