//! Channel registry for the connector tracking kit.
//!
//! Connectors that accept uploads or serve downloads expose named
//! *stream variables*. Each distinct handle gets one secret key, minted the
//! first time the handle is bound and kept across rebinding under other
//! names. Keys are revoked only when the owning connector is gone, by
//! [`ChannelRegistry::sweep_orphans`].
//!
//! # Modules
//!
//! - [`error`] — Error types for channel operations
//! - [`handle`] — The [`StreamVariable`] trait and a plain [`StreamHandle`]
//! - [`registry`] — The [`ChannelRegistry`] tables

pub mod error;
pub mod handle;
pub mod registry;

pub use error::{ChannelError, ChannelResult};
pub use handle::{ChannelHandle, StreamHandle, StreamVariable};
pub use registry::{ChannelBinding, ChannelRegistry, OwnerLookup};
