//! Foundation types for the connector tracking kit (CTK).
//!
//! This crate provides the identity types shared by every CTK crate. A
//! *connector* is a server-side UI object that the remote peer knows about by
//! its string identity; the tracker crates index connectors, track which ones
//! need to be resent, and guard their upload channels with secret keys.
//!
//! # Key Types
//!
//! - [`Connector`] — The trait every tracked object implements
//! - [`ConnectorRef`] — Shared, non-owning handle to a tracked connector
//! - [`ConnectorId`] — Session-unique string identity of a connector
//! - [`ConnectorIdAllocator`] — Sequential id source for a session
//! - [`ConnectorHierarchy`] — Non-owning view of the connector tree
//! - [`HandleId`] — UUID v7 identity of a channel handle
//! - [`SecretKey`] — Unguessable token gating a channel handle

pub mod connector;
pub mod error;
pub mod handle;
pub mod hierarchy;
pub mod secret;

pub use connector::{same_connector, Connector, ConnectorId, ConnectorIdAllocator, ConnectorRef};
pub use error::TypeError;
pub use handle::HandleId;
pub use hierarchy::ConnectorHierarchy;
pub use secret::SecretKey;
