use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A server-side object the remote peer addresses by its [`ConnectorId`].
///
/// The tracker never owns connectors. Parent links, visibility and children
/// live in whatever tree structure the application keeps; the tracker only
/// indexes the objects that tree already owns.
pub trait Connector: Send + Sync + fmt::Debug {
    /// The session-unique identity of this connector.
    fn connector_id(&self) -> &ConnectorId;

    /// Short type name used in diagnostics (e.g. `"Label"`).
    fn kind(&self) -> &str {
        "Connector"
    }
}

/// Shared handle to a tracked connector.
pub type ConnectorRef = Arc<dyn Connector>;

/// Returns `true` if both handles point at the same connector allocation.
///
/// Only the data pointer is compared; vtable pointers of the same type may
/// differ between codegen units.
pub fn same_connector(a: &ConnectorRef, b: &ConnectorRef) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// String identity of a connector, unique within one session.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectorId(String);

impl ConnectorId {
    /// Create an id from a non-empty string.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::EmptyConnectorId);
        }
        Ok(Self(id))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ConnectorId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Debug for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConnectorId({})", self.0)
    }
}

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConnectorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Hands out sequential connector ids (`"1"`, `"2"`, ...) for one session.
#[derive(Debug)]
pub struct ConnectorIdAllocator {
    next: AtomicU64,
}

impl ConnectorIdAllocator {
    /// Create an allocator whose first id is `"1"`.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Create an allocator whose first id is `first`.
    ///
    /// Used after restoring a session so new ids do not collide with
    /// persisted ones.
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Allocate the next id.
    pub fn next_id(&self) -> ConnectorId {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        ConnectorId(n.to_string())
    }
}

impl Default for ConnectorIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Dummy {
        id: ConnectorId,
    }

    impl Connector for Dummy {
        fn connector_id(&self) -> &ConnectorId {
            &self.id
        }
    }

    fn dummy(id: &str) -> ConnectorRef {
        Arc::new(Dummy {
            id: ConnectorId::new(id).unwrap(),
        })
    }

    #[test]
    fn empty_id_is_rejected() {
        assert_eq!(ConnectorId::new(""), Err(TypeError::EmptyConnectorId));
        assert_eq!("".parse::<ConnectorId>(), Err(TypeError::EmptyConnectorId));
    }

    #[test]
    fn display_is_the_raw_id() {
        let id = ConnectorId::new("42").unwrap();
        assert_eq!(id.to_string(), "42");
        assert_eq!(format!("{id:?}"), "ConnectorId(42)");
    }

    #[test]
    fn serde_is_transparent() {
        let id = ConnectorId::new("7").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"7\"");
        let back: ConnectorId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn allocator_is_sequential() {
        let alloc = ConnectorIdAllocator::new();
        assert_eq!(alloc.next_id().as_str(), "1");
        assert_eq!(alloc.next_id().as_str(), "2");

        let resumed = ConnectorIdAllocator::starting_at(10);
        assert_eq!(resumed.next_id().as_str(), "10");
    }

    #[test]
    fn same_connector_compares_allocations() {
        let a = dummy("1");
        let a2 = Arc::clone(&a);
        let b = dummy("1");
        assert!(same_connector(&a, &a2));
        assert!(!same_connector(&a, &b));
    }

    #[test]
    fn default_kind() {
        assert_eq!(dummy("1").kind(), "Connector");
    }
}
