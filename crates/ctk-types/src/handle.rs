use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identity of a channel handle (UUID v7 for time-ordering).
///
/// Two handle objects are "the same handle" when their ids are equal; the
/// channel registry keys secret keys by this id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(uuid::Uuid);

impl HandleId {
    /// Generate a new time-ordered handle id.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Short representation (first 8 characters of UUID).
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for HandleId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TypeError::InvalidHandleId(e.to_string()))
    }
}

impl fmt::Debug for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandleId({})", self.short_id())
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_distinct() {
        assert_ne!(HandleId::new(), HandleId::new());
    }

    #[test]
    fn parse_round_trip() {
        let id = HandleId::new();
        let parsed: HandleId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<HandleId>().unwrap_err();
        assert!(matches!(err, TypeError::InvalidHandleId(_)));
    }

    #[test]
    fn short_id_is_eight_chars() {
        assert_eq!(HandleId::new().short_id().len(), 8);
    }
}
