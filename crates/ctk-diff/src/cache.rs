//! The [`DiffStateCache`]: last state sent to the peer, per connector.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};
use tracing::debug;

use ctk_types::ConnectorId;

use crate::error::{DiffError, DiffResult};
use crate::state_diff::{diff_states, StateDiff};

/// A connector state object as last sent to the peer.
pub type DiffState = Map<String, Value>;

/// Per-connector cache of the last-sent state.
///
/// An entry exists only for connectors that were sent at least once since
/// they last became client-uninitialized. The cache is derived data: losing
/// it only costs a full resend.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiffStateCache {
    states: HashMap<ConnectorId, DiffState>,
}

impl DiffStateCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// The cached state for a connector, if any.
    pub fn get(&self, id: &ConnectorId) -> Option<&DiffState> {
        self.states.get(id)
    }

    /// Returns `true` if a baseline is cached for the connector.
    pub fn contains(&self, id: &ConnectorId) -> bool {
        self.states.contains_key(id)
    }

    /// Replace the cached state unconditionally, returning the previous one.
    pub fn set(&mut self, id: ConnectorId, state: DiffState) -> Option<DiffState> {
        self.states.insert(id, state)
    }

    /// Drop the cached state, e.g. because the connector became
    /// client-uninitialized.
    pub fn remove(&mut self, id: &ConnectorId) -> Option<DiffState> {
        self.states.remove(id)
    }

    /// Drop every cached state.
    pub fn clear(&mut self) {
        self.states.clear();
    }

    /// Compare `new_state` against the cached baseline.
    ///
    /// Without a baseline every key of `new_state` is reported as added, i.e.
    /// the full state has to be sent.
    pub fn diff_against(&self, id: &ConnectorId, new_state: &DiffState) -> StateDiff {
        match self.states.get(id) {
            Some(baseline) => diff_states(baseline, new_state),
            None => diff_states(&Map::new(), new_state),
        }
    }

    // ---------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------

    /// Flatten every cached state to JSON text, keyed by connector id.
    pub fn to_encoded(&self) -> DiffResult<BTreeMap<ConnectorId, String>> {
        self.states
            .iter()
            .map(|(id, state)| {
                serde_json::to_string(state)
                    .map(|text| (id.clone(), text))
                    .map_err(|e| DiffError::Serialization(format!("connector {id}: {e}")))
            })
            .collect()
    }

    /// Rebuild a cache from [`to_encoded`](Self::to_encoded) output.
    ///
    /// Any value that does not parse back into a state object fails the whole
    /// restore: a partially restored cache would misrepresent what the peer
    /// has already received.
    pub fn from_encoded(encoded: BTreeMap<ConnectorId, String>) -> DiffResult<Self> {
        let mut states = HashMap::with_capacity(encoded.len());
        for (id, text) in encoded {
            let state: DiffState = serde_json::from_str(&text).map_err(|e| {
                DiffError::CacheRestoreFailed {
                    connector: id.clone(),
                    reason: e.to_string(),
                }
            })?;
            states.insert(id, state);
        }
        debug!(count = states.len(), "restored diff states");
        Ok(Self { states })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cid(id: &str) -> ConnectorId {
        ConnectorId::new(id).unwrap()
    }

    fn state(value: Value) -> DiffState {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other:?}"),
        }
    }

    #[test]
    fn set_get_remove() {
        let mut cache = DiffStateCache::new();
        assert!(cache.get(&cid("1")).is_none());

        assert!(cache.set(cid("1"), state(json!({"caption": "a"}))).is_none());
        let previous = cache.set(cid("1"), state(json!({"caption": "b"})));
        assert_eq!(previous, Some(state(json!({"caption": "a"}))));
        assert_eq!(cache.get(&cid("1")), Some(&state(json!({"caption": "b"}))));

        assert!(cache.remove(&cid("1")).is_some());
        assert!(!cache.contains(&cid("1")));
    }

    #[test]
    fn diff_against_baseline() {
        let mut cache = DiffStateCache::new();
        cache.set(cid("1"), state(json!({"caption": "a", "width": 10})));

        let diff = cache.diff_against(&cid("1"), &state(json!({"caption": "b", "width": 10})));
        assert_eq!(diff.len(), 1);
        assert_eq!(diff.to_update(), state(json!({"caption": "b"})));
    }

    #[test]
    fn diff_without_baseline_is_full_state() {
        let cache = DiffStateCache::new();
        let full = state(json!({"caption": "a", "width": 10}));
        let diff = cache.diff_against(&cid("9"), &full);
        assert_eq!(diff.additions(), 2);
        assert_eq!(diff.to_update(), full);
    }

    #[test]
    fn encoded_form_restores() {
        let mut cache = DiffStateCache::new();
        cache.set(cid("1"), state(json!({"caption": "a", "nested": {"x": [1, 2]}})));
        cache.set(cid("2"), DiffState::new());

        let encoded = cache.to_encoded().unwrap();
        assert_eq!(encoded.len(), 2);
        assert_eq!(encoded[&cid("2")], "{}");

        let restored = DiffStateCache::from_encoded(encoded).unwrap();
        assert_eq!(restored, cache);
    }

    #[test]
    fn unparseable_value_fails_restore() {
        let mut encoded = BTreeMap::new();
        encoded.insert(cid("1"), "{\"caption\": \"ok\"}".to_string());
        encoded.insert(cid("2"), "{not json".to_string());

        let err = DiffStateCache::from_encoded(encoded).unwrap_err();
        match err {
            DiffError::CacheRestoreFailed { connector, .. } => assert_eq!(connector, cid("2")),
            other => panic!("expected CacheRestoreFailed, got {other:?}"),
        }
    }

    #[test]
    fn non_object_value_fails_restore() {
        let mut encoded = BTreeMap::new();
        encoded.insert(cid("1"), "[1, 2, 3]".to_string());
        assert!(matches!(
            DiffStateCache::from_encoded(encoded),
            Err(DiffError::CacheRestoreFailed { .. })
        ));
    }
}
