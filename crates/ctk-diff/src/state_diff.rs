//! Key-level diff between two connector state objects.
//!
//! States are JSON objects (`serde_json::Map`). The diff reports keys that
//! appeared, disappeared, or changed value; nested values are compared as a
//! whole.

use serde_json::{Map, Value};

/// The changes between a baseline state and a new state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateDiff {
    /// The list of changes, removals and modifications first.
    pub changes: Vec<StateChange>,
}

impl StateDiff {
    /// Create an empty state diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if there are no changes.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Number of changes.
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Number of added keys.
    pub fn additions(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, StateChange::Added { .. }))
            .count()
    }

    /// Number of removed keys.
    pub fn removals(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, StateChange::Removed { .. }))
            .count()
    }

    /// Number of modified keys.
    pub fn modifications(&self) -> usize {
        self.changes
            .iter()
            .filter(|c| matches!(c, StateChange::Modified { .. }))
            .count()
    }

    /// The update object to send: every added or modified key with its new
    /// value, and every removed key as `null`.
    pub fn to_update(&self) -> Map<String, Value> {
        self.changes
            .iter()
            .map(|change| match change {
                StateChange::Added { key, value } => (key.clone(), value.clone()),
                StateChange::Modified { key, new, .. } => (key.clone(), new.clone()),
                StateChange::Removed { key, .. } => (key.clone(), Value::Null),
            })
            .collect()
    }
}

/// A single change in a state object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StateChange {
    /// A key the baseline did not have.
    Added { key: String, value: Value },
    /// A key the new state no longer has.
    Removed { key: String, value: Value },
    /// A key whose value differs.
    Modified {
        key: String,
        old: Value,
        new: Value,
    },
}

impl StateChange {
    /// The key this change applies to.
    pub fn key(&self) -> &str {
        match self {
            Self::Added { key, .. } | Self::Removed { key, .. } | Self::Modified { key, .. } => key,
        }
    }
}

/// Compute the diff between a baseline state and a new state.
pub fn diff_states(old: &Map<String, Value>, new: &Map<String, Value>) -> StateDiff {
    let mut changes = Vec::new();

    for (key, old_val) in old {
        match new.get(key) {
            Some(new_val) if old_val != new_val => {
                changes.push(StateChange::Modified {
                    key: key.clone(),
                    old: old_val.clone(),
                    new: new_val.clone(),
                });
            }
            Some(_) => {}
            None => {
                changes.push(StateChange::Removed {
                    key: key.clone(),
                    value: old_val.clone(),
                });
            }
        }
    }

    for (key, new_val) in new {
        if !old.contains_key(key) {
            changes.push(StateChange::Added {
                key: key.clone(),
                value: new_val.clone(),
            });
        }
    }

    StateDiff { changes }
}
