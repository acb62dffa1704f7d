//! The [`DirtyTracker`]: connectors pending a push, plus the write-phase flag.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use ctk_types::{same_connector, ConnectorHierarchy, ConnectorId, ConnectorRef};

use crate::error::{DirtyError, DirtyResult};

/// Set of connectors whose state or pending calls must be sent to the peer
/// with the next response.
///
/// Membership is keyed by connector id, so the set never holds two entries
/// for one id and iteration order is deterministic (sorted by id). Insertion
/// order carries no meaning.
#[derive(Default)]
pub struct DirtyTracker {
    dirty: BTreeMap<ConnectorId, ConnectorRef>,
    writing: bool,
}

impl std::fmt::Debug for DirtyTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirtyTracker")
            .field("dirty", &self.dirty.len())
            .field("writing", &self.writing)
            .finish()
    }
}

impl DirtyTracker {
    /// Create an empty tracker outside the write phase.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of dirty connectors.
    pub fn len(&self) -> usize {
        self.dirty.len()
    }

    /// Returns `true` if nothing is dirty.
    pub fn is_empty(&self) -> bool {
        self.dirty.is_empty()
    }

    // ---------------------------------------------------------------
    // Write phase
    // ---------------------------------------------------------------

    /// Returns `true` while a response is being written.
    pub fn is_write_phase(&self) -> bool {
        self.writing
    }

    /// Enter or leave the write phase.
    ///
    /// Setting the flag to the value it already holds is an error, which
    /// catches unpaired start/end calls.
    pub fn set_write_phase(&mut self, writing: bool) -> DirtyResult<()> {
        if self.writing == writing {
            return Err(DirtyError::RedundantPhaseTransition { writing });
        }
        self.writing = writing;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Marking
    // ---------------------------------------------------------------

    /// Mark a connector dirty.
    ///
    /// Fails with [`DirtyError::InvalidPhase`] during the write phase and
    /// leaves the set unchanged. Returns `true` if the connector was not
    /// dirty before.
    pub fn mark_dirty(&mut self, connector: &ConnectorRef) -> DirtyResult<bool> {
        if self.writing {
            return Err(DirtyError::InvalidPhase {
                id: connector.connector_id().clone(),
            });
        }
        Ok(self.insert(connector))
    }

    /// Add a newly registered connector to the dirty set.
    ///
    /// Registration may happen while a response is being written (connectors
    /// created lazily during painting), so this bypasses the write-phase
    /// check.
    pub fn mark_registered(&mut self, connector: &ConnectorRef) -> bool {
        self.insert(connector)
    }

    /// Mark a connector clean. Allowed at any time.
    ///
    /// Returns `true` if the connector was dirty.
    pub fn mark_clean(&mut self, connector: &ConnectorRef) -> bool {
        let id = connector.connector_id();
        let was_dirty = self
            .dirty
            .get(id)
            .is_some_and(|existing| same_connector(existing, connector));
        if was_dirty {
            self.dirty.remove(id);
            debug!(connector = %id, kind = connector.kind(), "connector is no longer dirty");
        }
        was_dirty
    }

    /// Returns `true` if the connector is in the dirty set.
    pub fn is_dirty(&self, connector: &ConnectorRef) -> bool {
        self.dirty
            .get(connector.connector_id())
            .is_some_and(|existing| same_connector(existing, connector))
    }

    /// Mark `root` and every connector below it dirty.
    ///
    /// Subtrees whose root is explicitly hidden are skipped: the peer cannot
    /// observe them, so they need no update. Connectors rejected by `admit`
    /// are walked through but not marked. Returns the number of connectors
    /// marked.
    pub fn mark_tree_dirty(
        &mut self,
        root: &ConnectorRef,
        hierarchy: &dyn ConnectorHierarchy,
        admit: &dyn Fn(&ConnectorRef) -> bool,
    ) -> DirtyResult<usize> {
        if self.writing {
            return Err(DirtyError::InvalidPhase {
                id: root.connector_id().clone(),
            });
        }

        let mut visited = 0;
        let mut stack = vec![root.clone()];
        while let Some(connector) = stack.pop() {
            if !hierarchy.is_visible(&connector) {
                continue;
            }
            if admit(&connector) {
                self.insert(&connector);
                visited += 1;
            }

            // Reverse so children are visited in paint order.
            let mut children = hierarchy.children(&connector);
            children.reverse();
            stack.extend(children);
        }
        Ok(visited)
    }

    /// Empty the dirty set unconditionally.
    pub fn clear_all(&mut self) {
        self.dirty.clear();
        debug!("all connectors are now clean");
    }

    /// An entry held by a different object under the same id is never
    /// replaced.
    fn insert(&mut self, connector: &ConnectorRef) -> bool {
        let id = connector.connector_id();
        if let Some(existing) = self.dirty.get(id) {
            if !same_connector(existing, connector) {
                warn!(
                    connector = %id,
                    kind = connector.kind(),
                    "ignoring dirty mark from a different object with a dirty id"
                );
            }
            return false;
        }
        debug!(connector = %id, kind = connector.kind(), "connector is now dirty");
        self.dirty.insert(id.clone(), connector.clone());
        true
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// All dirty connectors, sorted by id. May include connectors the peer
    /// cannot currently see.
    pub fn dirty_connectors(&self) -> Vec<ConnectorRef> {
        self.dirty.values().cloned().collect()
    }

    /// Ids of all dirty connectors, sorted.
    pub fn dirty_ids(&self) -> Vec<ConnectorId> {
        self.dirty.keys().cloned().collect()
    }

    /// The dirty connectors the peer can actually see, sorted by id.
    ///
    /// This is the set the transport layer serializes in the next response.
    pub fn dirty_visible_connectors(&self, hierarchy: &dyn ConnectorHierarchy) -> Vec<ConnectorRef> {
        self.dirty
            .values()
            .filter(|c| hierarchy.is_visible_to_client(c))
            .cloned()
            .collect()
    }
}
