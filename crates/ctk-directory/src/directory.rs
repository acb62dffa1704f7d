//! The connector [`Directory`]: id → object index with registration states.
//!
//! All operations are in-memory and synchronous. The directory does not own
//! connector lifetime; it clones the caller's [`ConnectorRef`] and gives it up
//! again when the entry is removed.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ctk_types::{same_connector, ConnectorId, ConnectorRef};

use crate::error::{DirectoryError, DirectoryResult};

/// Registration state of an entry that is still physically present.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistrationState {
    /// Live and resolvable.
    Registered,
    /// Unregistered, waiting for the next sweep.
    PendingRemoval,
}

/// Outcome of [`Directory::register`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Registration {
    /// The id was unknown; a new entry was created.
    Inserted,
    /// The entry was pending removal and is live again.
    Revived,
    /// The connector was already registered (logged as a warning).
    AlreadyRegistered,
}

/// Outcome of [`Directory::unregister`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Unregistration {
    /// The entry is now pending removal.
    Marked,
    /// The entry already was pending removal (logged as a warning).
    AlreadyPending,
    /// No entry exists for the id (logged as a warning, no-op).
    NotRegistered,
    /// The id belongs to a different object (logged as a warning, no-op).
    ForeignObject,
}

impl Unregistration {
    /// Returns `true` if the connector is pending removal after the call.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Marked | Self::AlreadyPending)
    }
}

/// Identity index for the connectors of one session.
#[derive(Default)]
pub struct Directory {
    /// All physically present entries, including pending removals.
    entries: HashMap<ConnectorId, ConnectorRef>,
    /// Entries unregistered since the last sweep.
    pending: BTreeSet<ConnectorId>,
    /// Entries whose full state the client has not received yet.
    uninitialized: HashSet<ConnectorId>,
}

impl std::fmt::Debug for Directory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Directory")
            .field("entries", &self.entries.len())
            .field("pending", &self.pending.len())
            .field("uninitialized", &self.uninitialized.len())
            .finish()
    }
}

impl Directory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of physically present entries (pending removals included).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the directory has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // ---------------------------------------------------------------
    // Registration lifecycle
    // ---------------------------------------------------------------

    /// Register a connector under its own id.
    ///
    /// A new entry starts out client-uninitialized. Registering the object
    /// that already owns the id either revives a pending removal or is a
    /// harmless duplicate. A *different* object under a taken id is an
    /// [`DirectoryError::IdentityConflict`].
    pub fn register(&mut self, connector: &ConnectorRef) -> DirectoryResult<Registration> {
        let id = connector.connector_id().clone();

        match self.entries.get(&id) {
            None => {
                self.entries.insert(id.clone(), connector.clone());
                self.uninitialized.insert(id.clone());
                debug!(connector = %id, kind = connector.kind(), "registered connector");
                Ok(Registration::Inserted)
            }
            Some(existing) if !same_connector(existing, connector) => {
                Err(DirectoryError::IdentityConflict { id })
            }
            Some(_) => {
                if self.pending.remove(&id) {
                    debug!(connector = %id, kind = connector.kind(), "re-registered connector pending removal");
                    Ok(Registration::Revived)
                } else {
                    warn!(
                        connector = %id,
                        kind = connector.kind(),
                        "an already registered connector was registered again"
                    );
                    Ok(Registration::AlreadyRegistered)
                }
            }
        }
    }

    /// Mark a connector pending removal.
    ///
    /// The entry stays physically present (but invisible to
    /// [`lookup`](Self::lookup)) until [`finalize_removals`](Self::finalize_removals).
    pub fn unregister(&mut self, connector: &ConnectorRef) -> Unregistration {
        let id = connector.connector_id();

        let Some(existing) = self.entries.get(id) else {
            warn!(
                connector = %id,
                kind = connector.kind(),
                "tried to unregister a connector which is not registered"
            );
            return Unregistration::NotRegistered;
        };

        if !same_connector(existing, connector) {
            warn!(
                connector = %id,
                kind = connector.kind(),
                "tried to unregister a connector that is not the one registered for its id"
            );
            return Unregistration::ForeignObject;
        }

        if self.pending.insert(id.clone()) {
            debug!(connector = %id, kind = connector.kind(), "unregistered connector");
            Unregistration::Marked
        } else {
            warn!(
                connector = %id,
                kind = connector.kind(),
                "unregistered a connector that was already unregistered"
            );
            Unregistration::AlreadyPending
        }
    }

    /// Remove every pending entry and return the removed connectors.
    ///
    /// The uninitialized flag of each removed entry is cleared as well. The
    /// caller is responsible for the state keyed by the returned ids
    /// (diff state, resource release).
    pub fn finalize_removals(&mut self) -> Vec<ConnectorRef> {
        let pending = std::mem::take(&mut self.pending);
        let mut removed = Vec::with_capacity(pending.len());
        for id in pending {
            self.uninitialized.remove(&id);
            if let Some(connector) = self.entries.remove(&id) {
                removed.push(connector);
            }
        }
        removed
    }

    /// Forcibly remove an entry regardless of its state.
    pub fn evict(&mut self, id: &ConnectorId) -> Option<ConnectorRef> {
        self.pending.remove(id);
        self.uninitialized.remove(id);
        self.entries.remove(id)
    }

    // ---------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------

    /// Resolve an id to its live connector.
    ///
    /// Entries pending removal resolve to `None` even though they are still
    /// physically present.
    pub fn lookup(&self, id: &ConnectorId) -> Option<&ConnectorRef> {
        if self.pending.contains(id) {
            return None;
        }
        self.entries.get(id)
    }

    /// Returns `true` if `connector` is the live object registered for its id.
    pub fn is_registered(&self, connector: &ConnectorRef) -> bool {
        self.lookup(connector.connector_id())
            .is_some_and(|existing| same_connector(existing, connector))
    }

    /// Registration state of a physically present entry.
    pub fn registration_state(&self, id: &ConnectorId) -> Option<RegistrationState> {
        if !self.entries.contains_key(id) {
            return None;
        }
        if self.pending.contains(id) {
            Some(RegistrationState::PendingRemoval)
        } else {
            Some(RegistrationState::Registered)
        }
    }

    /// Ids of entries pending removal, in id order.
    pub fn pending_removals(&self) -> Vec<ConnectorId> {
        self.pending.iter().cloned().collect()
    }

    /// All physically present entries, sorted by id.
    pub fn entries(&self) -> Vec<(ConnectorId, ConnectorRef)> {
        let mut all: Vec<(ConnectorId, ConnectorRef)> = self
            .entries
            .iter()
            .map(|(id, c)| (id.clone(), c.clone()))
            .collect();
        all.sort_by(|(a, _), (b, _)| a.cmp(b));
        all
    }

    /// Ids of all physically present entries, sorted.
    pub fn ids(&self) -> Vec<ConnectorId> {
        let mut ids: Vec<ConnectorId> = self.entries.keys().cloned().collect();
        ids.sort();
        ids
    }

    // ---------------------------------------------------------------
    // Client initialization
    // ---------------------------------------------------------------

    /// Returns `true` if the client has received the connector's full state.
    ///
    /// Always `false` for an object that is not the one present under its id.
    pub fn is_client_initialized(&self, connector: &ConnectorRef) -> bool {
        self.is_present(connector) && !self.uninitialized.contains(connector.connector_id())
    }

    /// Record that the client now holds the connector's full state.
    ///
    /// Ignored (with a warning) for an object that is not the one present
    /// under its id. Returns `true` if the flag was recorded.
    pub fn mark_client_initialized(&mut self, connector: &ConnectorRef) -> bool {
        let id = connector.connector_id();
        if !self.is_present(connector) {
            warn!(connector = %id, kind = connector.kind(), "client state marked for an unknown object, ignoring");
            return false;
        }
        self.uninitialized.remove(id);
        true
    }

    /// Physically present under its id, pending removal or not.
    fn is_present(&self, connector: &ConnectorRef) -> bool {
        self.entries
            .get(connector.connector_id())
            .is_some_and(|existing| same_connector(existing, connector))
    }

    /// Flag an entry as client-uninitialized.
    ///
    /// Returns `true` if the flag was newly set.
    pub fn mark_uninitialized(&mut self, id: &ConnectorId) -> bool {
        if !self.entries.contains_key(id) {
            return false;
        }
        self.uninitialized.insert(id.clone())
    }

    /// Flag every present entry as client-uninitialized.
    pub fn mark_all_uninitialized(&mut self) {
        self.uninitialized.extend(self.entries.keys().cloned());
    }

    /// Returns `true` if the entry for `id` is flagged uninitialized.
    pub fn is_uninitialized(&self, id: &ConnectorId) -> bool {
        self.uninitialized.contains(id)
    }
}
