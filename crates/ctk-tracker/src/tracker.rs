use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ctk_channels::{ChannelHandle, ChannelRegistry};
use ctk_diff::{diff_states, DiffState, DiffStateCache, StateDiff};
use ctk_directory::{Directory, Registration, RegistrationState, Unregistration};
use ctk_dirty::DirtyTracker;
use ctk_types::{ConnectorHierarchy, ConnectorId, ConnectorRef, SecretKey};

use crate::config::TrackerConfig;
use crate::error::TrackerResult;
use crate::hooks::ResourceRelease;

/// What one [`ConnectorTracker::sweep`] reclaimed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Unregistered connectors removed for good.
    pub removed: usize,
    /// Connectors evicted because they no longer belong to this root.
    pub missed_detaches: usize,
    /// Connectors flagged uninitialized because the client cannot see them.
    pub invalidated: usize,
    /// Channels dropped together with their secret keys.
    pub revoked_channels: usize,
}

impl SweepReport {
    /// Returns `true` if the sweep changed nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Bookkeeping for every connector of one session root.
///
/// The tracker is not internally synchronized: all methods take `&mut self`
/// or `&self`, and a session that is shared between threads keeps its
/// tracker behind its own lock.
///
/// The root connector is not registered implicitly; register it like any
/// other connector.
pub struct ConnectorTracker {
    pub(crate) root: ConnectorRef,
    pub(crate) hierarchy: Arc<dyn ConnectorHierarchy>,
    pub(crate) release: Option<Arc<dyn ResourceRelease>>,
    pub(crate) config: TrackerConfig,
    pub(crate) directory: Directory,
    pub(crate) dirty: DirtyTracker,
    pub(crate) diff_states: DiffStateCache,
    pub(crate) channels: ChannelRegistry,
}

impl std::fmt::Debug for ConnectorTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorTracker")
            .field("root", self.root.connector_id())
            .field("directory", &self.directory)
            .field("dirty", &self.dirty)
            .field("diff_states", &self.diff_states.len())
            .field("channels", &self.channels.channel_count())
            .finish()
    }
}

impl ConnectorTracker {
    /// Create a tracker for the session rooted at `root`.
    pub fn new(
        root: ConnectorRef,
        hierarchy: Arc<dyn ConnectorHierarchy>,
        config: TrackerConfig,
    ) -> TrackerResult<Self> {
        config.validate()?;
        Ok(Self {
            root,
            hierarchy,
            release: None,
            channels: ChannelRegistry::with_key_bytes(config.secret_key_bytes),
            config,
            directory: Directory::new(),
            dirty: DirtyTracker::new(),
            diff_states: DiffStateCache::new(),
        })
    }

    /// Call `hook` for every connector the sweep removes.
    pub fn with_release_hook(mut self, hook: Arc<dyn ResourceRelease>) -> Self {
        self.release = Some(hook);
        self
    }

    pub fn root(&self) -> &ConnectorRef {
        &self.root
    }

    pub fn root_id(&self) -> &ConnectorId {
        self.root.connector_id()
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn hierarchy(&self) -> &Arc<dyn ConnectorHierarchy> {
        &self.hierarchy
    }

    /// Number of physically present connectors, pending removals included.
    pub fn len(&self) -> usize {
        self.directory.len()
    }

    pub fn is_empty(&self) -> bool {
        self.directory.is_empty()
    }

    /// Human-readable description for diagnostics: kind, id and, if
    /// configured, the parent.
    pub fn describe(&self, connector: &ConnectorRef) -> String {
        let own = format!("{} ({})", connector.kind(), connector.connector_id());
        if !self.config.describe_parents {
            return own;
        }
        match self.hierarchy.parent(connector) {
            Some(parent) => format!(
                "{own} (parent: {} ({}))",
                parent.kind(),
                parent.connector_id()
            ),
            None => format!("{own} (no parent)"),
        }
    }

    // ---- Registration ----

    /// Register a connector and mark it dirty.
    ///
    /// Allowed during the write phase: connectors created while painting a
    /// response are picked up by the same response.
    pub fn register(&mut self, connector: &ConnectorRef) -> TrackerResult<Registration> {
        let outcome = self.directory.register(connector)?;
        self.dirty.mark_registered(connector);
        Ok(outcome)
    }

    /// Unregister a connector. It stays physically present until the next
    /// [`sweep`](Self::sweep) and leaves the dirty set immediately.
    pub fn unregister(&mut self, connector: &ConnectorRef) -> Unregistration {
        let outcome = self.directory.unregister(connector);
        if outcome.is_pending() {
            self.dirty.mark_clean(connector);
        }
        outcome
    }

    /// Resolve an id to its live connector.
    pub fn lookup(&self, id: &ConnectorId) -> Option<&ConnectorRef> {
        self.directory.lookup(id)
    }

    /// Returns `true` if `connector` is the live object registered for its id.
    pub fn is_registered(&self, connector: &ConnectorRef) -> bool {
        self.directory.is_registered(connector)
    }

    pub fn registration_state(&self, id: &ConnectorId) -> Option<RegistrationState> {
        self.directory.registration_state(id)
    }

    /// Ids of all physically present connectors, sorted.
    pub fn registered_ids(&self) -> Vec<ConnectorId> {
        self.directory.ids()
    }

    pub fn pending_removals(&self) -> Vec<ConnectorId> {
        self.directory.pending_removals()
    }

    // ---- Client state ----

    /// Always `false` for connectors that are not registered.
    pub fn is_client_initialized(&self, connector: &ConnectorRef) -> bool {
        self.directory.is_registered(connector) && self.directory.is_client_initialized(connector)
    }

    /// Ignored (with a warning) for connectors that are not registered.
    /// Returns `true` if recorded.
    pub fn mark_client_initialized(&mut self, connector: &ConnectorRef) -> bool {
        if !self.directory.is_registered(connector) {
            warn!(connector = %self.describe(connector), "client state marked for a connector that is not registered");
            return false;
        }
        self.directory.mark_client_initialized(connector)
    }

    /// Forget everything the client is known to hold: every connector becomes
    /// uninitialized and all diff states are dropped.
    pub fn reset_all_client_state(&mut self) {
        self.directory.mark_all_uninitialized();
        self.diff_states.clear();
        debug!(root = %self.root_id(), "reset all client side state");
    }

    // ---- Dirty tracking ----

    /// Mark a registered connector dirty. Returns `true` if it was not dirty
    /// before.
    ///
    /// Fails during the write phase. Outside it, connectors that are not the
    /// registered object for their id are ignored with a warning.
    pub fn mark_dirty(&mut self, connector: &ConnectorRef) -> TrackerResult<bool> {
        if !self.dirty.is_write_phase() && !self.directory.is_registered(connector) {
            warn!(connector = %self.describe(connector), "marking a connector dirty that is not registered");
            return Ok(false);
        }
        Ok(self.dirty.mark_dirty(connector)?)
    }

    pub fn mark_clean(&mut self, connector: &ConnectorRef) -> bool {
        self.dirty.mark_clean(connector)
    }

    pub fn is_dirty(&self, connector: &ConnectorRef) -> bool {
        self.dirty.is_dirty(connector)
    }

    /// Mark `root` and its visible descendants dirty. Connectors in the tree
    /// that are not registered are skipped. Returns the number marked.
    pub fn mark_tree_dirty(&mut self, root: &ConnectorRef) -> TrackerResult<usize> {
        let directory = &self.directory;
        let registered = |c: &ConnectorRef| directory.is_registered(c);
        Ok(self
            .dirty
            .mark_tree_dirty(root, self.hierarchy.as_ref(), &registered)?)
    }

    /// Mark every visible connector of the session dirty, walking from the
    /// session root.
    pub fn mark_all_dirty(&mut self) -> TrackerResult<usize> {
        let root = self.root.clone();
        let visited = self.mark_tree_dirty(&root)?;
        debug!(root = %self.root_id(), visited, "all connectors are now dirty");
        Ok(visited)
    }

    pub fn mark_all_clean(&mut self) {
        self.dirty.clear_all();
    }

    /// Every dirty connector, sorted by id, including ones the client cannot
    /// see.
    pub fn dirty_connectors(&self) -> Vec<ConnectorRef> {
        self.dirty.dirty_connectors()
    }

    /// The dirty connectors to serialize in the next response, sorted by id.
    pub fn dirty_visible_connectors(&self) -> Vec<ConnectorRef> {
        self.dirty.dirty_visible_connectors(self.hierarchy.as_ref())
    }

    // ---- Write phase ----

    pub fn is_write_phase(&self) -> bool {
        self.dirty.is_write_phase()
    }

    pub fn set_write_phase(&mut self, writing: bool) -> TrackerResult<()> {
        Ok(self.dirty.set_write_phase(writing)?)
    }

    /// Enter the write phase for as long as the returned guard lives.
    pub fn begin_write(&mut self) -> TrackerResult<WritePhase<'_>> {
        self.dirty.set_write_phase(true)?;
        Ok(WritePhase { tracker: self })
    }

    // ---- Diff states ----

    /// The state last sent to the client for `connector`.
    ///
    /// Absent for connectors that are not the live object for their id.
    pub fn diff_state(&self, connector: &ConnectorRef) -> Option<&DiffState> {
        if !self.directory.is_registered(connector) {
            warn!(connector = %self.describe(connector), "diff state requested for a connector that is not registered");
            return None;
        }
        self.diff_states.get(connector.connector_id())
    }

    /// Remember the state sent to the client. Ignored (with a warning) for
    /// connectors that are not registered. Returns `true` if stored.
    pub fn set_diff_state(&mut self, connector: &ConnectorRef, state: DiffState) -> bool {
        if !self.directory.is_registered(connector) {
            warn!(connector = %self.describe(connector), "diff state set for a connector that is not registered");
            return false;
        }
        self.diff_states.set(connector.connector_id().clone(), state);
        true
    }

    /// Changes between the cached state of `connector` and `state`.
    ///
    /// A connector that is not registered has no baseline, so every key of
    /// `state` is reported as added.
    pub fn diff_against(&self, connector: &ConnectorRef, state: &DiffState) -> StateDiff {
        if !self.directory.is_registered(connector) {
            warn!(connector = %self.describe(connector), "diff requested for a connector that is not registered");
            return diff_states(&DiffState::new(), state);
        }
        self.diff_states.diff_against(connector.connector_id(), state)
    }

    // ---- Channels ----

    /// Bind a stream handle to a registered connector.
    pub fn add_channel(
        &mut self,
        owner: &ConnectorId,
        name: &str,
        handle: ChannelHandle,
    ) -> TrackerResult<()> {
        let directory = &self.directory;
        let live = |id: &ConnectorId| directory.lookup(id).is_some();
        self.channels.add_channel(owner, name, handle, &live)?;
        Ok(())
    }

    pub fn get_channel(&self, owner: &ConnectorId, name: &str) -> Option<&ChannelHandle> {
        self.channels.get_channel(owner, name)
    }

    pub fn remove_channel(&mut self, owner: &ConnectorId, name: &str) -> Option<ChannelHandle> {
        self.channels.remove_channel(owner, name)
    }

    pub fn get_secret_key(&self, handle: &ChannelHandle) -> Option<&SecretKey> {
        self.channels.get_secret_key(handle)
    }

    pub fn verify_secret_key(&self, handle: &ChannelHandle, candidate: &str) -> bool {
        self.channels.verify_secret_key(handle, candidate)
    }

    /// Owners with at least one channel, sorted.
    pub fn channel_owners(&self) -> Vec<ConnectorId> {
        self.channels.owners()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.channel_count()
    }

    // ---- Sweep ----

    /// Reclaim everything that belongs to connectors which are gone.
    ///
    /// 1. Unregistered connectors are removed for good.
    /// 2. Connectors whose owning root is no longer this session's root were
    ///    detached without unregistering; they are evicted the same way.
    /// 3. Connectors the client cannot see become uninitialized and lose
    ///    their diff state, so they are sent in full once visible again.
    /// 4. Channels of owners that no longer resolve are dropped along with
    ///    their secret keys.
    pub fn sweep(&mut self) -> SweepReport {
        let mut report = SweepReport::default();

        for connector in self.directory.finalize_removals() {
            self.purge(&connector);
            report.removed += 1;
        }

        let root_id = self.root_id().clone();
        for (id, connector) in self.directory.entries() {
            let owner = self.hierarchy.owning_root(&connector);
            if owner.as_ref() != Some(&root_id) {
                warn!(
                    connector = %self.describe(&connector),
                    root = %root_id,
                    "connector was detached but never unregistered, removing it"
                );
                self.directory.evict(&id);
                self.purge(&connector);
                report.missed_detaches += 1;
            } else if !self.directory.is_uninitialized(&id)
                && !self.hierarchy.is_visible_to_client(&connector)
            {
                self.directory.mark_uninitialized(&id);
                self.diff_states.remove(&id);
                debug!(connector = %id, kind = connector.kind(), "connector is no longer visible to the client");
                report.invalidated += 1;
            }
        }

        let directory = &self.directory;
        let live = |id: &ConnectorId| directory.lookup(id).is_some();
        report.revoked_channels = self.channels.sweep_orphans(&live);

        debug!(
            root = %root_id,
            removed = report.removed,
            missed_detaches = report.missed_detaches,
            invalidated = report.invalidated,
            revoked_channels = report.revoked_channels,
            "sweep complete"
        );
        report
    }

    fn purge(&mut self, connector: &ConnectorRef) {
        let id = connector.connector_id();
        self.diff_states.remove(id);
        self.dirty.mark_clean(connector);
        if let Some(hook) = &self.release {
            hook.release(id);
        }
        debug!(connector = %id, kind = connector.kind(), "removed connector");
    }
}

/// Guard returned by [`ConnectorTracker::begin_write`]. Leaves the write
/// phase when dropped.
pub struct WritePhase<'a> {
    tracker: &'a mut ConnectorTracker,
}

impl Deref for WritePhase<'_> {
    type Target = ConnectorTracker;

    fn deref(&self) -> &ConnectorTracker {
        self.tracker
    }
}

impl DerefMut for WritePhase<'_> {
    fn deref_mut(&mut self) -> &mut ConnectorTracker {
        self.tracker
    }
}

impl Drop for WritePhase<'_> {
    fn drop(&mut self) {
        if self.tracker.is_write_phase() {
            if let Err(e) = self.tracker.dirty.set_write_phase(false) {
                warn!(error = %e, "failed to leave the write phase");
            }
        }
    }
}
