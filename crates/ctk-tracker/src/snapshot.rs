//! Persisting a [`ConnectorTracker`] across process restarts.
//!
//! A [`TrackerSnapshot`] stores ids only. Live objects are re-bound on
//! restore through an [`ObjectResolver`], and anything that no longer
//! resolves is dropped with a warning. Diff states are stored as JSON text and
//! must all parse back; secret keys are stored verbatim so issued upload URLs
//! stay valid.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use ctk_channels::ChannelBinding;
use ctk_diff::DiffStateCache;
use ctk_directory::RegistrationState;
use ctk_types::{ConnectorHierarchy, ConnectorId, ConnectorRef, HandleId, SecretKey};

use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::hooks::ObjectResolver;
use crate::tracker::ConnectorTracker;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// One directory entry in persistable form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorRecord {
    pub id: ConnectorId,
    pub state: RegistrationState,
    pub client_initialized: bool,
}

/// On-disk encoding of a snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotFormat {
    /// Pretty-printed JSON.
    Json,
    /// Compact bincode.
    Binary,
}

/// Everything a tracker knows, keyed by id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub root: ConnectorId,
    /// Directory entries, sorted by id.
    pub connectors: Vec<ConnectorRecord>,
    /// Dirty connector ids, sorted.
    pub dirty: Vec<ConnectorId>,
    /// Last-sent state per connector as JSON text.
    pub diff_states: BTreeMap<ConnectorId, String>,
    pub channels: Vec<ChannelBinding>,
    pub secret_keys: BTreeMap<HandleId, SecretKey>,
}

impl TrackerSnapshot {
    pub fn to_json(&self) -> TrackerResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| TrackerError::Snapshot(e.to_string()))
    }

    pub fn from_json(s: &str) -> TrackerResult<Self> {
        serde_json::from_str(s).map_err(|e| TrackerError::Snapshot(e.to_string()))
    }

    pub fn to_bytes(&self) -> TrackerResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| TrackerError::Snapshot(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> TrackerResult<Self> {
        bincode::deserialize(bytes).map_err(|e| TrackerError::Snapshot(e.to_string()))
    }

    /// Write the snapshot to `path` in the given format.
    pub fn write_to(&self, path: &Path, format: SnapshotFormat) -> TrackerResult<()> {
        let bytes = match format {
            SnapshotFormat::Json => self.to_json()?.into_bytes(),
            SnapshotFormat::Binary => self.to_bytes()?,
        };
        std::fs::write(path, bytes)?;
        debug!(path = %path.display(), ?format, "wrote snapshot");
        Ok(())
    }

    /// Read a snapshot written by [`write_to`](Self::write_to), detecting the
    /// format from the content.
    pub fn read_from(path: &Path) -> TrackerResult<Self> {
        let bytes = std::fs::read(path)?;
        match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') => {
                let text =
                    std::str::from_utf8(&bytes).map_err(|e| TrackerError::Snapshot(e.to_string()))?;
                Self::from_json(text)
            }
            _ => Self::from_bytes(&bytes),
        }
    }
}

impl ConnectorTracker {
    /// Capture the tracker's state.
    ///
    /// The write phase is not captured; a restored tracker always starts
    /// outside it.
    pub fn snapshot(&self) -> TrackerResult<TrackerSnapshot> {
        let connectors = self
            .directory
            .ids()
            .into_iter()
            .map(|id| ConnectorRecord {
                state: self
                    .directory
                    .registration_state(&id)
                    .unwrap_or(RegistrationState::Registered),
                client_initialized: !self.directory.is_uninitialized(&id),
                id,
            })
            .collect();

        Ok(TrackerSnapshot {
            version: SNAPSHOT_VERSION,
            created_at: Utc::now(),
            root: self.root_id().clone(),
            connectors,
            dirty: self.dirty.dirty_ids(),
            diff_states: self.diff_states.to_encoded()?,
            channels: self.channels.bindings(),
            secret_keys: self.channels.secret_keys(),
        })
    }

    /// Rebuild a tracker from a snapshot.
    ///
    /// Fails on a version or root mismatch and on any diff state that does
    /// not parse. Connectors and channel handles the resolver cannot find are
    /// skipped with a warning, together with everything keyed by them.
    pub fn restore(
        snapshot: TrackerSnapshot,
        root: ConnectorRef,
        hierarchy: Arc<dyn ConnectorHierarchy>,
        resolver: &dyn ObjectResolver,
        config: TrackerConfig,
    ) -> TrackerResult<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(TrackerError::UnsupportedSnapshotVersion {
                found: snapshot.version,
                expected: SNAPSHOT_VERSION,
            });
        }
        if &snapshot.root != root.connector_id() {
            return Err(TrackerError::RootMismatch {
                expected: snapshot.root,
                actual: root.connector_id().clone(),
            });
        }

        let cached_ids: Vec<ConnectorId> = snapshot.diff_states.keys().cloned().collect();
        let mut diff_states = DiffStateCache::from_encoded(snapshot.diff_states)?;

        let mut tracker = Self::new(root, hierarchy, config)?;
        let mut restored: HashMap<ConnectorId, ConnectorRef> = HashMap::new();

        for record in &snapshot.connectors {
            let Some(connector) = resolver.connector(&record.id) else {
                warn!(connector = %record.id, "connector in snapshot no longer exists, skipping");
                continue;
            };
            if connector.connector_id() != &record.id {
                warn!(
                    connector = %record.id,
                    resolved = %connector.connector_id(),
                    "resolver returned a connector with a different id, skipping"
                );
                continue;
            }

            tracker.directory.register(&connector)?;
            if record.state == RegistrationState::PendingRemoval {
                tracker.directory.unregister(&connector);
            }
            if record.client_initialized {
                tracker.directory.mark_client_initialized(&connector);
            }
            restored.insert(record.id.clone(), connector);
        }

        for id in &snapshot.dirty {
            if let Some(connector) = restored.get(id) {
                tracker.dirty.mark_dirty(connector)?;
            }
        }

        for id in cached_ids {
            if !restored.contains_key(&id) {
                diff_states.remove(&id);
            }
        }
        tracker.diff_states = diff_states;

        for binding in &snapshot.channels {
            if !restored.contains_key(&binding.owner) {
                warn!(owner = %binding.owner, name = %binding.name, "channel owner no longer exists, skipping");
                continue;
            }
            let Some(handle) = resolver.channel(&binding.handle) else {
                warn!(
                    owner = %binding.owner,
                    name = %binding.name,
                    handle = %binding.handle,
                    "channel handle no longer exists, skipping"
                );
                continue;
            };
            let key = snapshot.secret_keys.get(&binding.handle).cloned();
            tracker.channels.insert_restored(binding, handle, key);
        }

        debug!(
            root = %tracker.root_id(),
            connectors = restored.len(),
            skipped = snapshot.connectors.len() - restored.len(),
            channels = tracker.channels.channel_count(),
            "restored tracker from snapshot"
        );
        Ok(tracker)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use ctk_channels::{ChannelHandle, StreamHandle};
    use ctk_diff::DiffError;
    use ctk_types::same_connector;

    use crate::hooks::ObjectTable;
    use crate::memory::{MemoryHierarchy, TreeNode};

    fn cid(id: &str) -> ConnectorId {
        ConnectorId::new(id).unwrap()
    }

    struct Fixture {
        tree: Arc<MemoryHierarchy>,
        tracker: ConnectorTracker,
        nodes: Vec<ConnectorRef>,
        handle: ChannelHandle,
    }

    /// root(1) -> split(2) -> (left(3), right(4)), with some state in every
    /// subsystem.
    fn fixture() -> Fixture {
        let tree = Arc::new(MemoryHierarchy::new());
        let nodes = vec![
            TreeNode::new(cid("1"), "UI"),
            TreeNode::new(cid("2"), "SplitPanel"),
            TreeNode::new(cid("3"), "Label"),
            TreeNode::new(cid("4"), "Label"),
        ];
        tree.add_root(&nodes[0]);
        tree.attach(&cid("1"), &nodes[1]);
        tree.attach(&cid("2"), &nodes[2]);
        tree.attach(&cid("2"), &nodes[3]);

        let mut tracker =
            ConnectorTracker::new(nodes[0].clone(), tree.clone(), TrackerConfig::default())
                .unwrap();
        for node in &nodes {
            tracker.register(node).unwrap();
        }
        for node in &nodes[..3] {
            tracker.mark_client_initialized(node);
            tracker.mark_clean(node);
        }
        let left_state = json!({"text": "Left", "width": 120});
        if let serde_json::Value::Object(map) = left_state {
            tracker.set_diff_state(&nodes[2], map);
        }
        tracker.unregister(&nodes[1]);

        let handle = StreamHandle::new("upload").into_handle();
        tracker.add_channel(&cid("3"), "upload", handle.clone()).unwrap();

        Fixture {
            tree,
            tracker,
            nodes,
            handle,
        }
    }

    fn resolver(f: &Fixture) -> ObjectTable {
        let mut table = ObjectTable::new();
        for node in &f.nodes {
            table.insert_connector(node.clone());
        }
        table.insert_channel(f.handle.clone());
        table
    }

    fn restore(f: &Fixture, snapshot: TrackerSnapshot, table: &ObjectTable) -> TrackerResult<ConnectorTracker> {
        ConnectorTracker::restore(
            snapshot,
            f.nodes[0].clone(),
            f.tree.clone(),
            table,
            TrackerConfig::default(),
        )
    }

    // ---- Test 1: snapshot contents ----
    #[test]
    fn snapshot_captures_every_subsystem() {
        let f = fixture();
        let snap = f.tracker.snapshot().unwrap();

        assert_eq!(snap.version, SNAPSHOT_VERSION);
        assert_eq!(snap.root, cid("1"));
        assert_eq!(snap.connectors.len(), 4);
        assert_eq!(snap.connectors[1].state, RegistrationState::PendingRemoval);
        assert!(snap.connectors[2].client_initialized);
        assert!(!snap.connectors[3].client_initialized);
        assert_eq!(snap.dirty, vec![cid("4")]);
        assert_eq!(snap.diff_states.len(), 1);
        assert_eq!(snap.channels.len(), 1);
        assert_eq!(snap.secret_keys.len(), 1);
    }

    // ---- Test 2: restore preserves state ----
    #[test]
    fn restore_preserves_state() {
        let f = fixture();
        let snap = f.tracker.snapshot().unwrap();
        let table = resolver(&f);
        let restored = restore(&f, snap, &table).unwrap();

        assert!(same_connector(restored.lookup(&cid("3")).unwrap(), &f.nodes[2]));
        assert!(restored.lookup(&cid("2")).is_none());
        assert_eq!(
            restored.registration_state(&cid("2")),
            Some(RegistrationState::PendingRemoval)
        );
        assert!(restored.is_client_initialized(&f.nodes[2]));
        assert!(!restored.is_client_initialized(&f.nodes[3]));
        assert!(restored.is_dirty(&f.nodes[3]));
        assert!(!restored.is_dirty(&f.nodes[2]));
        assert!(!restored.is_write_phase());
        assert_eq!(
            restored.diff_state(&f.nodes[2]),
            f.tracker.diff_state(&f.nodes[2])
        );
        assert_eq!(
            restored.get_secret_key(&f.handle),
            f.tracker.get_secret_key(&f.handle)
        );
        assert!(restored.get_channel(&cid("3"), "upload").is_some());
    }

    // ---- Test 3: encodings ----
    #[test]
    fn json_and_binary_encodings() {
        let f = fixture();
        let snap = f.tracker.snapshot().unwrap();

        let json = snap.to_json().unwrap();
        assert_eq!(TrackerSnapshot::from_json(&json).unwrap(), snap);
        let bytes = snap.to_bytes().unwrap();
        assert_eq!(TrackerSnapshot::from_bytes(&bytes).unwrap(), snap);
        assert!(TrackerSnapshot::from_json("{").is_err());
    }

    // ---- Test 4: files ----
    #[test]
    fn write_and_read_files() {
        let f = fixture();
        let snap = f.tracker.snapshot().unwrap();
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("tracker.json");
        snap.write_to(&json_path, SnapshotFormat::Json).unwrap();
        assert_eq!(TrackerSnapshot::read_from(&json_path).unwrap(), snap);

        let bin_path = dir.path().join("tracker.bin");
        snap.write_to(&bin_path, SnapshotFormat::Binary).unwrap();
        assert_eq!(TrackerSnapshot::read_from(&bin_path).unwrap(), snap);

        assert!(matches!(
            TrackerSnapshot::read_from(&dir.path().join("missing")),
            Err(TrackerError::Io(_))
        ));
    }

    // ---- Test 5: corrupt diff state ----
    #[test]
    fn corrupt_diff_state_fails_restore() {
        let f = fixture();
        let mut snap = f.tracker.snapshot().unwrap();
        snap.diff_states.insert(cid("3"), "{not json".into());
        let table = resolver(&f);

        let err = restore(&f, snap, &table).unwrap_err();
        assert!(
            matches!(err, TrackerError::Diff(DiffError::CacheRestoreFailed { ref connector, .. }) if *connector == cid("3")),
            "got: {err}"
        );
    }

    // ---- Test 6: unresolvable objects are skipped ----
    #[test]
    fn unresolvable_objects_are_skipped() {
        let f = fixture();
        let snap = f.tracker.snapshot().unwrap();
        let mut table = ObjectTable::new();
        for node in [&f.nodes[0], &f.nodes[1], &f.nodes[3]] {
            table.insert_connector(node.clone());
        }
        table.insert_channel(f.handle.clone());

        let restored = restore(&f, snap, &table).unwrap();
        assert_eq!(restored.registered_ids(), vec![cid("1"), cid("2"), cid("4")]);
        assert!(restored.diff_states.is_empty());
        assert_eq!(restored.channel_count(), 0);
        assert!(restored.get_secret_key(&f.handle).is_none());
    }

    // ---- Test 7: envelope checks ----
    #[test]
    fn version_and_root_are_checked() {
        let f = fixture();
        let table = resolver(&f);

        let mut snap = f.tracker.snapshot().unwrap();
        snap.version = 99;
        assert!(matches!(
            restore(&f, snap, &table),
            Err(TrackerError::UnsupportedSnapshotVersion { found: 99, .. })
        ));

        let snap = f.tracker.snapshot().unwrap();
        let other_root = TreeNode::new(cid("100"), "UI");
        let result = ConnectorTracker::restore(
            snap,
            other_root,
            f.tree.clone(),
            &table,
            TrackerConfig::default(),
        );
        assert!(matches!(result, Err(TrackerError::RootMismatch { .. })));
    }

    // ---- Test 8: restored tracker keeps working ----
    #[test]
    fn restored_tracker_sweeps_pending_removals() {
        let f = fixture();
        let snap = f.tracker.snapshot().unwrap();
        let table = resolver(&f);
        let mut restored = restore(&f, snap, &table).unwrap();

        let report = restored.sweep();
        assert_eq!(report.removed, 1);
        assert_eq!(restored.registered_ids(), vec![cid("1"), cid("3"), cid("4")]);
        assert!(restored.get_channel(&cid("3"), "upload").is_some());
    }
}
