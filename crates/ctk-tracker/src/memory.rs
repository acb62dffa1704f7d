//! In-memory connector tree for tests, demos, and embedding.
//!
//! [`MemoryHierarchy`] keeps parent/child links and visibility flags in a
//! `HashMap` behind a `RwLock` and implements [`ConnectorHierarchy`]. Nodes
//! that are detached stay known to the hierarchy (they can be re-attached)
//! but no longer report an owning root.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ctk_types::{same_connector, Connector, ConnectorHierarchy, ConnectorId, ConnectorRef};

/// A plain connector identified by id and kind.
#[derive(Debug)]
pub struct TreeNode {
    id: ConnectorId,
    kind: String,
}

impl TreeNode {
    /// Create a shareable node.
    pub fn new(id: ConnectorId, kind: impl Into<String>) -> ConnectorRef {
        Arc::new(Self {
            id,
            kind: kind.into(),
        })
    }
}

impl Connector for TreeNode {
    fn connector_id(&self) -> &ConnectorId {
        &self.id
    }

    fn kind(&self) -> &str {
        &self.kind
    }
}

struct NodeRecord {
    connector: ConnectorRef,
    parent: Option<ConnectorId>,
    children: Vec<ConnectorId>,
    visible: bool,
    is_root: bool,
}

impl NodeRecord {
    fn new(connector: &ConnectorRef, is_root: bool) -> Self {
        Self {
            connector: connector.clone(),
            parent: None,
            children: Vec::new(),
            visible: true,
            is_root,
        }
    }
}

/// An in-memory implementation of [`ConnectorHierarchy`].
#[derive(Default)]
pub struct MemoryHierarchy {
    nodes: RwLock<HashMap<ConnectorId, NodeRecord>>,
}

impl std::fmt::Debug for MemoryHierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryHierarchy")
            .field("nodes", &self.read().len())
            .finish()
    }
}

impl MemoryHierarchy {
    /// Create an empty hierarchy.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ConnectorId, NodeRecord>> {
        self.nodes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ConnectorId, NodeRecord>> {
        self.nodes.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of known nodes, attached or not.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if no node is known.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Add a session root. A root is its own owning root.
    pub fn add_root(&self, connector: &ConnectorRef) {
        self.write().insert(
            connector.connector_id().clone(),
            NodeRecord::new(connector, true),
        );
    }

    /// Attach `connector` as the last child of `parent`.
    ///
    /// A connector attached elsewhere is moved. Returns `false` (and changes
    /// nothing) if the parent is unknown or the move would create a cycle.
    pub fn attach(&self, parent: &ConnectorId, connector: &ConnectorRef) -> bool {
        let mut nodes = self.write();
        let id = connector.connector_id().clone();
        if !nodes.contains_key(parent) || is_ancestor_or_self(&nodes, &id, parent) {
            return false;
        }

        unlink(&mut nodes, &id);
        let record = nodes
            .entry(id.clone())
            .or_insert_with(|| NodeRecord::new(connector, false));
        record.connector = connector.clone();
        record.parent = Some(parent.clone());
        if let Some(p) = nodes.get_mut(parent) {
            p.children.push(id);
        }
        true
    }

    /// Detach a connector (and with it its subtree) from its parent.
    ///
    /// Returns `false` if the connector is unknown or already detached.
    pub fn detach(&self, id: &ConnectorId) -> bool {
        unlink(&mut self.write(), id)
    }

    /// Set a connector's own visibility flag. Returns `false` if unknown.
    pub fn set_visible(&self, id: &ConnectorId, visible: bool) -> bool {
        match self.write().get_mut(id) {
            Some(record) => {
                record.visible = visible;
                true
            }
            None => false,
        }
    }

    /// The connector known under `id`.
    pub fn get(&self, id: &ConnectorId) -> Option<ConnectorRef> {
        self.read().get(id).map(|r| r.connector.clone())
    }

    /// `id` and all its descendants, depth-first in paint order.
    pub fn subtree(&self, id: &ConnectorId) -> Vec<ConnectorRef> {
        let nodes = self.read();
        let mut out = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            let Some(record) = nodes.get(&current) else {
                continue;
            };
            out.push(record.connector.clone());
            stack.extend(record.children.iter().rev().cloned());
        }
        out
    }

    fn record_for<'a>(
        nodes: &'a HashMap<ConnectorId, NodeRecord>,
        connector: &ConnectorRef,
    ) -> Option<&'a NodeRecord> {
        nodes
            .get(connector.connector_id())
            .filter(|r| same_connector(&r.connector, connector))
    }
}

/// Remove `id` from its parent's child list. Returns `true` if it had a parent.
fn unlink(nodes: &mut HashMap<ConnectorId, NodeRecord>, id: &ConnectorId) -> bool {
    let Some(parent) = nodes.get_mut(id).and_then(|r| r.parent.take()) else {
        return false;
    };
    if let Some(p) = nodes.get_mut(&parent) {
        p.children.retain(|child| child != id);
    }
    true
}

/// Returns `true` if `candidate` is `node` or one of its ancestors.
fn is_ancestor_or_self(
    nodes: &HashMap<ConnectorId, NodeRecord>,
    candidate: &ConnectorId,
    node: &ConnectorId,
) -> bool {
    let mut current = Some(node);
    while let Some(id) = current {
        if id == candidate {
            return true;
        }
        current = nodes.get(id).and_then(|r| r.parent.as_ref());
    }
    false
}

impl ConnectorHierarchy for MemoryHierarchy {
    fn owning_root(&self, connector: &ConnectorRef) -> Option<ConnectorId> {
        let nodes = self.read();
        let mut record = Self::record_for(&nodes, connector)?;
        let mut id = connector.connector_id();
        while let Some(parent) = record.parent.as_ref() {
            id = parent;
            record = nodes.get(parent)?;
        }
        record.is_root.then(|| id.clone())
    }

    fn parent(&self, connector: &ConnectorRef) -> Option<ConnectorRef> {
        let nodes = self.read();
        let parent = Self::record_for(&nodes, connector)?.parent.as_ref()?;
        nodes.get(parent).map(|r| r.connector.clone())
    }

    fn is_visible(&self, connector: &ConnectorRef) -> bool {
        Self::record_for(&self.read(), connector).is_some_and(|r| r.visible)
    }

    fn children(&self, connector: &ConnectorRef) -> Vec<ConnectorRef> {
        let nodes = self.read();
        let Some(record) = Self::record_for(&nodes, connector) else {
            return Vec::new();
        };
        record
            .children
            .iter()
            .filter_map(|child| nodes.get(child).map(|r| r.connector.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(id: &str) -> ConnectorId {
        ConnectorId::new(id).unwrap()
    }

    /// root(1) -> split(2) -> (left(3), right(4))
    fn split_panel() -> (MemoryHierarchy, Vec<ConnectorRef>) {
        let tree = MemoryHierarchy::new();
        let root = TreeNode::new(cid("1"), "UI");
        let split = TreeNode::new(cid("2"), "SplitPanel");
        let left = TreeNode::new(cid("3"), "Label");
        let right = TreeNode::new(cid("4"), "Label");
        tree.add_root(&root);
        assert!(tree.attach(&cid("1"), &split));
        assert!(tree.attach(&cid("2"), &left));
        assert!(tree.attach(&cid("2"), &right));
        (tree, vec![root, split, left, right])
    }

    #[test]
    fn owning_root_walks_to_the_root() {
        let (tree, nodes) = split_panel();
        for node in &nodes {
            assert_eq!(tree.owning_root(node), Some(cid("1")));
        }
    }

    #[test]
    fn detached_subtree_has_no_root() {
        let (tree, nodes) = split_panel();
        assert!(tree.detach(&cid("2")));
        assert!(!tree.detach(&cid("2")));

        assert_eq!(tree.owning_root(&nodes[1]), None);
        assert_eq!(tree.owning_root(&nodes[2]), None);
        assert_eq!(tree.owning_root(&nodes[0]), Some(cid("1")));
        assert!(tree.children(&nodes[0]).is_empty());
    }

    #[test]
    fn reattach_moves_the_node() {
        let (tree, nodes) = split_panel();
        assert!(tree.attach(&cid("1"), &nodes[2]));

        let under_split: Vec<String> = tree
            .children(&nodes[1])
            .iter()
            .map(|c| c.connector_id().to_string())
            .collect();
        assert_eq!(under_split, vec!["4"]);
        assert!(same_connector(&tree.parent(&nodes[2]).unwrap(), &nodes[0]));
    }

    #[test]
    fn attach_rejects_cycles_and_unknown_parents() {
        let (tree, nodes) = split_panel();
        assert!(!tree.attach(&cid("3"), &nodes[1]));
        assert!(!tree.attach(&cid("99"), &TreeNode::new(cid("5"), "Label")));
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn visibility_is_inherited_for_the_client() {
        let (tree, nodes) = split_panel();
        assert!(tree.set_visible(&cid("2"), false));

        assert!(!tree.is_visible(&nodes[1]));
        assert!(tree.is_visible(&nodes[2]));
        assert!(!tree.is_visible_to_client(&nodes[2]));
        assert!(tree.is_visible_to_client(&nodes[0]));
        assert!(!tree.set_visible(&cid("99"), false));
    }

    #[test]
    fn subtree_is_paint_ordered() {
        let (tree, _) = split_panel();
        let ids: Vec<String> = tree
            .subtree(&cid("1"))
            .iter()
            .map(|c| c.connector_id().to_string())
            .collect();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
    }

    #[test]
    fn impostor_is_unknown_to_the_tree() {
        let (tree, _) = split_panel();
        let impostor = TreeNode::new(cid("3"), "Label");
        assert_eq!(tree.owning_root(&impostor), None);
        assert!(!tree.is_visible(&impostor));
        assert!(tree.parent(&impostor).is_none());
    }
}
