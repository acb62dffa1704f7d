use std::collections::HashMap;
use std::sync::Arc;

use ctk_channels::ChannelHandle;
use ctk_types::{ConnectorId, ConnectorRef, HandleId};

/// Releases resources another subsystem keeps per connector (e.g. a global
/// resource table serving downloads by connector id).
///
/// Called exactly once for every connector the sweep removes.
pub trait ResourceRelease: Send + Sync {
    fn release(&self, id: &ConnectorId);
}

pub struct NoOpRelease;

impl ResourceRelease for NoOpRelease {
    fn release(&self, _id: &ConnectorId) {}
}

/// Maps persisted ids back to live objects when restoring a snapshot.
pub trait ObjectResolver {
    fn connector(&self, id: &ConnectorId) -> Option<ConnectorRef>;
    fn channel(&self, id: &HandleId) -> Option<ChannelHandle>;
}

/// A plain lookup table implementing [`ObjectResolver`].
#[derive(Default)]
pub struct ObjectTable {
    connectors: HashMap<ConnectorId, ConnectorRef>,
    channels: HashMap<HandleId, ChannelHandle>,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_connector(&mut self, connector: ConnectorRef) {
        self.connectors
            .insert(connector.connector_id().clone(), connector);
    }

    pub fn insert_channel(&mut self, handle: ChannelHandle) {
        self.channels.insert(handle.handle_id(), handle);
    }
}

impl ObjectResolver for ObjectTable {
    fn connector(&self, id: &ConnectorId) -> Option<ConnectorRef> {
        self.connectors.get(id).map(Arc::clone)
    }

    fn channel(&self, id: &HandleId) -> Option<ChannelHandle> {
        self.channels.get(id).map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctk_channels::StreamHandle;

    use crate::memory::TreeNode;

    #[test]
    fn noop_release_does_nothing() {
        NoOpRelease.release(&ConnectorId::new("1").unwrap());
    }

    #[test]
    fn object_table_resolves_inserted_objects() {
        let mut table = ObjectTable::new();
        let node = TreeNode::new(ConnectorId::new("5").unwrap(), "Label");
        let handle = StreamHandle::new("upload").into_handle();
        table.insert_connector(node.clone());
        table.insert_channel(handle.clone());

        let found = table.connector(&ConnectorId::new("5").unwrap()).unwrap();
        assert!(ctk_types::same_connector(&found, &node));
        assert!(table.channel(&handle.handle_id()).is_some());
        assert!(table.connector(&ConnectorId::new("6").unwrap()).is_none());
        assert!(table.channel(&HandleId::new()).is_none());
    }
}
