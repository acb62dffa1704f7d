use crate::connector::{ConnectorId, ConnectorRef};

/// Read-only view of the connector tree that owns the tracked objects.
///
/// The tracker never stores parent or child links itself; every structural
/// question goes through this trait. Implementations must answer from the
/// application's current tree, not from a cached copy.
pub trait ConnectorHierarchy: Send + Sync {
    /// Id of the root the connector is currently attached to, or `None` if
    /// it is detached.
    fn owning_root(&self, connector: &ConnectorRef) -> Option<ConnectorId>;

    /// The connector's parent, if any.
    fn parent(&self, connector: &ConnectorRef) -> Option<ConnectorRef>;

    /// The connector's own visibility flag.
    ///
    /// An explicitly hidden connector hides its whole subtree.
    fn is_visible(&self, connector: &ConnectorRef) -> bool;

    /// The connector's structural children, in paint order.
    fn children(&self, connector: &ConnectorRef) -> Vec<ConnectorRef>;

    /// Whether the remote peer can currently observe the connector.
    ///
    /// Defaults to "the connector and every ancestor are visible".
    fn is_visible_to_client(&self, connector: &ConnectorRef) -> bool {
        let mut current = Some(connector.clone());
        while let Some(c) = current {
            if !self.is_visible(&c) {
                return false;
            }
            current = self.parent(&c);
        }
        true
    }
}
