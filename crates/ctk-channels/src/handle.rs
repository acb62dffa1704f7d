//! Channel handles.

use std::fmt;
use std::sync::Arc;

use ctk_types::HandleId;

/// A data-transfer endpoint bound to a connector under a name.
///
/// The registry only needs a stable identity; reading or writing the stream
/// is up to the transport layer.
pub trait StreamVariable: Send + Sync + fmt::Debug {
    /// Stable identity of this handle. Secret keys are keyed by it.
    fn handle_id(&self) -> HandleId;
}

/// Shared handle to a stream variable.
pub type ChannelHandle = Arc<dyn StreamVariable>;

/// A plain stream variable carrying only its identity and a label.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamHandle {
    id: HandleId,
    label: String,
}

impl StreamHandle {
    /// Create a handle with a fresh id.
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_id(HandleId::new(), label)
    }

    /// Create a handle with a known id, e.g. when restoring a session.
    pub fn with_id(id: HandleId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
        }
    }

    /// Wrap into a shareable [`ChannelHandle`].
    pub fn into_handle(self) -> ChannelHandle {
        Arc::new(self)
    }

    /// Human-readable label.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl StreamVariable for StreamHandle {
    fn handle_id(&self) -> HandleId {
        self.id
    }
}
