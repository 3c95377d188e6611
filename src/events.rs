//! C6 EventBus: fire-and-forget lifecycle notifications (§6.4).

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::broadcast;

/// A lifecycle event dispatched exactly once per upload at the named transition.
#[derive(Debug, Clone)]
pub enum TusEvent {
    /// Dispatched at the end of a pure-create POST (not a creation-with-upload POST).
    UploadStarted { id: String, file: String, metadata: HashMap<String, String> },
    /// Dispatched when a record transitions to `complete`.
    UploadComplete { id: String, file: String, metadata: HashMap<String, String> },
}

/// Dispatches [`TusEvent`]s to subscribers. Hosts may implement this against their own
/// message bus; the crate ships [`BroadcastEventBus`] as a working default.
#[async_trait::async_trait]
pub trait EventBus: Send + Sync {
    fn publish(&self, event: TusEvent);

    /// Subscribe to future events. Default implementation returns `None`, meaning the bus
    /// does not support in-process subscription (e.g. a bus that only forwards externally).
    fn subscribe(&self) -> Option<broadcast::Receiver<TusEvent>> {
        None
    }
}

/// Default [`EventBus`], a thin wrapper over [`tokio::sync::broadcast`]. A `publish` with no
/// subscribers is not an error: `broadcast::Sender::send` returning `Err` just means nobody
/// is listening right now, which this bus silently accepts.
pub struct BroadcastEventBus {
    sender: Arc<broadcast::Sender<TusEvent>>,
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(16)
    }
}

impl BroadcastEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender: Arc::new(sender) }
    }
}

#[async_trait::async_trait]
impl EventBus for BroadcastEventBus {
    fn publish(&self, event: TusEvent) {
        // No receivers is the common case (no host subscribed); that's fine.
        let _ = self.sender.send(event);
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<TusEvent>> {
        Some(self.sender.subscribe())
    }
}
