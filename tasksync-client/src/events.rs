//! Completion and lifecycle notifications for the presentation layer.
//!
//! Events are delivered over a broadcast channel: background workers emit,
//! any number of UI observers subscribe. Id rewrites are applied to the
//! store before the corresponding event is sent.

use tokio::sync::broadcast;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    TaskCreated { id: String },
    TaskUpdated { id: String },
    TaskDeleted { id: String },
    /// A temporary id was reconciled to the server-assigned permanent id.
    TaskIdChanged { old_id: String, new_id: String },
    SyncStarted,
    SyncCompleted { synced: usize, remaining: usize },
    SyncFailed { message: String },
    ConnectionChanged { online: bool },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    /// Send without caring whether anyone is listening.
    pub fn emit(&self, event: ClientEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
