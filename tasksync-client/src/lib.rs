//! Offline-first client for the task service.
//!
//! Mutations always complete against the durable local store and are queued
//! for at-least-once delivery; a background worker drains the queue when
//! the connection monitor says the server is reachable, and temporary ids
//! are reconciled to server-assigned ones as creates are acknowledged.

pub mod client;
pub mod config;
pub mod errors;
pub mod events;
pub mod http;
pub mod monitor;
pub mod reconcile;
pub mod storage;
pub mod sync;

pub use client::TaskClient;
pub use config::{ClientConfig, TransportConfig};
pub use errors::{ClientError, ClientResult};
pub use events::ClientEvent;
pub use storage::LocalStore;

pub use tasksync_core::models::{
    ConnectionStatus, OperationKind, PendingOperation, Task, TaskDraft, TaskPatch,
};
pub use tasksync_core::protocol::TaskFilter;
