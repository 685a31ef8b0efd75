//! The public facade consumed by the presentation layer.
//!
//! Every mutation completes against the local store and returns before any
//! network interaction; delivery to the server is the background worker's
//! job. Sync failures surface only through the pending counter and the
//! connectivity flag, never as a blocking error.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

use tasksync_core::models::{
    next_temp_id, ConnectionStatus, PendingOperation, Task, TaskDraft, TaskPatch,
};
use tasksync_core::protocol::TaskFilter;

use crate::config::ClientConfig;
use crate::errors::{ClientError, ClientResult};
use crate::events::{ClientEvent, EventBus};
use crate::http::ApiClient;
use crate::monitor::{self, ConnectionState};
use crate::storage::LocalStore;
use crate::sync::SyncWorker;

const SYNC_WAIT_POLL: Duration = Duration::from_millis(100);

pub struct TaskClient {
    store: Arc<Mutex<LocalStore>>,
    api: Arc<ApiClient>,
    conn: Arc<ConnectionState>,
    worker: Arc<SyncWorker>,
    events: EventBus,
    monitor: JoinHandle<()>,
    session: Uuid,
}

impl TaskClient {
    /// Load the store, probe the server once for the initial connection
    /// state, spawn the monitor, and drain any operations recovered from a
    /// previous session.
    pub async fn new(config: ClientConfig) -> ClientResult<Self> {
        let session = Uuid::new_v4();
        let store = Arc::new(Mutex::new(LocalStore::load(&config.store_path)?));
        let api = Arc::new(ApiClient::new(&config.transport)?);
        let events = EventBus::default();

        let online = api.ping().await.is_ok();
        let conn = Arc::new(ConnectionState::new(online));
        tracing::info!(
            "CLIENT {session}: starting {}, {} operations pending",
            if online { "online" } else { "offline" },
            store.lock().await.pending_count()
        );

        let worker = SyncWorker::new(
            store.clone(),
            api.clone(),
            conn.clone(),
            events.clone(),
            config.retry_delay,
            session,
        );
        let monitor = monitor::spawn(
            api.clone(),
            conn.clone(),
            worker.clone(),
            events.clone(),
            config.probe_interval,
            session,
        );

        let client = Self {
            store,
            api,
            conn,
            worker,
            events,
            monitor,
            session,
        };

        if client.worker.has_pending().await {
            client.worker.trigger();
        }

        Ok(client)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Create a task under a fresh temporary id. Durable locally before
    /// returning; the id is rewritten once the server acknowledges.
    pub async fn create_task(&self, draft: TaskDraft) -> ClientResult<Task> {
        let now = Utc::now();
        let task = Task::from_draft(next_temp_id(), draft, now);
        let op = PendingOperation::create(&task, now)?;

        {
            let mut store = self.store.lock().await;
            store.put(task.clone());
            store.enqueue(op);
            persist_or_rollback(&mut store)?;
        }

        tracing::debug!("CLIENT {}: created task {}", self.session, task.id);
        self.events.emit(ClientEvent::TaskCreated {
            id: task.id.clone(),
        });
        self.worker.trigger();
        Ok(task)
    }

    /// Apply a sparse update. Returns the task as it now stands locally.
    pub async fn update_task(&self, id: &str, patch: TaskPatch) -> ClientResult<Task> {
        let now = Utc::now();
        let op = PendingOperation::update(id, &patch, now)?;

        let updated = {
            let mut store = self.store.lock().await;
            let mut task = store
                .get(id)
                .filter(|t| !t.deleted)
                .cloned()
                .ok_or_else(|| ClientError::TaskNotFound(id.to_string()))?;
            task.apply_patch(&patch, now);
            store.put(task.clone());
            store.enqueue(op);
            persist_or_rollback(&mut store)?;
            task
        };

        self.events.emit(ClientEvent::TaskUpdated {
            id: updated.id.clone(),
        });
        self.worker.trigger();
        Ok(updated)
    }

    /// Tombstone a task. The record stays in the store until compaction.
    pub async fn delete_task(&self, id: &str) -> ClientResult<()> {
        let now = Utc::now();

        {
            let mut store = self.store.lock().await;
            let mut task = store
                .get(id)
                .cloned()
                .ok_or_else(|| ClientError::TaskNotFound(id.to_string()))?;
            if task.deleted {
                return Ok(());
            }
            task.deleted = true;
            store.put(task);
            store.enqueue(PendingOperation::delete(id, now));
            persist_or_rollback(&mut store)?;
        }

        self.events.emit(ClientEvent::TaskDeleted { id: id.to_string() });
        self.worker.trigger();
        Ok(())
    }

    /// Local read; tombstoned records are absent.
    pub async fn get_task(&self, id: &str) -> Option<Task> {
        self.store
            .lock()
            .await
            .get(id)
            .filter(|t| !t.deleted)
            .cloned()
    }

    /// Local listing, filtered and ordered by creation time. Never touches
    /// the network.
    pub async fn list_tasks(&self, filter: &TaskFilter) -> Vec<Task> {
        let mut tasks: Vec<Task> = self
            .store
            .lock()
            .await
            .all()
            .into_iter()
            .filter(|t| !t.deleted && filter.matches(t))
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        tasks
    }

    /// Pull the server's task list and fold it into the local cache, then
    /// answer from the cache. Records with queued local operations are left
    /// alone; everything else takes the server's copy. Falls back to the
    /// local answer when offline or unreachable.
    pub async fn refresh_from_server(&self, filter: &TaskFilter) -> ClientResult<Vec<Task>> {
        if self.conn.is_online() {
            match self.api.fetch_tasks(filter).await {
                Ok(remote) => {
                    let mut store = self.store.lock().await;
                    for task in remote {
                        let has_local_edits =
                            store.operations().iter().any(|op| op.target_id == task.id);
                        if !has_local_edits {
                            store.put(task);
                        }
                    }
                    persist_or_rollback(&mut store)?;
                }
                Err(err) if err.is_transport() => {
                    tracing::warn!(
                        "CLIENT {}: refresh failed, switching offline: {err}",
                        self.session
                    );
                    if self.conn.set_online(false) {
                        self.events
                            .emit(ClientEvent::ConnectionChanged { online: false });
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok(self.list_tasks(filter).await)
    }

    /// Probe immediately and start a drain when reachable. Returns whether
    /// a drain was started.
    pub async fn force_sync(&self) -> bool {
        let online = self.api.ping().await.is_ok();
        let was_online = self.conn.set_online(online);
        if online != was_online {
            self.events.emit(ClientEvent::ConnectionChanged { online });
        }
        if online {
            self.worker.trigger();
        }
        online
    }

    /// Manual online/offline override. Switching online verifies with a
    /// probe first; returns the resulting state.
    pub async fn set_online(&self, online: bool) -> bool {
        if online {
            self.force_sync().await
        } else {
            if self.conn.set_online(false) {
                self.events
                    .emit(ClientEvent::ConnectionChanged { online: false });
            }
            false
        }
    }

    pub async fn status(&self) -> ConnectionStatus {
        ConnectionStatus {
            online: self.conn.is_online(),
            syncing: self.worker.is_syncing(),
            pending_count: self.store.lock().await.pending_count(),
        }
    }

    /// Drain the queue and wait up to `timeout`, polling the queue length.
    /// Returns whether the queue emptied; the caller proceeds with shutdown
    /// either way.
    pub async fn sync_and_wait(&self, timeout: Duration) -> bool {
        if !self.worker.has_pending().await {
            return true;
        }
        if !self.force_sync().await {
            return false;
        }

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if !self.worker.has_pending().await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    "CLIENT {}: sync_and_wait timed out with {} operations left",
                    self.session,
                    self.store.lock().await.pending_count()
                );
                return false;
            }
            tokio::time::sleep(SYNC_WAIT_POLL).await;
        }
    }
}

impl Drop for TaskClient {
    fn drop(&mut self) {
        self.monitor.abort();
    }
}

fn persist_or_rollback(store: &mut LocalStore) -> ClientResult<()> {
    if let Err(err) = store.persist() {
        tracing::error!("persist failed, restoring last durable state: {err}");
        if let Err(reload_err) = store.reload() {
            tracing::error!("restore after failed persist also failed: {reload_err}");
        }
        return Err(err);
    }
    Ok(())
}
