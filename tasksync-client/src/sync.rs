//! Background queue drain.
//!
//! One pass at a time: `trigger()` is a compare-and-swap no-op while a pass
//! runs or while offline. A pass snapshots the queue, sends it as a single
//! batch request, commits exactly the snapshot length on success and applies
//! the returned id mapping before anyone is notified.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::events::{ClientEvent, EventBus};
use crate::http::ApiClient;
use crate::monitor::ConnectionState;
use crate::reconcile;
use crate::storage::LocalStore;

pub struct SyncWorker {
    store: Arc<Mutex<LocalStore>>,
    api: Arc<ApiClient>,
    conn: Arc<ConnectionState>,
    events: EventBus,
    syncing: AtomicBool,
    retry_delay: Duration,
    session: Uuid,
}

impl SyncWorker {
    pub fn new(
        store: Arc<Mutex<LocalStore>>,
        api: Arc<ApiClient>,
        conn: Arc<ConnectionState>,
        events: EventBus,
        retry_delay: Duration,
        session: Uuid,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            api,
            conn,
            events,
            syncing: AtomicBool::new(false),
            retry_delay,
            session,
        })
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub async fn has_pending(&self) -> bool {
        self.store.lock().await.pending_count() > 0
    }

    /// Request a sync pass. No-op while offline or while a pass is already
    /// running; the guard is released when the spawned pass finishes.
    pub fn trigger(self: &Arc<Self>) {
        if !self.conn.is_online() {
            tracing::debug!("CLIENT {}: sync not started, offline", self.session);
            return;
        }
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("CLIENT {}: sync already in flight", self.session);
            return;
        }

        let worker = Arc::clone(self);
        tokio::spawn(async move {
            worker.drain().await;
            worker.syncing.store(false, Ordering::Release);
        });
    }

    async fn drain(&self) {
        loop {
            let batch = { self.store.lock().await.peek_batch() };
            if batch.is_empty() {
                return;
            }

            self.events.emit(ClientEvent::SyncStarted);
            tracing::info!(
                "CLIENT {}: sending batch of {} operations",
                self.session,
                batch.len()
            );

            match self.api.send_batch(&batch).await {
                Ok(response) if response.success => {
                    let (remaining, renames) = {
                        let mut store = self.store.lock().await;
                        // Exactly the snapshot length: entries enqueued
                        // during the round-trip stay at the front next pass.
                        store.commit(batch.len());
                        let renames = reconcile::apply_mapping(&mut store, &response.id_mapping);
                        if let Err(err) = store.persist() {
                            tracing::error!(
                                "CLIENT {}: persist after commit failed: {err}",
                                self.session
                            );
                            if let Err(reload_err) = store.reload() {
                                tracing::error!(
                                    "CLIENT {}: rollback reload failed: {reload_err}",
                                    self.session
                                );
                            }
                            self.events.emit(ClientEvent::SyncFailed {
                                message: err.to_string(),
                            });
                            return;
                        }
                        (store.pending_count(), renames)
                    };

                    for (old_id, new_id) in renames {
                        self.events.emit(ClientEvent::TaskIdChanged { old_id, new_id });
                    }
                    self.events.emit(ClientEvent::SyncCompleted {
                        synced: batch.len(),
                        remaining,
                    });

                    if remaining == 0 {
                        return;
                    }
                    // More work arrived mid-flight; pause before the next
                    // pass instead of hammering the server.
                    tokio::time::sleep(self.retry_delay).await;
                }
                Ok(_) => {
                    tracing::error!(
                        "CLIENT {}: server refused batch, operations stay queued",
                        self.session
                    );
                    self.events.emit(ClientEvent::SyncFailed {
                        message: "server refused batch".to_string(),
                    });
                    return;
                }
                Err(err) if err.is_transport() => {
                    tracing::warn!(
                        "CLIENT {}: transport failure, switching offline: {err}",
                        self.session
                    );
                    if self.conn.set_online(false) {
                        self.events
                            .emit(ClientEvent::ConnectionChanged { online: false });
                    }
                    self.events.emit(ClientEvent::SyncFailed {
                        message: err.to_string(),
                    });
                    return;
                }
                Err(err) => {
                    // Rejected but reachable. Leave the queue for the next
                    // monitor tick; the failure may be transient.
                    tracing::error!("CLIENT {}: batch rejected: {err}", self.session);
                    self.events.emit(ClientEvent::SyncFailed {
                        message: err.to_string(),
                    });
                    return;
                }
            }
        }
    }
}
