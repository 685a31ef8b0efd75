//! Connectivity state and the periodic reachability probe.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uuid::Uuid;

use crate::events::{ClientEvent, EventBus};
use crate::http::ApiClient;
use crate::sync::SyncWorker;

/// Online/offline flag shared by the facade, the monitor loop and the sync
/// worker. A single atomic word; no lock needed to read it.
#[derive(Debug)]
pub struct ConnectionState {
    online: AtomicBool,
}

impl ConnectionState {
    pub fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
        }
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Returns the previous state so callers can detect transitions.
    pub fn set_online(&self, online: bool) -> bool {
        self.online.swap(online, Ordering::AcqRel)
    }
}

/// Spawn the probe loop: ping at a fixed interval, flip the shared state on
/// transitions, and wake the sync worker on recovery. While online with a
/// non-empty queue the tick also re-triggers the worker, which is what
/// retries batches the server rejected earlier.
pub fn spawn(
    api: Arc<ApiClient>,
    conn: Arc<ConnectionState>,
    worker: Arc<SyncWorker>,
    events: EventBus,
    interval: Duration,
    session: Uuid,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        // The facade already probed during construction; the first periodic
        // probe waits one full interval so it cannot race a manual override
        // issued right after startup.
        let start = tokio::time::Instant::now() + interval;
        let mut ticker = tokio::time::interval_at(start, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let was_online = conn.is_online();
            let online = api.ping().await.is_ok();
            conn.set_online(online);

            if online != was_online {
                tracing::info!(
                    "CLIENT {session}: connection {}",
                    if online { "restored" } else { "lost" }
                );
                events.emit(ClientEvent::ConnectionChanged { online });
            }

            if online && worker.has_pending().await {
                worker.trigger();
            }
        }
    })
}
