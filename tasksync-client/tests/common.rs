//! In-process mock of the remote task service, plus test plumbing.
#![allow(dead_code)]

use std::collections::HashMap;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use tokio::sync::oneshot;

use tasksync_client::{ClientConfig, TaskClient, TransportConfig};
use tasksync_core::models::{OperationKind, Task, TaskPatch};
use tasksync_core::protocol::{BatchRequest, BatchResponse, TaskListResponse};

pub const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Default)]
pub struct MockState {
    /// Every batch request received, in arrival order.
    pub batches: Vec<BatchRequest>,
    /// The server's view of the task table.
    pub tasks: Vec<Task>,
    next_id: u64,
    /// Answer batches with 500.
    pub reject_batches: bool,
    /// Answer batches with 200 but `success: false`.
    pub refuse_batches: bool,
}

type Shared = Arc<Mutex<MockState>>;

pub struct MockServer {
    pub addr: SocketAddr,
    pub state: Shared,
    stop: Mutex<Option<oneshot::Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl MockServer {
    pub async fn spawn() -> Self {
        Self::serve(std::net::TcpListener::bind("127.0.0.1:0").unwrap())
    }

    /// Bind a previously reserved address; used to bring a server "online"
    /// after a client already started against the dead port.
    pub async fn spawn_at(addr: SocketAddr) -> Self {
        Self::serve(std::net::TcpListener::bind(addr).unwrap())
    }

    /// The server runs on its own single-thread runtime so that tearing the
    /// runtime down closes established connections too, not just the accept
    /// loop. A plain task abort would leave reqwest's pooled keep-alive
    /// connections serving requests past `shutdown`.
    fn serve(listener: std::net::TcpListener) -> Self {
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();
        let state: Shared = Arc::default();

        let app = Router::new()
            .route("/ping", get(ping))
            .route("/tasks", get(list_tasks))
            .route("/tasks/batch", post(batch))
            .with_state(state.clone());

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let thread = std::thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                tokio::select! {
                    _ = axum::serve(listener, app).into_future() => {}
                    _ = stop_rx => {}
                }
            });
            // Dropping the runtime here kills every per-connection task and
            // closes its socket.
        });

        Self {
            addr,
            state,
            stop: Mutex::new(Some(stop_tx)),
            thread: Mutex::new(Some(thread)),
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Simulate the server going away: sever the listener and every
    /// established connection, and return only once the sockets are closed.
    pub fn shutdown(&self) {
        if let Some(stop) = self.stop.lock().unwrap().take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.lock().unwrap().take() {
            let _ = thread.join();
        }
    }

    pub fn batches(&self) -> Vec<BatchRequest> {
        self.state.lock().unwrap().batches.clone()
    }

    pub fn task(&self, id: &str) -> Option<Task> {
        let state = self.state.lock().unwrap();
        state.tasks.iter().find(|t| t.id == id).cloned()
    }

    pub fn set_reject_batches(&self, reject: bool) {
        self.state.lock().unwrap().reject_batches = reject;
    }

    pub fn set_refuse_batches(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_batches = refuse;
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn ping() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn list_tasks(State(state): State<Shared>) -> Json<TaskListResponse> {
    let state = state.lock().unwrap();
    Json(TaskListResponse {
        tasks: state.tasks.clone(),
    })
}

async fn batch(State(state): State<Shared>, Json(request): Json<BatchRequest>) -> Response {
    let mut state = state.lock().unwrap();

    if state.reject_batches {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if state.refuse_batches {
        state.batches.push(request);
        return Json(BatchResponse {
            success: false,
            id_mapping: HashMap::new(),
        })
        .into_response();
    }

    let mut id_mapping = HashMap::new();
    for op in &request.operations {
        match op.kind {
            OperationKind::Create => {
                if let (Some(temp_id), Ok(mut task)) = (
                    op.temp_id.clone(),
                    serde_json::from_value::<Task>(op.data.clone()),
                ) {
                    state.next_id += 1;
                    let permanent = format!("perm-{}", state.next_id);
                    task.id = permanent.clone();
                    state.tasks.push(task);
                    id_mapping.insert(temp_id, permanent);
                }
            }
            OperationKind::Update => {
                if let (Some(id), Ok(patch)) = (
                    op.id.clone(),
                    serde_json::from_value::<TaskPatch>(op.data.clone()),
                ) {
                    // Row-level misses are skipped; the batch still succeeds.
                    if let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) {
                        task.apply_patch(&patch, Utc::now());
                    }
                }
            }
            OperationKind::Delete => {
                if let Some(id) = op.id.clone() {
                    if let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) {
                        task.deleted = true;
                    }
                }
            }
        }
    }

    state.batches.push(request);
    Json(BatchResponse {
        success: true,
        id_mapping,
    })
    .into_response()
}

/// Grab an ephemeral port and release it, so a client can start against a
/// dead address the test later brings a server up on.
pub async fn reserve_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Short intervals so tests exercise probe and retry cycles quickly.
pub fn test_config(base_url: String, dir: &Path) -> ClientConfig {
    ClientConfig {
        transport: TransportConfig {
            base_url,
            api_key: Some("test-token".to_string()),
            proxy: None,
            timeout: Duration::from_secs(1),
        },
        store_path: dir.join("tasks.json"),
        probe_interval: Duration::from_millis(100),
        retry_delay: Duration::from_millis(25),
    }
}

/// Poll until the pending queue empties or the timeout expires.
pub async fn wait_for_drain(client: &TaskClient) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if client.status().await.pending_count == 0 {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    false
}
