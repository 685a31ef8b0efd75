use std::path::PathBuf;
use std::time::Duration;

/// HTTP transport settings, passed explicitly into the client constructor.
/// Proxy selection lives here rather than in process-wide environment
/// state; the lifecycle is tied to the application's startup.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: String,
    /// Sent as a `Bearer` token when present.
    pub api_key: Option<String>,
    pub proxy: Option<String>,
    /// Per-request timeout. A timeout is treated as a transport failure.
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/v1".to_string(),
            api_key: None,
            proxy: None,
            timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub transport: TransportConfig,
    /// Where the `{tasks, operations}` blob lives on disk.
    pub store_path: PathBuf,
    /// Fixed connectivity probe interval.
    pub probe_interval: Duration,
    /// Delay between consecutive sync passes when the queue is non-empty.
    pub retry_delay: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            store_path: PathBuf::from("local_tasks.json"),
            probe_interval: Duration::from_secs(30),
            retry_delay: Duration::from_secs(1),
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, store_path: impl Into<PathBuf>) -> Self {
        Self {
            transport: TransportConfig {
                base_url: base_url.into(),
                ..TransportConfig::default()
            },
            store_path: store_path.into(),
            ..Self::default()
        }
    }
}
