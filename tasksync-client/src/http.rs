//! REST transport for the remote task service.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Response;
use tasksync_core::models::{PendingOperation, Task};
use tasksync_core::protocol::{BatchRequest, BatchResponse, TaskFilter, TaskListResponse};

use crate::config::TransportConfig;
use crate::errors::{ClientError, ClientResult};

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &TransportConfig) -> ClientResult<Self> {
        let mut builder = reqwest::Client::builder().timeout(config.timeout);

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|err| ClientError::Config(format!("bad proxy url: {err}")))?;
            builder = builder.proxy(proxy);
        }

        if let Some(key) = &config.api_key {
            let mut headers = HeaderMap::new();
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|err| ClientError::Config(format!("bad api key: {err}")))?;
            headers.insert(AUTHORIZATION, value);
            builder = builder.default_headers(headers);
        }

        let http = builder
            .build()
            .map_err(|err| ClientError::Config(err.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Liveness probe. Success means online; any failure means offline.
    pub async fn ping(&self) -> ClientResult<()> {
        let response = self.http.get(self.url("ping")).send().await?;
        check(response).await?;
        Ok(())
    }

    pub async fn fetch_tasks(&self, filter: &TaskFilter) -> ClientResult<Vec<Task>> {
        let response = self
            .http
            .get(self.url("tasks"))
            .query(&filter.to_query())
            .send()
            .await?;
        let response = check(response).await?;
        let body: TaskListResponse = response.json().await?;
        Ok(body.tasks)
    }

    /// Send one queue drain as a single atomic request.
    pub async fn send_batch(&self, ops: &[PendingOperation]) -> ClientResult<BatchResponse> {
        let request = BatchRequest::from_queue(ops);
        let response = self
            .http
            .post(self.url("tasks/batch"))
            .json(&request)
            .send()
            .await?;
        let response = check(response).await?;
        Ok(response.json().await?)
    }
}

async fn check(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::Server {
            status: status.as_u16(),
            body,
        })
    }
}
