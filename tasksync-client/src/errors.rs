use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    /// Timeout, connection refused, DNS failure. Recovered locally by
    /// flipping to offline and retaining the queue; never data loss.
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// The server answered but rejected the request. The operation stays
    /// queued for retry.
    #[error("server rejected request ({status}): {body}")]
    Server { status: u16, body: String },

    #[error("local persistence error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("invalid transport configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Server {
                status: status.as_u16(),
                body: err.to_string(),
            },
            None => Self::Transport(err),
        }
    }
}

impl ClientError {
    /// True for failures that mean the server is unreachable, as opposed to
    /// reachable-but-rejecting.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
