use thiserror::Error;

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected status {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("article list decoding error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("payload at {url} is not a recognised image")]
    InvalidImage { url: String },
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("event channel closed unexpectedly")]
    EventChannelClosed,
}
