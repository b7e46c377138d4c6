use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;

use crate::error::GalleryError;

/// Fetches the raw body behind a URL.
#[async_trait]
pub trait ImageTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<Bytes, GalleryError>;
}

pub type SharedTransport = Arc<dyn ImageTransport>;

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn shared(self) -> SharedTransport {
        Arc::new(self)
    }
}

#[async_trait]
impl ImageTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Bytes, GalleryError> {
        let response = self.client.get(url).timeout(self.timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GalleryError::Status {
                url: url.to_owned(),
                status: status.as_u16(),
            });
        }
        Ok(response.bytes().await?)
    }
}
