use reqwest::Client;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::article::{Article, ArticleList};
use crate::config::FeedConfig;
use crate::error::GalleryError;

#[derive(Debug, Clone)]
pub enum Event {
    ArticlesLoaded(Vec<Article>),
}

#[derive(Debug, Clone)]
pub struct ArticleFeedClient {
    client: Client,
    config: FeedConfig,
}

impl ArticleFeedClient {
    pub fn new(client: Client, config: FeedConfig) -> Self {
        Self { client, config }
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub async fn fetch_articles(&self) -> Result<Vec<Article>, GalleryError> {
        let response = self
            .client
            .get(&self.config.endpoint)
            .timeout(self.config.request_timeout())
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GalleryError::Status {
                url: self.config.endpoint.clone(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await?;
        let list: ArticleList = serde_json::from_slice(&bytes)?;
        debug!(count = list.data.len(), "decoded article list");
        Ok(list.data)
    }

    /// Like [`fetch_articles`](Self::fetch_articles), but any failure yields
    /// an empty list so the view falls back to its empty state.
    pub async fn load_articles(&self) -> Vec<Article> {
        match self.fetch_articles().await {
            Ok(articles) => articles,
            Err(err) => {
                warn!(endpoint = %self.config.endpoint, error = %err, "failed to load articles");
                Vec::new()
            }
        }
    }
}

pub struct LoaderHandle {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl LoaderHandle {
    pub async fn stop(self) -> Result<(), GalleryError> {
        let _ = self.cancel_tx.send(());
        self.join.await.map_err(GalleryError::from)
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Loads the article list in the background and sends it on `update_tx`.
/// With a refresh interval configured the list is reloaded on every tick,
/// otherwise the task ends after the first load.
pub fn spawn_article_loader(
    client: Client,
    config: FeedConfig,
    update_tx: mpsc::Sender<Event>,
) -> LoaderHandle {
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
    let refresh = config.refresh_interval();
    let feed = ArticleFeedClient::new(client, config);

    let join = tokio::spawn(async move {
        let Some(interval) = refresh else {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    info!("article loader shutdown requested");
                }
                articles = feed.load_articles() => {
                    if update_tx.send(Event::ArticlesLoaded(articles)).await.is_err() {
                        warn!("article receiver dropped");
                    }
                }
            }
            return;
        };

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    info!("article loader shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    let articles = feed.load_articles().await;
                    if update_tx.send(Event::ArticlesLoaded(articles)).await.is_err() {
                        warn!("article receiver dropped");
                        break;
                    }
                }
            }
        }
    });

    LoaderHandle { cancel_tx, join }
}
