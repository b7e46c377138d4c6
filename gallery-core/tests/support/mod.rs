#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use gallery_core::{Article, Author, Avatar, GalleryError, ImageTransport, MetaData};
use tokio::sync::Semaphore;

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Bytes that pass image sniffing, tagged so payloads stay distinguishable.
pub fn png(tag: &str) -> Bytes {
    let mut bytes = PNG_MAGIC.to_vec();
    bytes.extend_from_slice(tag.as_bytes());
    Bytes::from(bytes)
}

pub fn article(id: &str, image_url: &str, avatar_url: &str) -> Article {
    Article {
        id: id.to_owned(),
        title: format!("Article {id}"),
        author: Author {
            id: format!("author-{id}"),
            name: "Ana Lima".to_owned(),
            avatar: Avatar {
                image_url: avatar_url.to_owned(),
            },
        },
        category: "travel".to_owned(),
        image_url: image_url.to_owned(),
        likes_count: 12,
        is_saved: false,
        is_liked: true,
        meta_data: MetaData {
            creation_time: Utc.with_ymd_and_hms(2020, 10, 28, 9, 15, 0).unwrap(),
            update_time: Utc.with_ymd_and_hms(2020, 10, 29, 9, 15, 0).unwrap(),
        },
    }
}

/// Transport double: answers from a table, counts calls per URL and, when
/// gated, holds every response until the test releases that URL.
#[derive(Default)]
pub struct FakeTransport {
    responses: Mutex<HashMap<String, Option<Bytes>>>,
    calls: Mutex<HashMap<String, usize>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    gated: bool,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated() -> Self {
        Self {
            gated: true,
            ..Self::default()
        }
    }

    pub fn respond(self, url: &str, bytes: Bytes) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_owned(), Some(bytes));
        self
    }

    pub fn fail(self, url: &str) -> Self {
        self.responses.lock().unwrap().insert(url.to_owned(), None);
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    /// Lets up to `n` held requests for `url` complete.
    pub fn release(&self, url: &str, n: usize) {
        self.gate(url).add_permits(n);
    }

    pub async fn wait_for_calls(&self, url: &str, expected: usize) {
        wait_until(|| self.calls(url) >= expected).await;
    }

    fn gate(&self, url: &str) -> Arc<Semaphore> {
        self.gates
            .lock()
            .unwrap()
            .entry(url.to_owned())
            .or_insert_with(|| Arc::new(Semaphore::new(0)))
            .clone()
    }
}

#[async_trait]
impl ImageTransport for FakeTransport {
    async fn get(&self, url: &str) -> Result<Bytes, GalleryError> {
        *self.calls.lock().unwrap().entry(url.to_owned()).or_default() += 1;
        if self.gated {
            let gate = self.gate(url);
            gate.acquire().await.expect("gate closed").forget();
        }
        let response = self.responses.lock().unwrap().get(url).cloned();
        match response {
            Some(Some(bytes)) => Ok(bytes),
            _ => Err(GalleryError::Status {
                url: url.to_owned(),
                status: 500,
            }),
        }
    }
}

/// Polls `condition` for up to two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within two seconds"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
