//! Binding of one [`Article`] to the state a list cell renders.
//!
//! A presenter is a reusable slot: [`ArticlePresenter::bind`] swaps the
//! article it shows, and every image request issued for the previous article
//! is invalidated before the new ones start. Each binding carries a
//! generation number; image tasks check it under the state lock before
//! writing, so a late response for a recycled slot is discarded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::Bytes;
use tokio::sync::broadcast;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::article::Article;
use crate::coordinator::FetchCoordinator;

const EVENT_CAPACITY: usize = 16;
pub const DISPLAY_DATE_FORMAT: &str = "%-d %B, %Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageSlot {
    Article,
    Author,
}

impl ImageSlot {
    pub const ALL: [ImageSlot; 2] = [ImageSlot::Article, ImageSlot::Author];

    pub fn url(self, article: &Article) -> &str {
        match self {
            ImageSlot::Article => &article.image_url,
            ImageSlot::Author => article.author_image_url(),
        }
    }

    fn index(self) -> usize {
        match self {
            ImageSlot::Article => 0,
            ImageSlot::Author => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenterEvent {
    /// An image arrived asynchronously. `animated` asks the view to cross-fade.
    ImageLoaded { slot: ImageSlot, animated: bool },
    /// The slot now shows a different article; images were cleared.
    Rebound { article_id: String },
}

/// Text and glyph selection for one article card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleDisplay {
    pub title: String,
    pub category: String,
    pub author_name: String,
    pub date: String,
    pub likes: String,
    pub saved_glyph: &'static str,
    pub liked_glyph: &'static str,
}

impl ArticleDisplay {
    pub fn from_article(article: &Article) -> Self {
        Self {
            title: article.title.clone(),
            category: article.category.to_uppercase(),
            author_name: article.author.name.clone(),
            date: article
                .meta_data
                .creation_time
                .format(DISPLAY_DATE_FORMAT)
                .to_string(),
            likes: article.likes_count.to_string(),
            saved_glyph: if article.is_saved { "saved" } else { "save" },
            liked_glyph: if article.is_liked { "liked" } else { "like" },
        }
    }
}

struct BindingState {
    article: Article,
    bound: bool,
    generation: u64,
    images: [Option<Bytes>; 2],
    in_flight: [bool; 2],
}

impl BindingState {
    fn invalidate(&mut self) {
        self.generation += 1;
        self.images = [None, None];
        self.in_flight = [false, false];
    }
}

fn lock(state: &Mutex<BindingState>) -> MutexGuard<'_, BindingState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct ArticlePresenter {
    coordinator: FetchCoordinator,
    state: Arc<Mutex<BindingState>>,
    tasks: Vec<AbortHandle>,
    events: broadcast::Sender<PresenterEvent>,
}

impl ArticlePresenter {
    /// Binds `article` right away. Cached images are visible as soon as this
    /// returns; the others are requested through `coordinator`.
    pub fn new(article: Article, coordinator: FetchCoordinator) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let mut presenter = Self {
            coordinator,
            state: Arc::new(Mutex::new(BindingState {
                article,
                bound: true,
                generation: 0,
                images: [None, None],
                in_flight: [false, false],
            })),
            tasks: Vec::new(),
            events,
        };
        presenter.start_binding();
        presenter
    }

    /// Rebinds the slot to `article`. Binding an article equal to the current
    /// one keeps the existing state and requests.
    pub fn bind(&mut self, article: Article) {
        {
            let mut state = lock(&self.state);
            if state.bound && state.article == article {
                return;
            }
            state.invalidate();
            for task in self.tasks.drain(..) {
                task.abort();
            }
            debug!(from = %state.article.id, to = %article.id, "rebinding article presenter");
            let article_id = article.id.clone();
            state.article = article;
            state.bound = true;
            let _ = self.events.send(PresenterEvent::Rebound { article_id });
        }
        self.start_binding();
    }

    /// Drops the images and cancels outstanding requests, leaving the slot
    /// ready for reuse.
    pub fn unbind(&mut self) {
        let mut state = lock(&self.state);
        state.invalidate();
        state.bound = false;
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PresenterEvent> {
        self.events.subscribe()
    }

    pub fn article(&self) -> Article {
        lock(&self.state).article.clone()
    }

    pub fn article_id(&self) -> String {
        lock(&self.state).article.id.clone()
    }

    pub fn is_bound(&self) -> bool {
        lock(&self.state).bound
    }

    pub fn display(&self) -> ArticleDisplay {
        ArticleDisplay::from_article(&lock(&self.state).article)
    }

    pub fn image(&self, slot: ImageSlot) -> Option<Bytes> {
        lock(&self.state).images[slot.index()].clone()
    }

    pub fn article_image(&self) -> Option<Bytes> {
        self.image(ImageSlot::Article)
    }

    pub fn author_image(&self) -> Option<Bytes> {
        self.image(ImageSlot::Author)
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.state).in_flight.iter().any(|loading| *loading)
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    fn start_binding(&mut self) {
        let mut state = lock(&self.state);
        let generation = state.generation;

        for slot in ImageSlot::ALL {
            let handle = self.coordinator.fetch(slot.url(&state.article));
            if handle.is_ready() {
                state.images[slot.index()] = handle.cached();
                continue;
            }

            state.in_flight[slot.index()] = true;
            let shared = self.state.clone();
            let events = self.events.clone();
            let task = self.coordinator.runtime().spawn(async move {
                let bytes = handle.await;
                let mut state = lock(&shared);
                if state.generation != generation {
                    return;
                }
                state.in_flight[slot.index()] = false;
                if let Some(bytes) = bytes {
                    state.images[slot.index()] = Some(bytes);
                    let _ = events.send(PresenterEvent::ImageLoaded {
                        slot,
                        animated: slot == ImageSlot::Article,
                    });
                }
            });
            self.tasks.push(task.abort_handle());
        }
    }
}

impl Drop for ArticlePresenter {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}
