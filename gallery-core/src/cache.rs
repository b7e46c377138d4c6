use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

use bytes::Bytes;
use tracing::debug;

/// URL-keyed store of raw image bytes.
///
/// Implementations must be safe to read from the UI thread while a runtime
/// worker writes a freshly fetched image. Reads never block on I/O.
pub trait ImageDataCache: Send + Sync {
    fn data(&self, url: &str) -> Option<Bytes>;

    /// Stores `bytes` for `url`. Storing `None` leaves the cache untouched.
    fn set(&self, bytes: Option<Bytes>, url: &str);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, url: &str) -> bool {
        self.data(url).is_some()
    }
}

pub type SharedImageCache = Arc<dyn ImageDataCache>;

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<String, Bytes>,
    // insertion order, only maintained when a capacity is set
    order: VecDeque<String>,
}

/// In-memory cache backed by a `HashMap`. Unbounded unless built with
/// [`DictionaryImageDataCache::bounded`].
#[derive(Debug, Clone, Default)]
pub struct DictionaryImageDataCache {
    inner: Arc<RwLock<Entries>>,
    capacity: Option<usize>,
}

impl DictionaryImageDataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `capacity` images, dropping the oldest inserted URL first.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Entries::default())),
            capacity: Some(capacity.max(1)),
        }
    }

    pub fn with_capacity(capacity: Option<usize>) -> Self {
        match capacity {
            Some(limit) => Self::bounded(limit),
            None => Self::new(),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn shared(self) -> SharedImageCache {
        Arc::new(self)
    }
}

impl ImageDataCache for DictionaryImageDataCache {
    fn data(&self, url: &str) -> Option<Bytes> {
        let entries = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        entries.map.get(url).cloned()
    }

    fn set(&self, bytes: Option<Bytes>, url: &str) {
        let Some(bytes) = bytes else {
            return;
        };
        let mut entries = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let is_new = entries.map.insert(url.to_owned(), bytes).is_none();

        if let (Some(limit), true) = (self.capacity, is_new) {
            entries.order.push_back(url.to_owned());
            while entries.map.len() > limit {
                let Some(oldest) = entries.order.pop_front() else {
                    break;
                };
                entries.map.remove(&oldest);
                debug!(url = %oldest, "evicted image from bounded cache");
            }
        }
    }

    fn len(&self) -> usize {
        let entries = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        entries.map.len()
    }
}
