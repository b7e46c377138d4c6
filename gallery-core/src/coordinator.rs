//! Cache-first image fetching with at most one request in flight per URL.
//!
//! A [`FetchCoordinator`] answers from the [`ImageDataCache`] when it can and
//! otherwise spawns a transport request on its runtime. Callers asking for a
//! URL that is already being fetched join the pending request instead of
//! issuing another one. Every caller holds a [`FetchHandle`]; dropping it
//! withdraws interest, and once the last handle for a request is gone the
//! request task is aborted.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use bytes::Bytes;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::debug;

use crate::cache::SharedImageCache;
use crate::config::ImageConfig;
use crate::error::GalleryError;
use crate::transport::SharedTransport;

#[derive(Debug, Clone, Copy)]
pub struct CoordinatorOptions {
    pub deduplicate: bool,
    pub validate_images: bool,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            deduplicate: true,
            validate_images: true,
        }
    }
}

impl From<&ImageConfig> for CoordinatorOptions {
    fn from(config: &ImageConfig) -> Self {
        Self {
            deduplicate: config.deduplicate,
            validate_images: config.validate_images,
        }
    }
}

type Waiter = oneshot::Sender<Option<Bytes>>;

struct PendingFetch {
    url: String,
    waiters: HashMap<u64, Waiter>,
    abort: Option<AbortHandle>,
}

#[derive(Default)]
struct Registry {
    fetches: HashMap<u64, PendingFetch>,
    // only populated when de-duplicating
    by_url: HashMap<String, u64>,
    next_id: u64,
}

impl Registry {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn remove(&mut self, fetch_id: u64) -> Option<PendingFetch> {
        let pending = self.fetches.remove(&fetch_id)?;
        if self.by_url.get(&pending.url) == Some(&fetch_id) {
            self.by_url.remove(&pending.url);
        }
        Some(pending)
    }
}

struct Inner {
    cache: Option<SharedImageCache>,
    transport: SharedTransport,
    options: CoordinatorOptions,
    registry: Mutex<Registry>,
    runtime: Handle,
}

impl Inner {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Clone)]
pub struct FetchCoordinator {
    inner: Arc<Inner>,
}

impl fmt::Debug for FetchCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchCoordinator")
            .field("options", &self.inner.options)
            .field("cached", &self.inner.cache.as_ref().map(|cache| cache.len()))
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl FetchCoordinator {
    /// Request tasks are spawned on `runtime`. Without a cache every call goes
    /// to the transport, though concurrent callers are still de-duplicated.
    pub fn new(
        transport: SharedTransport,
        cache: Option<SharedImageCache>,
        options: CoordinatorOptions,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cache,
                transport,
                options,
                registry: Mutex::new(Registry::default()),
                runtime,
            }),
        }
    }

    pub fn cache(&self) -> Option<&SharedImageCache> {
        self.inner.cache.as_ref()
    }

    pub fn options(&self) -> CoordinatorOptions {
        self.inner.options
    }

    pub fn runtime(&self) -> &Handle {
        &self.inner.runtime
    }

    /// Synchronous cache lookup.
    pub fn cached(&self, url: &str) -> Option<Bytes> {
        self.inner.cache.as_ref().and_then(|cache| cache.data(url))
    }

    /// Number of requests currently in flight.
    pub fn pending_count(&self) -> usize {
        self.inner.registry().fetches.len()
    }

    pub fn fetch(&self, url: &str) -> FetchHandle {
        // Completed requests write the cache before leaving the registry, so a
        // lookup under the registry lock either hits or finds them pending.
        let mut registry = self.inner.registry();
        if let Some(bytes) = self.cached(url) {
            debug!(%url, "image cache hit");
            return FetchHandle::ready(Some(bytes));
        }

        let (tx, rx) = oneshot::channel();
        let waiter = registry.next_id();

        if self.inner.options.deduplicate {
            if let Some(&fetch_id) = registry.by_url.get(url) {
                if let Some(pending) = registry.fetches.get_mut(&fetch_id) {
                    pending.waiters.insert(waiter, tx);
                    debug!(%url, waiters = pending.waiters.len(), "joined in-flight image fetch");
                    return FetchHandle::waiting(rx, self.ticket(fetch_id, waiter));
                }
            }
        }

        let fetch_id = registry.next_id();
        registry.fetches.insert(
            fetch_id,
            PendingFetch {
                url: url.to_owned(),
                waiters: HashMap::from([(waiter, tx)]),
                abort: None,
            },
        );
        if self.inner.options.deduplicate {
            registry.by_url.insert(url.to_owned(), fetch_id);
        }

        debug!(%url, "dispatching image fetch");
        // The task cannot finish before `abort` is recorded: completion needs
        // the registry lock held here.
        let task = self
            .inner
            .runtime
            .spawn(run_fetch(self.inner.clone(), fetch_id, url.to_owned()));
        if let Some(pending) = registry.fetches.get_mut(&fetch_id) {
            pending.abort = Some(task.abort_handle());
        }

        FetchHandle::waiting(rx, self.ticket(fetch_id, waiter))
    }

    fn ticket(&self, fetch_id: u64, waiter: u64) -> Ticket {
        Ticket {
            inner: self.inner.clone(),
            fetch_id,
            waiter,
        }
    }
}

async fn run_fetch(inner: Arc<Inner>, fetch_id: u64, url: String) {
    let result = match download(&inner, &url).await {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            debug!(%url, error = %err, "image fetch failed");
            None
        }
    };

    if let (Some(cache), Some(bytes)) = (&inner.cache, &result) {
        cache.set(Some(bytes.clone()), &url);
    }

    let pending = inner.registry().remove(fetch_id);
    if let Some(pending) = pending {
        for (_, waiter) in pending.waiters {
            // receiver may already be gone
            let _ = waiter.send(result.clone());
        }
    }
}

async fn download(inner: &Inner, url: &str) -> Result<Bytes, GalleryError> {
    let bytes = inner.transport.get(url).await?;
    if inner.options.validate_images && image::guess_format(&bytes).is_err() {
        return Err(GalleryError::InvalidImage {
            url: url.to_owned(),
        });
    }
    Ok(bytes)
}

/// Interest of one caller in one pending request.
struct Ticket {
    inner: Arc<Inner>,
    fetch_id: u64,
    waiter: u64,
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let mut registry = self.inner.registry();
        let Some(pending) = registry.fetches.get_mut(&self.fetch_id) else {
            return;
        };
        pending.waiters.remove(&self.waiter);
        if !pending.waiters.is_empty() {
            return;
        }
        if let Some(pending) = registry.remove(self.fetch_id) {
            debug!(url = %pending.url, "last waiter left, abandoning image fetch");
            if let Some(abort) = pending.abort {
                abort.abort();
            }
        }
    }
}

enum HandleState {
    Ready(Option<Bytes>),
    Waiting(oneshot::Receiver<Option<Bytes>>),
    Done,
}

/// Resolves to the image bytes, or `None` when the fetch failed.
///
/// Dropping an unresolved handle cancels this caller's interest.
#[must_use = "dropping a FetchHandle cancels the fetch"]
pub struct FetchHandle {
    state: HandleState,
    _ticket: Option<Ticket>,
}

impl FetchHandle {
    fn ready(bytes: Option<Bytes>) -> Self {
        Self {
            state: HandleState::Ready(bytes),
            _ticket: None,
        }
    }

    fn waiting(rx: oneshot::Receiver<Option<Bytes>>, ticket: Ticket) -> Self {
        Self {
            state: HandleState::Waiting(rx),
            _ticket: Some(ticket),
        }
    }

    /// True when the value was available without a request.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, HandleState::Ready(_))
    }

    pub fn cached(&self) -> Option<Bytes> {
        match &self.state {
            HandleState::Ready(bytes) => bytes.clone(),
            _ => None,
        }
    }
}

impl fmt::Debug for FetchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            HandleState::Ready(_) => "ready",
            HandleState::Waiting(_) => "waiting",
            HandleState::Done => "done",
        };
        f.debug_struct("FetchHandle").field("state", &state).finish()
    }
}

impl Future for FetchHandle {
    type Output = Option<Bytes>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match std::mem::replace(&mut this.state, HandleState::Done) {
            HandleState::Ready(bytes) => Poll::Ready(bytes),
            HandleState::Waiting(mut rx) => match Pin::new(&mut rx).poll(cx) {
                Poll::Ready(result) => Poll::Ready(result.ok().flatten()),
                Poll::Pending => {
                    this.state = HandleState::Waiting(rx);
                    Poll::Pending
                }
            },
            HandleState::Done => Poll::Ready(None),
        }
    }
}
