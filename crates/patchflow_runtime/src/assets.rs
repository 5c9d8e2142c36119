// SPDX-License-Identifier: MIT OR Apache-2.0
//! Asynchronous media loading for nodes that must never block a tick.
//!
//! A node asks the [`AssetTracker`] for a handle every tick. The first
//! request spawns the load on a tokio runtime and reports
//! [`AssetStatus::Loading`]; finished loads are collected by
//! [`AssetTracker::update`], which the host calls between ticks. From then
//! on the node sees [`AssetStatus::Ready`].
//!
//! Temporary handles created while decoding (the equivalent of blob URLs)
//! are [`ScopedUrl`]s, released from their [`UrlRegistry`] when dropped.

use futures::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use patchflow_graph::MediaHandle;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// Errors that can occur while loading an asset
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetError {
    /// Nothing exists behind the handle
    #[error("Asset not found: {0}")]
    NotFound(String),
    /// The asset exists but cannot be decoded
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

/// Future returned by an [`AssetSource`]
pub type AssetFuture = BoxFuture<'static, Result<MediaResource, AssetError>>;

/// Resolves media handles to loaded resources
pub trait AssetSource: Send + Sync {
    /// Start loading a handle. The future runs on the tracker's runtime.
    fn load(&self, handle: MediaHandle, urls: UrlRegistry) -> AssetFuture;
}

/// A loaded media resource
#[derive(Debug)]
pub struct MediaResource {
    /// Handle the resource was loaded for
    pub handle: MediaHandle,
    /// Raw bytes
    pub bytes: Vec<u8>,
    /// MIME type, when the source knows it
    pub mime: Option<String>,
    /// Temporary URL, released when the resource is dropped
    pub url: Option<ScopedUrl>,
}

impl MediaResource {
    /// Create a resource without a temporary URL
    pub fn new(handle: MediaHandle, bytes: Vec<u8>) -> Self {
        Self {
            handle,
            bytes,
            mime: None,
            url: None,
        }
    }

    /// Attach a MIME type
    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }

    /// Attach a temporary URL
    pub fn with_url(mut self, url: ScopedUrl) -> Self {
        self.url = Some(url);
        self
    }
}

/// Load state of one handle
#[derive(Debug, Clone)]
pub enum AssetStatus {
    /// Load in flight
    Loading,
    /// Loaded
    Ready(Arc<MediaResource>),
    /// Load failed; sticks until the handle is released
    Failed(AssetError),
}

impl AssetStatus {
    /// Whether the resource is ready
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Whether a load is in flight
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }
}

#[derive(Debug, Default)]
struct UrlState {
    next: u64,
    live: HashSet<String>,
}

/// Issues and tracks temporary URLs
#[derive(Debug, Clone, Default)]
pub struct UrlRegistry {
    state: Arc<Mutex<UrlState>>,
}

impl UrlRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a URL for a handle. It stays live until the guard is dropped.
    pub fn create(&self, handle: &MediaHandle) -> ScopedUrl {
        let mut state = self.state.lock();
        state.next += 1;
        let url = format!("patchflow-media://{}/{}", state.next, handle);
        state.live.insert(url.clone());
        ScopedUrl {
            url,
            registry: Arc::downgrade(&self.state),
        }
    }

    /// Whether a URL has not been released yet
    pub fn is_live(&self, url: &str) -> bool {
        self.state.lock().live.contains(url)
    }

    /// Number of URLs not yet released
    pub fn live_count(&self) -> usize {
        self.state.lock().live.len()
    }
}

/// A temporary URL, released on drop
pub struct ScopedUrl {
    url: String,
    registry: Weak<Mutex<UrlState>>,
}

impl ScopedUrl {
    /// The URL
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl Drop for ScopedUrl {
    fn drop(&mut self) {
        if let Some(state) = self.registry.upgrade() {
            state.lock().live.remove(&self.url);
        }
    }
}

impl fmt::Debug for ScopedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ScopedUrl").field(&self.url).finish()
    }
}

impl fmt::Display for ScopedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

struct Entry {
    status: AssetStatus,
    /// Distinguishes a load from an earlier one for the same handle that
    /// was released while in flight
    generation: u64,
}

type LoadResult = (MediaHandle, u64, Result<MediaResource, AssetError>);

/// Tracks asynchronous loads by handle
pub struct AssetTracker {
    runtime: Handle,
    source: Arc<dyn AssetSource>,
    urls: UrlRegistry,
    /// Load state per handle
    states: RwLock<HashMap<MediaHandle, Entry>>,
    next_generation: Mutex<u64>,
    /// Channel for sending finished loads
    result_tx: mpsc::UnboundedSender<LoadResult>,
    /// Channel for receiving finished loads
    result_rx: Mutex<mpsc::UnboundedReceiver<LoadResult>>,
}

impl AssetTracker {
    /// Create a tracker that spawns loads on `runtime`
    pub fn new(runtime: Handle, source: Arc<dyn AssetSource>) -> Self {
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        Self {
            runtime,
            source,
            urls: UrlRegistry::new(),
            states: RwLock::new(HashMap::new()),
            next_generation: Mutex::new(0),
            result_tx,
            result_rx: Mutex::new(result_rx),
        }
    }

    /// Registry for temporary URLs created by loads
    pub fn urls(&self) -> &UrlRegistry {
        &self.urls
    }

    /// Current status of a handle, starting a load if none is known.
    ///
    /// Never blocks.
    pub fn request(&self, handle: &MediaHandle) -> AssetStatus {
        let mut states = self.states.write();
        if let Some(entry) = states.get(handle) {
            return entry.status.clone();
        }

        let generation = {
            let mut next = self.next_generation.lock();
            *next += 1;
            *next
        };
        states.insert(
            handle.clone(),
            Entry {
                status: AssetStatus::Loading,
                generation,
            },
        );
        drop(states);

        tracing::debug!("Loading asset {handle}");
        let load = self.source.load(handle.clone(), self.urls.clone());
        let result_tx = self.result_tx.clone();
        let handle = handle.clone();
        self.runtime.spawn(async move {
            let result = load.await;
            // The tracker may be gone by now
            let _ = result_tx.send((handle, generation, result));
        });
        AssetStatus::Loading
    }

    /// Status of a handle without starting a load
    pub fn status(&self, handle: &MediaHandle) -> Option<AssetStatus> {
        self.states.read().get(handle).map(|e| e.status.clone())
    }

    /// The loaded resource, if ready
    pub fn resource(&self, handle: &MediaHandle) -> Option<Arc<MediaResource>> {
        match self.status(handle)? {
            AssetStatus::Ready(resource) => Some(resource),
            _ => None,
        }
    }

    /// Collect finished loads. Call between ticks; returns how many
    /// handles changed state.
    pub fn update(&self) -> usize {
        let mut finished = Vec::new();
        {
            let mut result_rx = self.result_rx.lock();
            while let Ok(result) = result_rx.try_recv() {
                finished.push(result);
            }
        }
        if finished.is_empty() {
            return 0;
        }

        let mut states = self.states.write();
        let mut applied = 0;
        for (handle, generation, result) in finished {
            let Some(entry) = states.get_mut(&handle) else {
                tracing::debug!("Discarding load of released asset {handle}");
                continue;
            };
            if entry.generation != generation {
                continue;
            }
            entry.status = match result {
                Ok(resource) => AssetStatus::Ready(Arc::new(resource)),
                Err(err) => {
                    tracing::warn!("Failed to load asset {handle}: {err}");
                    AssetStatus::Failed(err)
                }
            };
            applied += 1;
        }
        applied
    }

    /// Forget a handle. Its resource, and any temporary URL, is freed once
    /// the last holder drops it. A load still in flight is discarded.
    pub fn release(&self, handle: &MediaHandle) -> bool {
        self.states.write().remove(handle).is_some()
    }

    /// Forget every handle
    pub fn clear(&self) {
        self.states.write().clear();
    }

    /// Number of tracked handles
    pub fn len(&self) -> usize {
        self.states.read().len()
    }

    /// Whether no handle is tracked
    pub fn is_empty(&self) -> bool {
        self.states.read().is_empty()
    }
}

impl fmt::Debug for AssetTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetTracker")
            .field("tracked", &self.len())
            .field("live_urls", &self.urls.live_count())
            .finish()
    }
}
