//! Artwork Pipeline - Fetch, Decode, Coalesce and Cache Cover Art
//!
//! ## Overview
//!
//! [`ArtworkFetcher::request`] answers immediately when the artwork for a URI
//! is already decoded, and otherwise hands back a waiter for an asynchronous
//! completion:
//!
//! ```text
//! request(uri) ──► cache hit ─────────────► Ready(Arc<Artwork>)
//!      │
//!      ├─► fetch in flight for uri ───────► Pending(waiter on that fetch)
//!      │
//!      └─► start fetch, record in flight ─► Pending(waiter on new fetch)
//! ```
//!
//! At most one backend fetch per URI is outstanding. Every waiter attached to
//! it shares the same result: the same `Arc<Artwork>` on success, or the same
//! [`MetadataError::ArtworkUnavailable`] on failure. Failures are never
//! cached; the next request for that URI starts a new fetch.
//!
//! The lookup tables sit behind one short lock that is never held across an
//! await. Coalescing itself happens per URI through a shared future, so a
//! slow fetch for one URI never delays requests for another.
//!
//! ## Cancellation
//!
//! There is none. A fetch that became irrelevant (the listener skipped to the
//! next track) still completes and populates the cache; consumers decide
//! relevance by comparing URIs, not by arrival order.
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::artwork::{ArtworkFetcher, ArtworkRequest};
//!
//! match fetcher.request("https://cdn.example.com/covers/42.jpg") {
//!     ArtworkRequest::Ready(artwork) => show(artwork),
//!     ArtworkRequest::Pending(waiter) => {
//!         tokio::spawn(async move {
//!             if let Ok(artwork) = waiter.wait().await {
//!                 show(artwork);
//!             }
//!         });
//!     }
//! }
//! ```

use crate::error::{MetadataError, Result};
use bridge_traits::ArtworkBackend;
use bytes::Bytes;
use core_runtime::logging::redact_uri;
use futures::future::{BoxFuture, FutureExt, Shared};
use image::DynamicImage;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome delivered to every waiter of a fetch.
pub type ArtworkResult = Result<Arc<Artwork>>;

type SharedFetch = Shared<BoxFuture<'static, ArtworkResult>>;

/// Decoded cover art.
#[derive(Clone)]
pub struct Artwork {
    pub uri: String,
    pub width: u32,
    pub height: u32,
    /// Average colour as hex (e.g., "#FF5733")
    pub dominant_color: String,
    image: DynamicImage,
}

impl Artwork {
    /// Decode encoded image bytes, downscaling to fit `max_dimension`.
    pub fn decode(uri: &str, data: &[u8], max_dimension: Option<u32>) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|e| MetadataError::unavailable(uri, format!("decode failed: {}", e)))?;

        let img = resize_to_fit(img, max_dimension);
        let dominant_color = extract_dominant_color(&img);

        Ok(Self {
            uri: uri.to_string(),
            width: img.width(),
            height: img.height(),
            dominant_color,
            image: img,
        })
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Pixels as tightly packed RGBA8, row-major.
    pub fn to_rgba_bytes(&self) -> Bytes {
        Bytes::from(self.image.to_rgba8().into_raw())
    }
}

impl fmt::Debug for Artwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artwork")
            .field("uri", &redact_uri(&self.uri))
            .field("width", &self.width)
            .field("height", &self.height)
            .field("dominant_color", &self.dominant_color)
            .finish()
    }
}

/// Result of [`ArtworkFetcher::request`].
pub enum ArtworkRequest {
    /// Already decoded and cached.
    Ready(Arc<Artwork>),
    /// Will complete once the in-flight fetch for this URI finishes.
    Pending(ArtworkWaiter),
}

impl fmt::Debug for ArtworkRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtworkRequest::Ready(artwork) => f.debug_tuple("Ready").field(artwork).finish(),
            ArtworkRequest::Pending(waiter) => f.debug_tuple("Pending").field(waiter).finish(),
        }
    }
}

/// Handle on an in-flight fetch. Dropping it does not cancel the fetch.
pub struct ArtworkWaiter {
    uri: String,
    fetch: SharedFetch,
}

impl ArtworkWaiter {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub async fn wait(self) -> ArtworkResult {
        self.fetch.await
    }
}

impl fmt::Debug for ArtworkWaiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtworkWaiter")
            .field("uri", &redact_uri(&self.uri))
            .finish()
    }
}

struct FetcherState {
    cache: LruCache<String, Arc<Artwork>>,
    in_flight: HashMap<String, SharedFetch>,
}

/// Coalescing, caching artwork loader.
///
/// Cheap to clone; clones share cache and in-flight table.
#[derive(Clone)]
pub struct ArtworkFetcher {
    backend: Arc<dyn ArtworkBackend>,
    state: Arc<Mutex<FetcherState>>,
    max_dimension: Option<u32>,
    fetches_started: Arc<AtomicU64>,
}

impl ArtworkFetcher {
    /// Create a fetcher.
    ///
    /// * `capacity` - cache bound; `None` keeps every decoded artwork
    /// * `max_dimension` - decoded images are scaled down to fit this edge length
    pub fn new(
        backend: Arc<dyn ArtworkBackend>,
        capacity: Option<NonZeroUsize>,
        max_dimension: Option<u32>,
    ) -> Self {
        let cache = match capacity {
            Some(capacity) => LruCache::new(capacity),
            None => LruCache::unbounded(),
        };

        Self {
            backend,
            state: Arc::new(Mutex::new(FetcherState {
                cache,
                in_flight: HashMap::new(),
            })),
            max_dimension,
            fetches_started: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Look up or start fetching the artwork for `uri`.
    ///
    /// Must be called from within a Tokio runtime: a new fetch is driven by a
    /// spawned task so it completes even if every waiter is dropped.
    pub fn request(&self, uri: &str) -> ArtworkRequest {
        let mut state = self.state.lock();

        if let Some(artwork) = state.cache.get(uri) {
            return ArtworkRequest::Ready(Arc::clone(artwork));
        }

        if let Some(fetch) = state.in_flight.get(uri) {
            debug!(uri = %redact_uri(uri), "Attaching to in-flight artwork fetch");
            return ArtworkRequest::Pending(ArtworkWaiter {
                uri: uri.to_string(),
                fetch: fetch.clone(),
            });
        }

        let fetch = self.start_fetch(uri);
        state.in_flight.insert(uri.to_string(), fetch.clone());
        drop(state);

        tokio::spawn(fetch.clone().map(|_| ()));

        ArtworkRequest::Pending(ArtworkWaiter {
            uri: uri.to_string(),
            fetch,
        })
    }

    /// Resolve `uri` to decoded artwork, waiting if needed.
    pub async fn get(&self, uri: &str) -> ArtworkResult {
        match self.request(uri) {
            ArtworkRequest::Ready(artwork) => Ok(artwork),
            ArtworkRequest::Pending(waiter) => waiter.wait().await,
        }
    }

    /// Cached artwork only; never starts a fetch.
    pub fn cached(&self, uri: &str) -> Option<Arc<Artwork>> {
        self.state.lock().cache.peek(uri).cloned()
    }

    pub fn cache_len(&self) -> usize {
        self.state.lock().cache.len()
    }

    pub fn in_flight_len(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Number of backend fetches issued so far.
    pub fn fetches_started(&self) -> u64 {
        self.fetches_started.load(Ordering::Relaxed)
    }

    /// Drop decoded artwork. In-flight fetches are unaffected.
    pub fn clear_cache(&self) {
        self.state.lock().cache.clear();
    }

    fn start_fetch(&self, uri: &str) -> SharedFetch {
        self.fetches_started.fetch_add(1, Ordering::Relaxed);

        let uri = uri.to_string();
        let backend = Arc::clone(&self.backend);
        let state = Arc::clone(&self.state);
        let max_dimension = self.max_dimension;

        async move {
            let result = fetch_and_decode(backend, &uri, max_dimension).await;

            // Cache insert and in-flight removal happen under one lock so a
            // concurrent request sees exactly one of them.
            let mut state = state.lock();
            if let Ok(artwork) = &result {
                state.cache.put(uri.clone(), Arc::clone(artwork));
            }
            state.in_flight.remove(&uri);

            result
        }
        .boxed()
        .shared()
    }
}

impl fmt::Debug for ArtworkFetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("ArtworkFetcher")
            .field("cached", &state.cache.len())
            .field("in_flight", &state.in_flight.len())
            .field("max_dimension", &self.max_dimension)
            .finish()
    }
}

async fn fetch_and_decode(
    backend: Arc<dyn ArtworkBackend>,
    uri: &str,
    max_dimension: Option<u32>,
) -> ArtworkResult {
    if uri.trim().is_empty() {
        return Err(MetadataError::InvalidUri(uri.to_string()));
    }

    let data = backend.fetch(uri).await.map_err(|e| {
        warn!(uri = %redact_uri(uri), error = %e, "Artwork fetch failed");
        MetadataError::unavailable(uri, e)
    })?;

    debug!(uri = %redact_uri(uri), bytes = data.len(), "Fetched artwork");

    let owned_uri = uri.to_string();
    let decoded = tokio::task::spawn_blocking(move || {
        Artwork::decode(&owned_uri, &data, max_dimension)
    })
    .await
    .map_err(|e| MetadataError::unavailable(uri, format!("decode task failed: {}", e)))?;

    if let Err(err) = &decoded {
        warn!(uri = %redact_uri(uri), error = %err, "Artwork decode failed");
    }

    decoded.map(Arc::new)
}

/// Downscale so neither edge exceeds `max_dimension`, keeping aspect ratio.
fn resize_to_fit(img: DynamicImage, max_dimension: Option<u32>) -> DynamicImage {
    match max_dimension {
        Some(dimension) if img.width() > dimension || img.height() > dimension => {
            img.resize(dimension, dimension, image::imageops::FilterType::Lanczos3)
        }
        _ => img,
    }
}

/// Average colour of the image as `#RRGGBB`.
fn extract_dominant_color(img: &DynamicImage) -> String {
    // Sample a small copy for speed
    let small = img.resize(50, 50, image::imageops::FilterType::Nearest);
    let rgb = small.to_rgb8();

    let (mut r_sum, mut g_sum, mut b_sum, mut count) = (0u64, 0u64, 0u64, 0u64);
    for pixel in rgb.pixels() {
        r_sum += pixel[0] as u64;
        g_sum += pixel[1] as u64;
        b_sum += pixel[2] as u64;
        count += 1;
    }

    if count == 0 {
        return "#000000".to_string();
    }

    format!(
        "#{:02X}{:02X}{:02X}",
        (r_sum / count) as u8,
        (g_sum / count) as u8,
        (b_sum / count) as u8
    )
}

// =============================================================================
// Tests
// =============================================================================
