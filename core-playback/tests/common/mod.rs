//! Shared fakes for the core-playback integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    ArtworkBackend, BridgeError, CatalogLookup, EngineEvent, EngineEventSink, MediaEngine,
    MediaEngineFactory, QueueItem,
};
use bytes::Bytes;
use core_playback::{
    ArtworkUpdate, ControllerOptions, PlaybackController, PlaybackFault, PlaybackHandle,
    PlaybackObserver, PlaybackProgress, PlaybackQueue, PlaybackState, PlaybackStatus,
    QueueSnapshot, SessionPublisher,
};
use image::{DynamicImage, ImageFormat};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

// ============================================================================
// Media Engine
// ============================================================================

/// Shared record of everything the fake engines were asked to do.
#[derive(Default)]
pub struct EngineLog {
    calls: Mutex<Vec<String>>,
    sinks: Mutex<Vec<EngineEventSink>>,
    failing_uris: Mutex<HashSet<String>>,
    unavailable: AtomicBool,
    live: AtomicUsize,
    max_live: AtomicUsize,
    position_ms: AtomicU64,
    duration_ms: AtomicU64,
}

impl EngineLog {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// URIs passed to `load`, in order.
    pub fn loads(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| call.strip_prefix("load:").map(str::to_string))
            .collect()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub fn fail_uri(&self, uri: &str) {
        self.failing_uris.lock().insert(uri.to_string());
    }

    pub fn heal_uri(&self, uri: &str) {
        self.failing_uris.lock().remove(uri);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn set_progress(&self, position_ms: u64, duration_ms: u64) {
        self.position_ms.store(position_ms, Ordering::SeqCst);
        self.duration_ms.store(duration_ms, Ordering::SeqCst);
    }

    /// Sink of the `index`-th engine ever created.
    pub fn sink(&self, index: usize) -> EngineEventSink {
        self.sinks.lock()[index].clone()
    }

    /// Emit through the most recently created engine.
    pub fn emit(&self, event: EngineEvent) {
        let sink = self.sinks.lock().last().cloned().expect("no engine created");
        sink.emit(event);
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }
}

struct FakeEngine {
    log: Arc<EngineLog>,
    released: AtomicBool,
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn load(&self, uri: &str) -> BridgeResult<()> {
        self.log.record(format!("load:{}", uri));
        if self.log.failing_uris.lock().contains(uri) {
            return Err(BridgeError::UnsupportedSource(uri.to_string()));
        }
        self.log.position_ms.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.log.record("play");
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.log.record("pause");
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.log.record("stop");
        Ok(())
    }

    async fn seek(&self, position_ms: u64) -> BridgeResult<()> {
        self.log.record(format!("seek:{}", position_ms));
        self.log.position_ms.store(position_ms, Ordering::SeqCst);
        Ok(())
    }

    async fn set_volume(&self, level: f32) -> BridgeResult<()> {
        self.log.record(format!("volume:{}", level));
        Ok(())
    }

    async fn position_ms(&self) -> u64 {
        self.log.position_ms.load(Ordering::SeqCst)
    }

    async fn duration_ms(&self) -> u64 {
        self.log.duration_ms.load(Ordering::SeqCst)
    }

    async fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.log.live.fetch_sub(1, Ordering::SeqCst);
            self.log.record("release");
        }
    }
}

pub struct FakeEngineFactory {
    log: Arc<EngineLog>,
}

impl FakeEngineFactory {
    pub fn new(log: Arc<EngineLog>) -> Self {
        Self { log }
    }
}

impl MediaEngineFactory for FakeEngineFactory {
    fn create(&self, events: EngineEventSink) -> BridgeResult<Box<dyn MediaEngine>> {
        if self.log.unavailable.load(Ordering::SeqCst) {
            return Err(BridgeError::NotAvailable("audio session denied".to_string()));
        }

        self.log.sinks.lock().push(events);
        let live = self.log.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.max_live.fetch_max(live, Ordering::SeqCst);

        Ok(Box::new(FakeEngine {
            log: Arc::clone(&self.log),
            released: AtomicBool::new(false),
        }))
    }
}

// ============================================================================
// Catalog
// ============================================================================

pub fn track(id: &str) -> QueueItem {
    QueueItem::new(id, format!("file:///music/{}.mp3", id))
        .with_title(format!("Track {}", id.to_uppercase()))
        .with_artist("Test Artist")
}

pub fn track_with_art(id: &str) -> QueueItem {
    track(id).with_artwork(format!("https://img.example.com/{}.png", id))
}

pub fn source(id: &str) -> String {
    format!("file:///music/{}.mp3", id)
}

pub struct StaticCatalog {
    items: Vec<QueueItem>,
}

impl StaticCatalog {
    pub fn new(items: Vec<QueueItem>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl CatalogLookup for StaticCatalog {
    async fn resolve(&self, media_id: &str) -> BridgeResult<Option<QueueItem>> {
        Ok(self.items.iter().find(|item| item.media_id == media_id).cloned())
    }
}

// ============================================================================
// Artwork
// ============================================================================

pub fn png(color: [u8; 3]) -> Bytes {
    let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(8, 8, image::Rgb(color)));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    Bytes::from(buffer)
}

/// Artwork backend whose fetches block until released per URI.
#[derive(Default)]
pub struct GatedArtwork {
    gates: Mutex<HashMap<String, Arc<Notify>>>,
    fetches: AtomicUsize,
}

impl GatedArtwork {
    pub fn gate(&self, uri: &str) -> Arc<Notify> {
        Arc::clone(
            self.gates
                .lock()
                .entry(uri.to_string())
                .or_insert_with(|| Arc::new(Notify::new())),
        )
    }

    pub fn release(&self, uri: &str) {
        self.gate(uri).notify_one();
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtworkBackend for GatedArtwork {
    async fn fetch(&self, uri: &str) -> BridgeResult<Bytes> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.gate(uri).notified().await;
        Ok(png([200, 40, 40]))
    }
}

/// Artwork backend that fails its first `failures` fetches.
pub struct FlakyArtwork {
    failures: usize,
    fetches: AtomicUsize,
}

impl FlakyArtwork {
    pub fn new(failures: usize) -> Self {
        Self {
            failures,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtworkBackend for FlakyArtwork {
    async fn fetch(&self, uri: &str) -> BridgeResult<Bytes> {
        if self.fetches.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err(BridgeError::NotAvailable(uri.to_string()));
        }
        Ok(png([40, 40, 200]))
    }
}

// ============================================================================
// Observer
// ============================================================================

#[derive(Default)]
pub struct RecordingObserver {
    pub statuses: Mutex<Vec<PlaybackStatus>>,
    pub metadata: Mutex<Vec<Option<String>>>,
    pub artwork: Mutex<Vec<ArtworkUpdate>>,
    pub progress: Mutex<Vec<PlaybackProgress>>,
    pub queues: Mutex<Vec<QueueSnapshot>>,
    pub completed: Mutex<Vec<String>>,
    pub faults: Mutex<Vec<PlaybackFault>>,
    pub active: Mutex<Vec<bool>>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<PlaybackState> {
        self.statuses.lock().iter().map(|status| status.state).collect()
    }

    pub fn last_status(&self) -> PlaybackStatus {
        self.statuses.lock().last().cloned().expect("no status published")
    }

    pub fn progress_count(&self) -> usize {
        self.progress.lock().len()
    }
}

impl PlaybackObserver for RecordingObserver {
    fn on_status(&self, status: &PlaybackStatus) {
        self.statuses.lock().push(status.clone());
    }

    fn on_metadata(&self, item: Option<&QueueItem>) {
        self.metadata
            .lock()
            .push(item.map(|item| item.media_id.clone()));
    }

    fn on_artwork(&self, update: &ArtworkUpdate) {
        self.artwork.lock().push(update.clone());
    }

    fn on_progress(&self, progress: &PlaybackProgress) {
        self.progress.lock().push(progress.clone());
    }

    fn on_queue(&self, queue: &QueueSnapshot) {
        self.queues.lock().push(queue.clone());
    }

    fn on_completed(&self, media_id: &str) {
        self.completed.lock().push(media_id.to_string());
    }

    fn on_fault(&self, fault: &PlaybackFault) {
        self.faults.lock().push(fault.clone());
    }

    fn on_active_changed(&self, active: bool) {
        self.active.lock().push(active);
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub handle: PlaybackHandle,
    pub engine: Arc<EngineLog>,
    pub observer: Arc<RecordingObserver>,
    pub publisher: SessionPublisher,
    pub task: JoinHandle<()>,
}

pub const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Catalog knows tracks `a`..`e`; the queue starts with `queue`.
pub fn spawn(queue: &[&str]) -> Harness {
    spawn_with(queue, |controller| controller)
}

pub fn spawn_with(
    queue: &[&str],
    configure: impl FnOnce(PlaybackController) -> PlaybackController,
) -> Harness {
    let catalog_items: Vec<QueueItem> = ["a", "b", "c", "d", "e"].iter().map(|id| track(id)).collect();
    let queue_items = queue.iter().map(|id| track(id));
    spawn_custom(catalog_items, PlaybackQueue::from_items(queue_items), configure)
}

pub fn spawn_custom(
    catalog: Vec<QueueItem>,
    queue: PlaybackQueue,
    configure: impl FnOnce(PlaybackController) -> PlaybackController,
) -> Harness {
    let engine = Arc::new(EngineLog::default());
    let observer = Arc::new(RecordingObserver::default());
    let publisher = SessionPublisher::new();
    publisher.subscribe(observer.clone());

    let controller = PlaybackController::new(
        Arc::new(FakeEngineFactory::new(Arc::clone(&engine))),
        Arc::new(StaticCatalog::new(catalog)),
        publisher.clone(),
    )
    .with_queue(queue)
    .with_options(ControllerOptions {
        position_poll_interval: POLL_INTERVAL,
        initial_volume: 0.8,
    });

    let (handle, task) = configure(controller).spawn();

    Harness {
        handle,
        engine,
        observer,
        publisher,
        task,
    }
}

/// Poll `condition` until it holds, failing the test after two seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
