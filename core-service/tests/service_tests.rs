//! Bootstrapping the full service from a `CoreConfig`.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    ArtworkBackend, BridgeError, CatalogLookup, EngineEventSink, MediaEngine, MemorySettingsStore,
    NotificationSink, NowPlayingCard, QueueItem,
};
use bytes::Bytes;
use core_runtime::events::{PlaybackEvent, QueueEvent};
use core_service::{
    CoreConfig, CoreConfigBuilder, CoreError, CoreEvent, CoreService, PlayOptions, ResumePoint,
    TransportCommand,
};
use image::{DynamicImage, ImageFormat};
use mockall::mock;
use parking_lot::Mutex;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Catalog {}

    #[async_trait]
    impl CatalogLookup for Catalog {
        async fn resolve(&self, media_id: &str) -> BridgeResult<Option<QueueItem>>;
    }
}

/// Engine that accepts everything and never reports progress.
struct QuietEngine {
    loads: Arc<AtomicUsize>,
}

#[async_trait]
impl MediaEngine for QuietEngine {
    async fn load(&self, _uri: &str) -> BridgeResult<()> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn seek(&self, _position_ms: u64) -> BridgeResult<()> {
        Ok(())
    }

    async fn set_volume(&self, _level: f32) -> BridgeResult<()> {
        Ok(())
    }

    async fn position_ms(&self) -> u64 {
        0
    }

    async fn duration_ms(&self) -> u64 {
        0
    }

    async fn release(&self) {}
}

#[derive(Default)]
struct RecordingSink {
    shown: Mutex<Vec<(NowPlayingCard, bool)>>,
    dismissed: AtomicUsize,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn show(&self, card: NowPlayingCard, foreground: bool) -> BridgeResult<()> {
        self.shown.lock().push((card, foreground));
        Ok(())
    }

    async fn dismiss(&self) -> BridgeResult<()> {
        self.dismissed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct SolidArtwork;

#[async_trait]
impl ArtworkBackend for SolidArtwork {
    async fn fetch(&self, _uri: &str) -> BridgeResult<Bytes> {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(4, 4, image::Rgb([0, 0, 255])));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(|e| BridgeError::OperationFailed(e.to_string()))?;
        Ok(Bytes::from(buffer))
    }
}

fn catalog() -> MockCatalog {
    let mut catalog = MockCatalog::new();
    catalog.expect_resolve().returning(|media_id| {
        Ok(Some(
            QueueItem::new(media_id, format!("file:///music/{}.mp3", media_id))
                .with_title(media_id.to_uppercase())
                .with_artwork(format!("https://img.example.com/{}.png", media_id)),
        ))
    });
    catalog
}

fn builder(loads: Arc<AtomicUsize>) -> CoreConfigBuilder {
    let factory = move |_events: EngineEventSink| -> BridgeResult<Box<dyn MediaEngine>> {
        Ok(Box::new(QuietEngine {
            loads: Arc::clone(&loads),
        }))
    };

    CoreConfig::builder()
        .engine_factory(Arc::new(factory))
        .catalog(Arc::new(catalog()))
        .position_poll_interval(Duration::from_millis(20))
}

#[tokio::test]
async fn test_play_reaches_event_bus_and_resume_store() {
    let settings = Arc::new(MemorySettingsStore::new());
    let loads = Arc::new(AtomicUsize::new(0));
    let config = builder(Arc::clone(&loads))
        .settings_store(settings)
        .persist_resume_point(true)
        .build()
        .unwrap();

    let service = CoreService::start(config).unwrap();
    let mut events = service.events().stream();
    assert!(!service.artwork_enabled());

    service
        .handle()
        .play_from_media_id("intro", PlayOptions::new_playlist())
        .await
        .unwrap();

    let mut seen = Vec::new();
    while let Some(Ok(event)) = events.try_recv() {
        seen.push(event);
    }
    assert!(seen.contains(&CoreEvent::Queue(QueueEvent::Changed {
        length: 1,
        cursor: Some(0),
    })));
    assert!(seen.iter().any(|event| matches!(
        event,
        CoreEvent::Playback(PlaybackEvent::Started { media_id, .. }) if media_id == "intro"
    )));

    assert_eq!(
        service.resume_point().await,
        Some(ResumePoint {
            queue_position: 0,
            media_id: "intro".to_string(),
        })
    );
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_resume_point_absent_without_feature() {
    let config = builder(Arc::new(AtomicUsize::new(0)))
        .settings_store(Arc::new(MemorySettingsStore::new()))
        .build()
        .unwrap();
    let service = CoreService::start(config).unwrap();

    service
        .handle()
        .play_from_media_id("intro", PlayOptions::default())
        .await
        .unwrap();

    assert_eq!(service.resume_point().await, None);
    service.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_notification_sink_is_wired() {
    let sink = Arc::new(RecordingSink::default());
    let config = builder(Arc::new(AtomicUsize::new(0)))
        .notification_sink(sink.clone())
        .artwork_backend(Arc::new(SolidArtwork))
        .enable_artwork(true)
        .build()
        .unwrap();
    let service = CoreService::start(config).unwrap();
    assert!(service.artwork_enabled());

    let session = service.session();
    session
        .dispatch(TransportCommand::PlayFromMediaId {
            media_id: "intro".to_string(),
            extras: Default::default(),
        })
        .await
        .unwrap();
    session.dispatch(TransportCommand::Stop).await.unwrap();

    // Shutdown drains the presenter before returning.
    service.shutdown().await.unwrap();

    let shown = sink.shown.lock();
    assert!(!shown.is_empty());
    assert!(shown.iter().all(|(card, _)| card.media_id == "intro"));
    assert!(shown[0].1);
    assert_eq!(sink.dismissed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_shutdown_closes_handle_and_is_repeatable() {
    let config = builder(Arc::new(AtomicUsize::new(0))).build().unwrap();
    let service = CoreService::start(config).unwrap();
    let handle = service.handle();

    service.shutdown().await.unwrap();
    service.shutdown().await.unwrap();

    assert!(handle.is_closed());
    assert!(matches!(
        handle.play().await,
        Err(core_playback::PlaybackError::ControllerClosed)
    ));
    assert!(!service.session().is_active());
}

#[tokio::test]
async fn test_start_revalidates_config() {
    let mut config = builder(Arc::new(AtomicUsize::new(0))).build().unwrap();
    config.features.enable_artwork = true;

    match CoreService::start(config) {
        Err(CoreError::Config(_)) => {}
        other => panic!("expected Config error, got {:?}", other),
    }
}

#[test]
fn test_start_requires_runtime() {
    let config = builder(Arc::new(AtomicUsize::new(0))).build().unwrap();

    assert!(matches!(
        CoreService::start(config),
        Err(CoreError::InitializationFailed(_))
    ));
}
