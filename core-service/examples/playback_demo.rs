//! # Playback Service Example
//!
//! Boots the full service around a simulated engine whose tracks last 1.5
//! seconds, so auto-advance can be watched in real time.
//!
//! Run with: `cargo run --example playback_demo --package core-service`

use anyhow::Result;
use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::time::LogLevel;
use bridge_traits::{CatalogLookup, EngineEventSink, MediaEngine, QueueItem};
use core_playback::PlaybackProgress;
use core_runtime::events::{CoreEvent, PlaybackEvent};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::{
    CoreConfig, CoreService, PlayOptions, PlaybackObserver, PlaybackStatus, TransportCommand,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const TRACK_LENGTH_MS: u64 = 1_500;

// ============================================================================
// Simulated Engine
// ============================================================================

/// Position advances with wall time while playing.
#[derive(Default)]
struct SimulatedEngine {
    played_before: Mutex<Duration>,
    playing_since: Mutex<Option<Instant>>,
}

impl SimulatedEngine {
    fn elapsed(&self) -> Duration {
        let since = (*self.playing_since.lock()).map(|start| start.elapsed());
        *self.played_before.lock() + since.unwrap_or_default()
    }
}

#[async_trait]
impl MediaEngine for SimulatedEngine {
    async fn load(&self, uri: &str) -> BridgeResult<()> {
        println!("  [engine] loading {}", uri);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(())
    }

    async fn play(&self) -> BridgeResult<()> {
        self.playing_since.lock().get_or_insert_with(Instant::now);
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        if let Some(start) = self.playing_since.lock().take() {
            *self.played_before.lock() += start.elapsed();
        }
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.pause().await
    }

    async fn seek(&self, position_ms: u64) -> BridgeResult<()> {
        *self.played_before.lock() = Duration::from_millis(position_ms);
        let mut since = self.playing_since.lock();
        if since.is_some() {
            *since = Some(Instant::now());
        }
        Ok(())
    }

    async fn set_volume(&self, _level: f32) -> BridgeResult<()> {
        Ok(())
    }

    async fn position_ms(&self) -> u64 {
        (self.elapsed().as_millis() as u64).min(TRACK_LENGTH_MS)
    }

    async fn duration_ms(&self) -> u64 {
        TRACK_LENGTH_MS
    }

    async fn release(&self) {
        println!("  [engine] released");
    }
}

// ============================================================================
// Catalog and Observer
// ============================================================================

struct DemoCatalog(Vec<QueueItem>);

#[async_trait]
impl CatalogLookup for DemoCatalog {
    async fn resolve(&self, media_id: &str) -> BridgeResult<Option<QueueItem>> {
        Ok(self.0.iter().find(|item| item.media_id == media_id).cloned())
    }
}

struct ConsoleObserver;

impl PlaybackObserver for ConsoleObserver {
    fn on_status(&self, status: &PlaybackStatus) {
        println!(
            "  [status] {:?} {} @ {}ms, actions {:?}",
            status.state,
            status.media_id.as_deref().unwrap_or("-"),
            status.position_ms,
            status.actions
        );
    }

    fn on_metadata(&self, item: Option<&QueueItem>) {
        if let Some(item) = item {
            println!("  [now playing] {} - {}", item.artist, item.display_title());
        }
    }

    fn on_progress(&self, progress: &PlaybackProgress) {
        if progress.position_ms % 500 < 100 {
            println!(
                "  [progress] {} {}/{}ms",
                progress.media_id, progress.position_ms, progress.duration_ms
            );
        }
    }

    fn on_completed(&self, media_id: &str) {
        println!("  [completed] {}", media_id);
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Info),
    )?;

    let tracks: Vec<QueueItem> = ["intro", "verse", "outro"]
        .iter()
        .map(|id| {
            QueueItem::new(*id, format!("file:///demo/{}.flac", id))
                .with_title(id.to_uppercase())
                .with_artist("Demo Band")
        })
        .collect();

    let factory = |_events: EngineEventSink| -> BridgeResult<Box<dyn MediaEngine>> {
        Ok(Box::new(SimulatedEngine::default()))
    };

    let config = CoreConfig::builder()
        .engine_factory(Arc::new(factory))
        .catalog(Arc::new(DemoCatalog(tracks.clone())))
        .position_poll_interval(Duration::from_millis(100))
        .initial_volume(0.7)
        .build()?;

    let service = CoreService::start(config)?;
    service.session().subscribe(Arc::new(ConsoleObserver));

    let mut events = service
        .events()
        .stream()
        .filter(|event| matches!(event, CoreEvent::Playback(PlaybackEvent::Completed { .. })));
    let handle = service.handle();

    println!("=== Play first track as a new playlist ===");
    handle
        .play_from_media_id("intro", PlayOptions::new_playlist())
        .await?;
    for item in &tracks[1..] {
        handle.add_queue_item(item.clone()).await?;
    }
    tokio::time::sleep(Duration::from_millis(700)).await;

    println!("\n=== Pause and resume from the remote ===");
    service.session().dispatch(TransportCommand::Pause).await?;
    tokio::time::sleep(Duration::from_millis(300)).await;
    service.session().dispatch(TransportCommand::Play).await?;

    println!("\n=== Let it auto-advance ===");
    tokio::time::sleep(Duration::from_millis(1_200)).await;

    println!("\n=== Skip back and stop ===");
    handle.skip_previous().await?;
    tokio::time::sleep(Duration::from_millis(300)).await;
    handle.stop().await?;

    let snapshot = handle.snapshot().await?;
    println!(
        "\nFinal state: {:?}, cursor {:?}, prepared {:?}",
        snapshot.state,
        snapshot.queue.cursor,
        snapshot.prepared.map(|item| item.media_id)
    );

    let mut completions = 0;
    while let Some(Ok(_)) = events.try_recv() {
        completions += 1;
    }
    println!("Completion events on the bus: {}", completions);

    service.shutdown().await?;
    Ok(())
}
