//! # Playback Controller
//!
//! Single owner of the queue, the state machine, the prepared media and the
//! media engine.
//!
//! ## Overview
//!
//! The controller runs as one Tokio task fed by an unbounded FIFO mailbox.
//! Everything that can change playback goes through that mailbox:
//!
//! - commands from [`PlaybackHandle`] (transport buttons, UI, remote session)
//! - lifecycle events reported by the engine through its [`EngineEventSink`]
//! - position ticks from the tracker task
//! - completed artwork fetches
//!
//! Messages are handled one at a time, to completion, in arrival order, so
//! no two handlers ever observe each other's intermediate state and no lock
//! guards the playback state.
//!
//! ## Media Change Protocol
//!
//! A play request for an item reloads the engine when nothing is prepared,
//! when a different item is prepared, or when the prepared item already
//! played to completion (or was stopped). Reloading releases the previous
//! engine first, so at most one engine is alive at any time:
//!
//! ```text
//! release old ─► Preparing ─► factory.create ─► load ─► play ─► Playing
//!                                  │              │
//!                                  └── failure ───┴─► Error
//! ```
//!
//! Asking to play the item that is already playing is a no-op; asking to
//! play the paused item resumes it without reloading.
//!
//! ## Stale Events
//!
//! Every engine is created with a sink tagged by a generation number that
//! increases each time an engine is released. Events and ticks carrying an
//! older tag are dropped, so a late `Ended` from a released engine can never
//! skip the new track.

use crate::error::{PlaybackError, Result};
use crate::queue::PlaybackQueue;
use crate::resume::{ResumePoint, ResumeStore};
use crate::session::{
    ArtworkUpdate, FaultKind, PlaybackFault, PlaybackProgress, QueueSnapshot, SessionPublisher,
};
use crate::state::{PlaybackState, PlaybackStateMachine, PlaybackStatus, StateEvent};
use bridge_traits::{
    CatalogLookup, Clock, EngineEvent, EngineEventSink, MediaEngine, MediaEngineFactory,
    QueueItem, SystemClock,
};
use core_metadata::{ArtworkFetcher, ArtworkRequest, ArtworkResult};
use core_runtime::config::DEFAULT_POSITION_POLL_INTERVAL;
use core_runtime::logging::redact_uri;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, WeakUnboundedSender};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

// ============================================================================
// Public Types
// ============================================================================

/// Arguments of [`PlaybackHandle::play_from_media_id`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlayOptions {
    /// Queue position the caller believes holds the item.
    pub queue_position: Option<usize>,
    /// Replace the whole queue before playing.
    pub new_playlist: bool,
}

impl PlayOptions {
    pub fn at(queue_position: usize) -> Self {
        Self {
            queue_position: Some(queue_position),
            new_playlist: false,
        }
    }

    pub fn new_playlist() -> Self {
        Self {
            queue_position: None,
            new_playlist: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerOptions {
    /// How often position is polled while playing.
    pub position_poll_interval: Duration,
    /// Volume applied to every new engine, in `[0.0, 1.0]`.
    pub initial_volume: f32,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            position_poll_interval: DEFAULT_POSITION_POLL_INTERVAL,
            initial_volume: 1.0,
        }
    }
}

/// Point-in-time view of the controller, for diagnostics and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerSnapshot {
    pub state: PlaybackState,
    pub queue: QueueSnapshot,
    pub prepared: Option<QueueItem>,
    pub played_to_completion: bool,
    pub volume: f32,
    pub has_engine: bool,
}

// ============================================================================
// Mailbox
// ============================================================================

type Reply<T> = oneshot::Sender<Result<T>>;

enum Command {
    PlayFromMediaId {
        media_id: String,
        options: PlayOptions,
        reply: Reply<()>,
    },
    Play(Reply<()>),
    Pause(Reply<()>),
    Stop(Reply<()>),
    SeekTo {
        position_ms: u64,
        reply: Reply<()>,
    },
    SkipNext(Reply<()>),
    SkipPrevious(Reply<()>),
    SetVolume {
        level: f32,
        reply: Reply<()>,
    },
    AddQueueItem {
        item: QueueItem,
        reply: Reply<bool>,
    },
    RemoveQueueItem {
        media_id: String,
        reply: Reply<bool>,
    },
    Snapshot(Reply<ControllerSnapshot>),
}

enum Message {
    Command(Command),
    Engine { generation: u64, event: EngineEvent },
    Tick { epoch: u64 },
    ArtworkResolved {
        uri: String,
        media_id: String,
        result: ArtworkResult,
    },
    Shutdown(oneshot::Sender<()>),
}

// ============================================================================
// Handle
// ============================================================================

/// Cheap, cloneable entry point to a running controller.
///
/// Every method enqueues a command and resolves once the controller has
/// handled it. Once the controller has shut down, every method returns
/// [`PlaybackError::ControllerClosed`].
#[derive(Clone)]
pub struct PlaybackHandle {
    sender: UnboundedSender<Message>,
}

impl PlaybackHandle {
    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Message::Command(command(reply)))
            .map_err(|_| PlaybackError::ControllerClosed)?;
        response.await.map_err(|_| PlaybackError::ControllerClosed)?
    }

    /// Resolve `media_id` through the catalog, make it current and play it.
    pub async fn play_from_media_id(
        &self,
        media_id: impl Into<String>,
        options: PlayOptions,
    ) -> Result<()> {
        let media_id = media_id.into();
        self.request(|reply| Command::PlayFromMediaId {
            media_id,
            options,
            reply,
        })
        .await
    }

    /// Resume the prepared item, or start the current queue item.
    pub async fn play(&self) -> Result<()> {
        self.request(Command::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(Command::Pause).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.request(Command::Stop).await
    }

    pub async fn seek_to(&self, position_ms: u64) -> Result<()> {
        self.request(|reply| Command::SeekTo { position_ms, reply })
            .await
    }

    pub async fn skip_next(&self) -> Result<()> {
        self.request(Command::SkipNext).await
    }

    pub async fn skip_previous(&self) -> Result<()> {
        self.request(Command::SkipPrevious).await
    }

    pub async fn set_volume(&self, level: f32) -> Result<()> {
        self.request(|reply| Command::SetVolume { level, reply })
            .await
    }

    /// Returns `false` if an item with the same id was already queued.
    pub async fn add_queue_item(&self, item: QueueItem) -> Result<bool> {
        self.request(|reply| Command::AddQueueItem { item, reply })
            .await
    }

    /// Returns `false` if no queued item had this id.
    pub async fn remove_queue_item(&self, media_id: impl Into<String>) -> Result<bool> {
        let media_id = media_id.into();
        self.request(|reply| Command::RemoveQueueItem { media_id, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<ControllerSnapshot> {
        self.request(Command::Snapshot).await
    }

    /// Release the engine and stop the controller task. Commands already
    /// queued behind the shutdown fail with `ControllerClosed`.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        self.sender
            .send(Message::Shutdown(reply))
            .map_err(|_| PlaybackError::ControllerClosed)?;
        done.await.map_err(|_| PlaybackError::ControllerClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}

// ============================================================================
// Controller
// ============================================================================

struct PositionTracker {
    epoch: u64,
    cancel: CancellationToken,
}

/// The playback actor. Configure it, then [`spawn`](Self::spawn) it.
pub struct PlaybackController {
    queue: PlaybackQueue,
    machine: PlaybackStateMachine,
    prepared: Option<QueueItem>,
    played_to_completion: bool,
    engine: Option<Box<dyn MediaEngine>>,
    generation: u64,
    volume: f32,
    tracker: Option<PositionTracker>,
    tracker_epoch: u64,
    poll_interval: Duration,
    buffering_since: Option<Instant>,
    artwork_uri: Option<String>,
    artwork_failed: bool,

    engine_factory: Arc<dyn MediaEngineFactory>,
    catalog: Arc<dyn CatalogLookup>,
    artwork: Option<ArtworkFetcher>,
    resume: Option<ResumeStore>,
    clock: Arc<dyn Clock>,
    publisher: SessionPublisher,
    mailbox: Option<WeakUnboundedSender<Message>>,
}

impl PlaybackController {
    pub fn new(
        engine_factory: Arc<dyn MediaEngineFactory>,
        catalog: Arc<dyn CatalogLookup>,
        publisher: SessionPublisher,
    ) -> Self {
        let options = ControllerOptions::default();
        Self {
            queue: PlaybackQueue::new(),
            machine: PlaybackStateMachine::new(),
            prepared: None,
            played_to_completion: false,
            engine: None,
            generation: 0,
            volume: options.initial_volume,
            tracker: None,
            tracker_epoch: 0,
            poll_interval: options.position_poll_interval,
            buffering_since: None,
            artwork_uri: None,
            artwork_failed: false,
            engine_factory,
            catalog,
            artwork: None,
            resume: None,
            clock: Arc::new(SystemClock),
            publisher,
            mailbox: None,
        }
    }

    pub fn with_queue(mut self, queue: PlaybackQueue) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_artwork(mut self, fetcher: ArtworkFetcher) -> Self {
        self.artwork = Some(fetcher);
        self
    }

    pub fn with_resume_store(mut self, resume: ResumeStore) -> Self {
        self.resume = Some(resume);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_options(mut self, options: ControllerOptions) -> Self {
        self.poll_interval = options.position_poll_interval.max(MIN_POLL_INTERVAL);
        self.volume = options.initial_volume.clamp(0.0, 1.0);
        self
    }

    /// Start the controller task. Must be called from within a Tokio runtime.
    ///
    /// The task ends on [`PlaybackHandle::shutdown`] or once every handle
    /// has been dropped.
    pub fn spawn(mut self) -> (PlaybackHandle, JoinHandle<()>) {
        let (sender, inbox) = mpsc::unbounded_channel();
        self.mailbox = Some(sender.downgrade());
        let task = tokio::spawn(self.run(inbox));
        (PlaybackHandle { sender }, task)
    }

    async fn run(mut self, mut inbox: UnboundedReceiver<Message>) {
        info!(queue_len = self.queue.len(), "Playback controller started");

        let mut shutdown_reply = None;
        while let Some(message) = inbox.recv().await {
            match message {
                Message::Command(command) => self.handle_command(command).await,
                Message::Engine { generation, event } => {
                    self.on_engine_event(generation, event).await
                }
                Message::Tick { epoch } => self.on_tick(epoch).await,
                Message::ArtworkResolved {
                    uri,
                    media_id,
                    result,
                } => self.on_artwork_resolved(uri, media_id, result),
                Message::Shutdown(reply) => {
                    shutdown_reply = Some(reply);
                    break;
                }
            }
        }

        inbox.close();
        self.release_engine().await;
        self.publisher.set_active(false);
        info!("Playback controller stopped");

        if let Some(reply) = shutdown_reply {
            let _ = reply.send(());
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::PlayFromMediaId {
                media_id,
                options,
                reply,
            } => {
                let _ = reply.send(self.play_from_media_id(&media_id, options).await);
            }
            Command::Play(reply) => {
                let _ = reply.send(self.play().await);
            }
            Command::Pause(reply) => {
                let _ = reply.send(self.pause().await);
            }
            Command::Stop(reply) => {
                let _ = reply.send(self.stop().await);
            }
            Command::SeekTo { position_ms, reply } => {
                let _ = reply.send(self.seek_to(position_ms).await);
            }
            Command::SkipNext(reply) => {
                let _ = reply.send(self.skip(true).await);
            }
            Command::SkipPrevious(reply) => {
                let _ = reply.send(self.skip(false).await);
            }
            Command::SetVolume { level, reply } => {
                let _ = reply.send(self.set_volume(level).await);
            }
            Command::AddQueueItem { item, reply } => {
                let _ = reply.send(Ok(self.add_queue_item(item)));
            }
            Command::RemoveQueueItem { media_id, reply } => {
                let _ = reply.send(Ok(self.remove_queue_item(&media_id)));
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(Ok(self.snapshot()));
            }
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    #[instrument(skip(self, options), fields(media_id = %media_id))]
    async fn play_from_media_id(&mut self, media_id: &str, options: PlayOptions) -> Result<()> {
        let item = self
            .catalog
            .resolve(media_id)
            .await?
            .ok_or_else(|| PlaybackError::MediaNotFound(media_id.to_string()))?;

        let existing = if options.new_playlist {
            None
        } else {
            self.queue.position_of(media_id)
        };
        let base_len = if options.new_playlist { 0 } else { self.queue.len() };
        let len = base_len + usize::from(existing.is_none());
        if let Some(position) = options.queue_position {
            if position >= len {
                return Err(PlaybackError::IndexOutOfRange {
                    index: position,
                    len,
                });
            }
        }

        if options.new_playlist {
            debug!("Replacing queue with a new playlist");
            self.queue.reset();
        }
        let index = match existing {
            Some(index) => index,
            None => {
                self.queue.append(item);
                self.queue.len() - 1
            }
        };

        let target = match options.queue_position {
            Some(position)
                if self.queue.get(position).map(|queued| queued.media_id.as_str())
                    == Some(media_id) =>
            {
                position
            }
            Some(position) => {
                debug!(position, index, "Queue position does not hold the item, using its index");
                index
            }
            None => index,
        };

        let cursor_before = self.queue.cursor();
        let current = self.queue.jump_to(target)?.clone();
        if options.new_playlist || existing.is_none() || cursor_before != Some(target) {
            self.publish_queue();
        }

        self.play_item(current).await
    }

    async fn play(&mut self) -> Result<()> {
        if self.queue.is_empty() {
            return Err(PlaybackError::EmptyQueue);
        }

        let item = match &self.prepared {
            Some(prepared) => prepared.clone(),
            None => self
                .queue
                .current()
                .cloned()
                .ok_or(PlaybackError::EmptyQueue)?,
        };
        self.play_item(item).await
    }

    async fn pause(&mut self) -> Result<()> {
        let state = self.machine.state();
        if state != PlaybackState::Playing {
            debug!(?state, "Pause ignored");
            return Ok(());
        }

        if let Some(engine) = &self.engine {
            engine.pause().await?;
        }
        self.stop_tracker();
        self.machine.apply(StateEvent::Pause)?;
        self.publish_status().await;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(engine) = &self.engine {
            if let Err(e) = engine.stop().await {
                warn!("Engine failed to stop cleanly: {}", e);
            }
        }
        self.release_engine().await;

        self.machine.apply(StateEvent::Stop)?;
        self.played_to_completion = true;
        self.publish_status().await;
        self.publisher.set_active(false);
        info!("Playback stopped");
        Ok(())
    }

    async fn seek_to(&mut self, position_ms: u64) -> Result<()> {
        let Some(engine) = &self.engine else {
            debug!(position_ms, "Seek ignored without an engine");
            return Ok(());
        };

        engine.seek(position_ms).await?;
        self.publish_status().await;
        Ok(())
    }

    async fn skip(&mut self, forward: bool) -> Result<()> {
        let next = if forward {
            self.queue.advance()?
        } else {
            self.queue.rewind()?
        };
        debug!(media_id = %next.media_id, forward, "Skipping");

        self.publish_queue();
        self.prepared = None;
        self.play().await
    }

    async fn set_volume(&mut self, level: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&level) {
            return Err(PlaybackError::InvalidVolume(level));
        }

        self.volume = level;
        if let Some(engine) = &self.engine {
            engine.set_volume(level).await?;
        }
        Ok(())
    }

    fn add_queue_item(&mut self, item: QueueItem) -> bool {
        let added = self.queue.append(item);
        if added {
            self.publish_queue();
        }
        added
    }

    fn remove_queue_item(&mut self, media_id: &str) -> bool {
        let removed = self.queue.remove(media_id).is_some();
        if removed {
            // A released item that left the queue must not be resumed by `play()`.
            if self.engine.is_none()
                && self.prepared.as_ref().map(|item| item.media_id.as_str()) == Some(media_id)
            {
                self.prepared = None;
            }
            self.publish_queue();
        }
        removed
    }

    fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            state: self.machine.state(),
            queue: self.queue_snapshot(),
            prepared: self.prepared.clone(),
            played_to_completion: self.played_to_completion,
            volume: self.volume,
            has_engine: self.engine.is_some(),
        }
    }

    // ------------------------------------------------------------------------
    // Media Change Protocol
    // ------------------------------------------------------------------------

    async fn play_item(&mut self, item: QueueItem) -> Result<()> {
        let same_media = self
            .prepared
            .as_ref()
            .is_some_and(|prepared| prepared.media_id == item.media_id);

        if same_media && !self.played_to_completion && self.engine.is_some() {
            match self.machine.state() {
                PlaybackState::Playing | PlaybackState::Preparing => {
                    debug!(media_id = %item.media_id, "Already playing");
                    return Ok(());
                }
                PlaybackState::Paused => return self.resume().await,
                _ => {}
            }
        }

        self.load_and_play(item).await
    }

    async fn resume(&mut self) -> Result<()> {
        if let Some(engine) = &self.engine {
            engine.play().await?;
        }
        self.machine.apply(StateEvent::Play)?;
        self.publisher.set_active(true);
        self.start_tracker();
        self.publish_status().await;
        self.save_resume_point().await;
        Ok(())
    }

    #[instrument(skip(self, item), fields(media_id = %item.media_id))]
    async fn load_and_play(&mut self, item: QueueItem) -> Result<()> {
        self.played_to_completion = false;
        self.release_engine().await;

        info!(source = %redact_uri(&item.source_uri), "Preparing media");
        self.prepared = Some(item.clone());
        self.machine.apply(StateEvent::Prepare)?;
        self.publisher.set_active(true);
        self.publish_status().await;
        self.request_artwork(&item);

        let engine = match self.engine_factory.create(self.event_sink(self.generation)) {
            Ok(engine) => engine,
            Err(e) => {
                let cause = e.to_string();
                warn!("Media engine unavailable: {}", cause);
                self.fail(FaultKind::EngineUnavailable, cause.clone()).await;
                return Err(PlaybackError::EngineUnavailable(cause));
            }
        };

        if let Err(e) = engine.set_volume(self.volume).await {
            warn!("Failed to apply volume to new engine: {}", e);
        }

        let loaded = async {
            engine.load(&item.source_uri).await?;
            engine.play().await
        }
        .await;

        if let Err(e) = loaded {
            engine.release().await;
            let cause = e.to_string();
            warn!("Failed to load media: {}", cause);
            self.fail(FaultKind::MediaLoadFailed, cause.clone()).await;
            return Err(PlaybackError::MediaLoadFailed {
                media_id: item.media_id,
                cause,
            });
        }

        self.engine = Some(engine);
        self.machine.apply(StateEvent::EngineReady)?;
        self.start_tracker();
        self.publish_status().await;
        self.save_resume_point().await;
        info!("Playback started");
        Ok(())
    }

    /// Release the engine (if any) and invalidate its pending events.
    async fn release_engine(&mut self) {
        self.stop_tracker();
        self.buffering_since = None;
        self.generation += 1;

        if let Some(engine) = self.engine.take() {
            engine.release().await;
            debug!(generation = self.generation, "Released media engine");
        }
    }

    async fn fail(&mut self, kind: FaultKind, message: String) {
        self.release_engine().await;
        self.played_to_completion = true;

        if let Err(e) = self.machine.apply(StateEvent::EngineError) {
            warn!("Could not enter error state: {}", e);
        }
        self.publish_status().await;

        let fault = PlaybackFault {
            kind,
            media_id: self.prepared.as_ref().map(|item| item.media_id.clone()),
            message,
        };
        self.publisher.publish_fault(&fault);
    }

    /// The prepared item reached its end: announce it and move on.
    async fn complete(&mut self) {
        let Some(media_id) = self.prepared.as_ref().map(|item| item.media_id.clone()) else {
            return;
        };

        info!(media_id = %media_id, "Playback completed");
        self.played_to_completion = true;
        self.stop_tracker();
        self.publisher.publish_completed(&media_id);

        match self.skip(true).await {
            Ok(()) => {}
            Err(PlaybackError::EmptyQueue) => {
                if let Err(e) = self.stop().await {
                    warn!("Failed to stop after completion: {}", e);
                }
            }
            Err(e) => warn!("Auto-advance failed: {}", e),
        }
    }

    // ------------------------------------------------------------------------
    // Engine Events and Position Tracking
    // ------------------------------------------------------------------------

    fn event_sink(&self, generation: u64) -> EngineEventSink {
        let mailbox = self.mailbox.clone();
        EngineEventSink::new(move |event| {
            if let Some(sender) = mailbox.as_ref().and_then(WeakUnboundedSender::upgrade) {
                let _ = sender.send(Message::Engine { generation, event });
            }
        })
    }

    async fn on_engine_event(&mut self, generation: u64, event: EngineEvent) {
        if generation != self.generation || self.engine.is_none() {
            debug!(?event, generation, "Ignoring event from released engine");
            return;
        }

        match event {
            EngineEvent::Buffering => {
                debug!("Engine buffering");
                self.buffering_since.get_or_insert_with(Instant::now);
            }
            EngineEvent::Ready => {
                if let Some(since) = self.buffering_since.take() {
                    info!(
                        buffering_ms = since.elapsed().as_millis() as u64,
                        "Engine ready after buffering"
                    );
                }
            }
            EngineEvent::Ended => {
                if matches!(
                    self.machine.state(),
                    PlaybackState::Playing | PlaybackState::Paused
                ) {
                    self.complete().await;
                }
            }
            EngineEvent::Error { message } => {
                warn!("Engine reported an error: {}", message);
                self.fail(FaultKind::EngineError, message).await;
            }
        }
    }

    fn start_tracker(&mut self) {
        if self.tracker.is_some() {
            return;
        }
        let Some(mailbox) = self.mailbox.clone() else {
            return;
        };

        self.tracker_epoch += 1;
        let cancel = CancellationToken::new();
        tokio::spawn(track_position(
            mailbox,
            self.tracker_epoch,
            self.poll_interval,
            cancel.clone(),
        ));
        self.tracker = Some(PositionTracker {
            epoch: self.tracker_epoch,
            cancel,
        });
    }

    fn stop_tracker(&mut self) {
        if let Some(tracker) = self.tracker.take() {
            tracker.cancel.cancel();
        }
    }

    async fn on_tick(&mut self, epoch: u64) {
        let current = self.tracker.as_ref().map(|tracker| tracker.epoch);
        if current != Some(epoch) || self.machine.state() != PlaybackState::Playing {
            return;
        }
        let (Some(engine), Some(item)) = (&self.engine, &self.prepared) else {
            return;
        };

        let position_ms = engine.position_ms().await;
        let duration_ms = engine.duration_ms().await;
        self.publisher.publish_progress(&PlaybackProgress {
            media_id: item.media_id.clone(),
            position_ms,
            duration_ms,
        });

        if duration_ms > 0 && position_ms >= duration_ms {
            self.complete().await;
        }
    }

    // ------------------------------------------------------------------------
    // Artwork
    // ------------------------------------------------------------------------

    fn request_artwork(&mut self, item: &QueueItem) {
        // A failed fetch is retried when the next item shares its URI.
        if self.artwork_uri == item.artwork_uri && !self.artwork_failed {
            return;
        }
        self.artwork_uri = item.artwork_uri.clone();
        self.artwork_failed = false;

        let media_id = item.media_id.clone();
        let (Some(fetcher), Some(uri)) = (&self.artwork, item.artwork_uri.clone()) else {
            self.publisher.publish_artwork(ArtworkUpdate {
                media_id,
                uri: item.artwork_uri.clone(),
                artwork: None,
            });
            return;
        };

        match fetcher.request(&uri) {
            ArtworkRequest::Ready(artwork) => {
                self.publisher.publish_artwork(ArtworkUpdate {
                    media_id,
                    uri: Some(uri),
                    artwork: Some(artwork),
                });
            }
            ArtworkRequest::Pending(waiter) => {
                let Some(mailbox) = self.mailbox.clone() else {
                    return;
                };
                tokio::spawn(async move {
                    let result = waiter.wait().await;
                    if let Some(sender) = mailbox.upgrade() {
                        let _ = sender.send(Message::ArtworkResolved {
                            uri,
                            media_id,
                            result,
                        });
                    }
                });
            }
        }
    }

    fn on_artwork_resolved(&mut self, uri: String, media_id: String, result: ArtworkResult) {
        if self.artwork_uri.as_deref() != Some(uri.as_str()) {
            debug!(uri = %redact_uri(&uri), "Dropping artwork for superseded item");
            return;
        }

        let artwork = match result {
            Ok(artwork) => Some(artwork),
            Err(e) => {
                warn!("Artwork unavailable: {}", e);
                self.artwork_failed = true;
                None
            }
        };
        let media_id = self
            .prepared
            .as_ref()
            .map(|item| item.media_id.clone())
            .unwrap_or(media_id);

        self.publisher.publish_artwork(ArtworkUpdate {
            media_id,
            uri: Some(uri),
            artwork,
        });
    }

    // ------------------------------------------------------------------------
    // Publication
    // ------------------------------------------------------------------------

    async fn current_status(&self) -> PlaybackStatus {
        let (position_ms, duration_ms) = match &self.engine {
            Some(engine) => (engine.position_ms().await, engine.duration_ms().await),
            None => (0, 0),
        };

        PlaybackStatus::new(self.machine.state(), self.clock.now())
            .with_position(position_ms, duration_ms)
            .with_media_id(self.prepared.as_ref().map(|item| item.media_id.clone()))
    }

    async fn publish_status(&self) {
        let status = self.current_status().await;
        debug!(state = ?status.state, position_ms = status.position_ms, "Publishing status");
        self.publisher.publish(status, self.prepared.as_ref());
    }

    fn queue_snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            items: self.queue.items().to_vec(),
            cursor: self.queue.cursor(),
        }
    }

    fn publish_queue(&self) {
        self.publisher.publish_queue(&self.queue_snapshot());
    }

    async fn save_resume_point(&self) {
        let (Some(resume), Some(item)) = (&self.resume, &self.prepared) else {
            return;
        };
        let Some(queue_position) = self.queue.position_of(&item.media_id) else {
            return;
        };

        let point = ResumePoint {
            queue_position,
            media_id: item.media_id.clone(),
        };
        if let Err(e) = resume.save(&point).await {
            warn!("Failed to save resume point: {}", e);
        }
    }
}

impl fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackController")
            .field("state", &self.machine.state())
            .field("queue_len", &self.queue.len())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Recurring position poll. Ends when cancelled or when the controller is gone.
async fn track_position(
    mailbox: WeakUnboundedSender<Message>,
    epoch: u64,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let Some(sender) = mailbox.upgrade() else {
                    break;
                };
                if sender.send(Message::Tick { epoch }).is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::BridgeError;

    struct EmptyCatalog;

    #[async_trait]
    impl CatalogLookup for EmptyCatalog {
        async fn resolve(&self, _media_id: &str) -> BridgeResult<Option<QueueItem>> {
            Ok(None)
        }
    }

    fn controller() -> PlaybackController {
        let factory = |_sink: EngineEventSink| -> BridgeResult<Box<dyn MediaEngine>> {
            Err(BridgeError::NotAvailable("no audio device".to_string()))
        };
        PlaybackController::new(
            Arc::new(factory),
            Arc::new(EmptyCatalog),
            SessionPublisher::new(),
        )
    }

    #[test]
    fn test_play_options_constructors() {
        assert_eq!(
            PlayOptions::at(3),
            PlayOptions {
                queue_position: Some(3),
                new_playlist: false
            }
        );
        assert!(PlayOptions::new_playlist().new_playlist);
        assert_eq!(PlayOptions::default().queue_position, None);
    }

    #[test]
    fn test_controller_options_are_sanitized() {
        let controller = controller().with_options(ControllerOptions {
            position_poll_interval: Duration::ZERO,
            initial_volume: 3.0,
        });

        assert_eq!(controller.poll_interval, MIN_POLL_INTERVAL);
        assert_eq!(controller.volume, 1.0);
    }

    #[tokio::test]
    async fn test_unknown_media_id_is_reported() {
        let (handle, _task) = controller().spawn();

        let err = handle
            .play_from_media_id("ghost", PlayOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::MediaNotFound(id) if id == "ghost"));

        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.state, PlaybackState::Idle);
        assert!(snapshot.queue.items.is_empty());
    }

    #[tokio::test]
    async fn test_handle_reports_closed_after_shutdown() {
        let (handle, task) = controller().spawn();

        handle.shutdown().await.unwrap();
        task.await.unwrap();

        assert!(handle.is_closed());
        assert!(matches!(
            handle.play().await,
            Err(PlaybackError::ControllerClosed)
        ));
        assert!(matches!(
            handle.shutdown().await,
            Err(PlaybackError::ControllerClosed)
        ));
    }

    #[tokio::test]
    async fn test_task_ends_when_handles_are_dropped() {
        let (handle, task) = controller().spawn();
        drop(handle);
        task.await.unwrap();
    }
}
