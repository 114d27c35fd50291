//! # Session Bridge
//!
//! Adaptation layer between the controller and everything around it.
//!
//! - **Fan-out**: [`SessionPublisher`] delivers every publication from the
//!   controller to N [`PlaybackObserver`]s (remote transport session,
//!   notification presenter, UI event bus).
//! - **Fan-in**: [`SessionBridge`] turns inbound [`TransportCommand`]s into
//!   controller commands one to one.
//!
//! No playback logic lives here.
//!
//! ## Ordering
//!
//! Publications are delivered synchronously, in the order the controller
//! issues them, and one publication reaches every observer before the next
//! one starts. Observers that need to do slow or async work should hand the
//! value to their own task (see the notification presenter) instead of
//! blocking the callback.
//!
//! A new subscriber first receives the latest status, metadata and artwork,
//! so it never has to wait for the next transition to render something.

use crate::controller::{PlayOptions, PlaybackHandle};
use crate::error::Result;
use crate::state::PlaybackStatus;
use bridge_traits::QueueItem;
use core_metadata::Artwork;
use parking_lot::{Mutex, ReentrantMutex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

// ============================================================================
// Published Values
// ============================================================================

/// Periodic position update while playing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackProgress {
    pub media_id: String,
    pub position_ms: u64,
    pub duration_ms: u64,
}

/// Queue contents and cursor after a mutation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub items: Vec<QueueItem>,
    pub cursor: Option<usize>,
}

/// Artwork for the now-playing item. `artwork == None` means there is none
/// (no URI, or the fetch failed) and the default image applies.
#[derive(Debug, Clone)]
pub struct ArtworkUpdate {
    pub media_id: String,
    pub uri: Option<String>,
    pub artwork: Option<Arc<Artwork>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// The engine could not load the source.
    MediaLoadFailed,
    /// No engine could be created.
    EngineUnavailable,
    /// The engine reported a failure during playback.
    EngineError,
}

/// An asynchronous playback failure, published alongside `state == Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackFault {
    pub kind: FaultKind,
    pub media_id: Option<String>,
    pub message: String,
}

// ============================================================================
// Observer Contract
// ============================================================================

/// Receives controller publications.
///
/// Only `on_status` is required. Callbacks run on the controller task and
/// must not block.
pub trait PlaybackObserver: Send + Sync {
    fn on_status(&self, status: &PlaybackStatus);

    /// Now-playing item changed. `None` when nothing is prepared.
    fn on_metadata(&self, _item: Option<&QueueItem>) {}

    fn on_artwork(&self, _update: &ArtworkUpdate) {}

    fn on_progress(&self, _progress: &PlaybackProgress) {}

    fn on_queue(&self, _queue: &QueueSnapshot) {}

    /// The item played to its end.
    fn on_completed(&self, _media_id: &str) {}

    fn on_fault(&self, _fault: &PlaybackFault) {}

    /// The session became active (a play flow started) or inactive (stop).
    fn on_active_changed(&self, _active: bool) {}
}

/// Identifies a subscription for [`SessionBridge::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Publisher
// ============================================================================

#[derive(Default)]
struct PublisherState {
    observers: Vec<(SubscriptionId, Arc<dyn PlaybackObserver>)>,
    last_status: Option<PlaybackStatus>,
    last_metadata: Option<QueueItem>,
    last_artwork: Option<ArtworkUpdate>,
    active: bool,
}

struct PublisherShared {
    // Held for the whole of one delivery. Reentrant so an observer may
    // subscribe or unsubscribe from inside a callback.
    delivery: ReentrantMutex<()>,
    state: Mutex<PublisherState>,
}

/// Fan-out point for controller publications. Clones share observers.
#[derive(Clone)]
pub struct SessionPublisher {
    shared: Arc<PublisherShared>,
}

impl Default for SessionPublisher {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionPublisher {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(PublisherShared {
                delivery: ReentrantMutex::new(()),
                state: Mutex::new(PublisherState::default()),
            }),
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn PlaybackObserver>) -> SubscriptionId {
        let _delivery = self.shared.delivery.lock();
        let id = SubscriptionId::new();

        let (status, metadata, artwork, active) = {
            let mut state = self.shared.state.lock();
            state.observers.push((id, Arc::clone(&observer)));
            (
                state.last_status.clone(),
                state.last_metadata.clone(),
                state.last_artwork.clone(),
                state.active,
            )
        };

        if let Some(metadata) = &metadata {
            observer.on_metadata(Some(metadata));
        }
        if let Some(artwork) = &artwork {
            observer.on_artwork(artwork);
        }
        if active {
            observer.on_active_changed(true);
        }
        if let Some(status) = &status {
            observer.on_status(status);
        }

        id
    }

    /// Returns `false` if the subscription was not found.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let _delivery = self.shared.delivery.lock();
        let mut state = self.shared.state.lock();
        let before = state.observers.len();
        state.observers.retain(|(existing, _)| *existing != id);
        state.observers.len() != before
    }

    pub fn observer_count(&self) -> usize {
        self.shared.state.lock().observers.len()
    }

    pub fn last_status(&self) -> Option<PlaybackStatus> {
        self.shared.state.lock().last_status.clone()
    }

    pub fn is_active(&self) -> bool {
        self.shared.state.lock().active
    }

    /// Publish a status and the now-playing item. `on_metadata` is only
    /// delivered when the item differs from the last one published.
    pub fn publish(&self, status: PlaybackStatus, metadata: Option<&QueueItem>) {
        let _delivery = self.shared.delivery.lock();

        let (observers, metadata_changed) = {
            let mut state = self.shared.state.lock();
            let metadata_changed = state.last_metadata.as_ref() != metadata;
            if metadata_changed {
                state.last_metadata = metadata.cloned();
            }
            state.last_status = Some(status.clone());
            (Self::observers_of(&state), metadata_changed)
        };

        for observer in &observers {
            if metadata_changed {
                observer.on_metadata(metadata);
            }
            observer.on_status(&status);
        }
    }

    pub fn publish_artwork(&self, update: ArtworkUpdate) {
        self.deliver(
            |state| state.last_artwork = Some(update.clone()),
            |observer| observer.on_artwork(&update),
        );
    }

    pub fn publish_progress(&self, progress: &PlaybackProgress) {
        self.deliver(|_| {}, |observer| observer.on_progress(progress));
    }

    pub fn publish_queue(&self, queue: &QueueSnapshot) {
        self.deliver(|_| {}, |observer| observer.on_queue(queue));
    }

    pub fn publish_completed(&self, media_id: &str) {
        self.deliver(|_| {}, |observer| observer.on_completed(media_id));
    }

    pub fn publish_fault(&self, fault: &PlaybackFault) {
        self.deliver(|_| {}, |observer| observer.on_fault(fault));
    }

    /// Flip the session active flag, notifying observers only on change.
    pub fn set_active(&self, active: bool) {
        let _delivery = self.shared.delivery.lock();
        let observers = {
            let mut state = self.shared.state.lock();
            if state.active == active {
                return;
            }
            state.active = active;
            Self::observers_of(&state)
        };

        for observer in &observers {
            observer.on_active_changed(active);
        }
    }

    fn deliver<U, F>(&self, update: U, notify: F)
    where
        U: FnOnce(&mut PublisherState),
        F: Fn(&dyn PlaybackObserver),
    {
        let _delivery = self.shared.delivery.lock();
        let observers = {
            let mut state = self.shared.state.lock();
            update(&mut state);
            Self::observers_of(&state)
        };

        for observer in &observers {
            notify(observer.as_ref());
        }
    }

    fn observers_of(state: &PublisherState) -> Vec<Arc<dyn PlaybackObserver>> {
        state
            .observers
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect()
    }
}

impl fmt::Debug for SessionPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("SessionPublisher")
            .field("observers", &state.observers.len())
            .field("active", &state.active)
            .finish()
    }
}

// ============================================================================
// Inbound Transport Commands
// ============================================================================

/// Optional arguments of a play-from-id request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayExtras {
    pub queue_position: Option<usize>,
    pub is_new_playlist: Option<bool>,
}

impl From<PlayExtras> for PlayOptions {
    fn from(extras: PlayExtras) -> Self {
        PlayOptions {
            queue_position: extras.queue_position,
            new_playlist: extras.is_new_playlist.unwrap_or(false),
        }
    }
}

/// A command from a remote transport (media buttons, lock screen, car head
/// unit, companion app).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum TransportCommand {
    Play,
    Pause,
    Stop,
    SeekTo { position_ms: u64 },
    SkipNext,
    SkipPrevious,
    PlayFromMediaId {
        media_id: String,
        #[serde(default)]
        extras: PlayExtras,
    },
    AddQueueItem { item: QueueItem },
    RemoveQueueItem { media_id: String },
    SetVolume { level: f32 },
}

/// Session-facing surface of the playback core.
#[derive(Clone, Debug)]
pub struct SessionBridge {
    handle: PlaybackHandle,
    publisher: SessionPublisher,
}

impl SessionBridge {
    pub fn new(handle: PlaybackHandle, publisher: SessionPublisher) -> Self {
        Self { handle, publisher }
    }

    /// Forward one transport command to the controller.
    pub async fn dispatch(&self, command: TransportCommand) -> Result<()> {
        match command {
            TransportCommand::Play => self.handle.play().await,
            TransportCommand::Pause => self.handle.pause().await,
            TransportCommand::Stop => self.handle.stop().await,
            TransportCommand::SeekTo { position_ms } => self.handle.seek_to(position_ms).await,
            TransportCommand::SkipNext => self.handle.skip_next().await,
            TransportCommand::SkipPrevious => self.handle.skip_previous().await,
            TransportCommand::PlayFromMediaId { media_id, extras } => {
                self.handle
                    .play_from_media_id(media_id, extras.into())
                    .await
            }
            TransportCommand::AddQueueItem { item } => {
                self.handle.add_queue_item(item).await.map(|_| ())
            }
            TransportCommand::RemoveQueueItem { media_id } => {
                self.handle.remove_queue_item(media_id).await.map(|_| ())
            }
            TransportCommand::SetVolume { level } => self.handle.set_volume(level).await,
        }
    }

    pub fn subscribe(&self, observer: Arc<dyn PlaybackObserver>) -> SubscriptionId {
        self.publisher.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.publisher.unsubscribe(id)
    }

    pub fn is_active(&self) -> bool {
        self.publisher.is_active()
    }

    pub fn last_status(&self) -> Option<PlaybackStatus> {
        self.publisher.last_status()
    }

    pub fn handle(&self) -> &PlaybackHandle {
        &self.handle
    }
}
