//! # Playback Control Plane
//!
//! Queue, lifecycle and publication logic for a media player whose audio
//! rendering is provided by the host.
//!
//! ## Overview
//!
//! This crate handles:
//! - An ordered play queue with a wrapping cursor ([`queue`])
//! - The playback lifecycle as an explicit transition table ([`state`])
//! - A single-task controller that owns the queue, the state and the media
//!   engine, and serializes every command and engine event ([`controller`])
//! - Fan-out of status, metadata and artwork to observers, and fan-in of
//!   remote transport commands ([`session`])
//! - A now-playing card presenter ([`notification`]) and an event bus
//!   adapter ([`bus`])
//! - Persistence of where the listener left off ([`resume`])
//!
//! ## Example
//!
//! ```ignore
//! use core_playback::{PlaybackController, PlayOptions, SessionBridge, SessionPublisher};
//!
//! let publisher = SessionPublisher::new();
//! let (handle, _task) = PlaybackController::new(engine_factory, catalog, publisher.clone()).spawn();
//! let session = SessionBridge::new(handle.clone(), publisher);
//!
//! handle.play_from_media_id("track-1", PlayOptions::default()).await?;
//! ```

pub mod bus;
pub mod controller;
pub mod error;
pub mod notification;
pub mod queue;
pub mod resume;
pub mod session;
pub mod state;

pub use bus::EventBusObserver;
pub use controller::{
    ControllerOptions, ControllerSnapshot, PlayOptions, PlaybackController, PlaybackHandle,
};
pub use error::{PlaybackError, Result};
pub use notification::NotificationPresenter;
pub use queue::PlaybackQueue;
pub use resume::{ResumePoint, ResumeStore};
pub use session::{
    ArtworkUpdate, FaultKind, PlayExtras, PlaybackFault, PlaybackObserver, PlaybackProgress,
    QueueSnapshot, SessionBridge, SessionPublisher, SubscriptionId, TransportCommand,
};
pub use state::{
    ActionSet, PlaybackAction, PlaybackState, PlaybackStateMachine, PlaybackStatus, StateEvent,
    Transition,
};
