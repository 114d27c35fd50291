//! Media Engine Bridge
//!
//! The core never renders audio itself. Hosts plug their native player
//! (AVPlayer, ExoPlayer, a desktop backend) in through [`MediaEngine`], and
//! hand the core a [`MediaEngineFactory`] so a fresh engine instance can be
//! created every time the prepared media changes.
//!
//! ## Lifecycle
//!
//! ```text
//! factory.create(sink) ─► load(uri) ─► play()/pause()/seek() ... ─► release()
//!                              │
//!                              └─► sink.emit(EngineEvent::…) at any time
//! ```
//!
//! Engines report asynchronous lifecycle changes (buffering, ready after a
//! stall, end of stream, fatal errors) through the [`EngineEventSink`] they
//! were created with. The sink may be invoked from any thread; the core
//! marshals every event onto its own serialization point before acting on it.
//!
//! An engine is released exactly once. After `release()` the core drops the
//! handle and never calls into it again.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;

/// Asynchronous lifecycle notification emitted by a media engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// Playback stalled while the engine fills its buffer.
    Buffering,
    /// The engine is able to render again (initial load or after a stall).
    Ready,
    /// The source played to its end.
    Ended,
    /// Unrecoverable engine failure.
    Error { message: String },
}

impl EngineEvent {
    pub fn error(message: impl Into<String>) -> Self {
        EngineEvent::Error {
            message: message.into(),
        }
    }
}

/// Callback handle an engine uses to report [`EngineEvent`]s back to the core.
///
/// Cloning is cheap; every clone forwards to the same receiver.
#[derive(Clone)]
pub struct EngineEventSink {
    callback: Arc<dyn Fn(EngineEvent) + Send + Sync>,
}

impl EngineEventSink {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(EngineEvent) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    /// A sink that drops every event. Useful for engines created outside the core.
    pub fn discard() -> Self {
        Self::new(|_| {})
    }

    pub fn emit(&self, event: EngineEvent) {
        (self.callback)(event);
    }
}

impl fmt::Debug for EngineEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineEventSink").finish_non_exhaustive()
    }
}

/// Opaque media player driven by the playback controller.
///
/// Positions and durations are in milliseconds. `position_ms` and
/// `duration_ms` are best effort: engines that do not know yet return `0`.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::engine::MediaEngine;
///
/// async fn restart(engine: &dyn MediaEngine) -> bridge_traits::error::Result<()> {
///     engine.seek(0).await?;
///     engine.play().await
/// }
/// ```
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Load a source and resolve once the engine is ready to render it.
    ///
    /// Unreachable or undecodable sources resolve to an error.
    async fn load(&self, uri: &str) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    async fn seek(&self, position_ms: u64) -> Result<()>;

    /// Set output volume, `level` in `[0.0, 1.0]`.
    async fn set_volume(&self, level: f32) -> Result<()>;

    async fn position_ms(&self) -> u64;

    async fn duration_ms(&self) -> u64;

    /// Free native resources. Must be idempotent.
    async fn release(&self);
}

/// Creates engine instances bound to an event sink.
///
/// Returning an error here means the platform cannot provide a player at
/// all (audio session denied, decoder missing) and surfaces to callers as an
/// engine-unavailable failure.
pub trait MediaEngineFactory: Send + Sync {
    fn create(&self, events: EngineEventSink) -> Result<Box<dyn MediaEngine>>;
}

impl<F> MediaEngineFactory for F
where
    F: Fn(EngineEventSink) -> Result<Box<dyn MediaEngine>> + Send + Sync,
{
    fn create(&self, events: EngineEventSink) -> Result<Box<dyn MediaEngine>> {
        self(events)
    }
}
