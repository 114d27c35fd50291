//! # Playback Error Types
//!
//! Errors returned synchronously to the issuer of a playback command.
//! Asynchronous engine failures do not appear here: they surface to
//! observers as a published status with `state == Error`.

use crate::state::{PlaybackState, StateEvent};
use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Queue Errors
    // ========================================================================
    /// Advance, rewind or play attempted with no items queued.
    #[error("Queue is empty")]
    EmptyQueue,

    /// Explicit jump to a position outside the queue.
    #[error("Queue index {index} out of range (queue length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    // ========================================================================
    // Media Errors
    // ========================================================================
    /// The catalog has no item with this id.
    #[error("Media not found: {0}")]
    MediaNotFound(String),

    /// The engine could not load the item's source.
    #[error("Failed to load media {media_id}: {cause}")]
    MediaLoadFailed { media_id: String, cause: String },

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// No engine could be created for the command.
    #[error("Media engine unavailable: {0}")]
    EngineUnavailable(String),

    /// Volume outside `[0.0, 1.0]`.
    #[error("Invalid volume: {0} (must be between 0.0 and 1.0)")]
    InvalidVolume(f32),

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The state machine rejected an event in the current state.
    #[error("Invalid transition: {event:?} while {from:?}")]
    InvalidTransition {
        from: PlaybackState,
        event: StateEvent,
    },

    /// The controller task has shut down.
    #[error("Playback controller is shut down")]
    ControllerClosed,

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

impl PlaybackError {
    /// Returns `true` if a fresh `play()` or skip may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PlaybackError::MediaLoadFailed { .. }
                | PlaybackError::EngineUnavailable(_)
                | PlaybackError::Bridge(_)
        )
    }

    /// Returns `true` for queue errors, which never change playback state.
    pub fn is_queue_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::EmptyQueue | PlaybackError::IndexOutOfRange { .. }
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
