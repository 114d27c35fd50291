//! # Playback State Machine
//!
//! Engine lifecycle state, the events that move it, and the transport
//! actions each state permits.
//!
//! ```text
//!            prepare              engine_ready
//!   Idle ───────────► Preparing ───────────────► Playing ◄──┐
//!                        ▲                          │ pause  │ play
//!     prepare (recover)  │                          ▼        │
//!   Error ───────────────┤                        Paused ────┘
//!     ▲                  │ prepare
//!     │ engine_error     │
//!   (any)             Stopped ◄──── stop (any)
//! ```
//!
//! `prepare` is also accepted while Preparing, Playing or Paused: changing
//! media mid-playback releases the current engine and loads the new source.
//! Anything not in the table is rejected with
//! [`PlaybackError::InvalidTransition`] and leaves the state untouched.

use crate::error::{PlaybackError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Idle,
    Preparing,
    Playing,
    Paused,
    Stopped,
    Error,
}

impl PlaybackState {
    pub const ALL: [PlaybackState; 6] = [
        PlaybackState::Idle,
        PlaybackState::Preparing,
        PlaybackState::Playing,
        PlaybackState::Paused,
        PlaybackState::Stopped,
        PlaybackState::Error,
    ];

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            PlaybackState::Preparing | PlaybackState::Playing | PlaybackState::Paused
        )
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateEvent {
    /// A source is being loaded into a fresh engine.
    Prepare,
    /// The engine finished loading.
    EngineReady,
    Play,
    Pause,
    Stop,
    EngineError,
}

/// An applied state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: PlaybackState,
    pub to: PlaybackState,
    pub event: StateEvent,
}

impl Transition {
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Single-writer owner of the current [`PlaybackState`].
#[derive(Debug, Clone, Default)]
pub struct PlaybackStateMachine {
    state: PlaybackState,
}

impl PlaybackStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Target state for `event` in `from`, or `None` if the pair is not allowed.
    pub fn next_state(from: PlaybackState, event: StateEvent) -> Option<PlaybackState> {
        use PlaybackState::*;
        use StateEvent::*;

        match (from, event) {
            (_, Stop) => Some(Stopped),
            (_, EngineError) => Some(Error),
            (_, Prepare) => Some(Preparing),
            (Preparing, EngineReady) => Some(Playing),
            (Playing, Pause) => Some(Paused),
            (Paused, Play) => Some(Playing),
            _ => None,
        }
    }

    /// Apply `event`, returning the transition or rejecting it unchanged.
    pub fn apply(&mut self, event: StateEvent) -> Result<Transition> {
        let from = self.state;
        let to = Self::next_state(from, event)
            .ok_or(PlaybackError::InvalidTransition { from, event })?;
        self.state = to;
        Ok(Transition { from, to, event })
    }

    pub fn available_actions(&self) -> ActionSet {
        ActionSet::for_state(self.state)
    }
}

// ============================================================================
// Transport Actions
// ============================================================================

/// A transport command a remote controller may offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackAction {
    Play,
    Pause,
    PlayPause,
    Stop,
    SeekTo,
    SkipNext,
    SkipPrevious,
    PlayFromMediaId,
    PlayFromSearch,
}

impl PlaybackAction {
    pub const ALL: [PlaybackAction; 9] = [
        PlaybackAction::Play,
        PlaybackAction::Pause,
        PlaybackAction::PlayPause,
        PlaybackAction::Stop,
        PlaybackAction::SeekTo,
        PlaybackAction::SkipNext,
        PlaybackAction::SkipPrevious,
        PlaybackAction::PlayFromMediaId,
        PlaybackAction::PlayFromSearch,
    ];

    const fn bit(self) -> u16 {
        1 << self as u16
    }
}

/// Set of [`PlaybackAction`]s as a bitmask, ready to hand to a remote
/// transport layer that greys out unsupported controls.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionSet(u16);

impl ActionSet {
    pub const EMPTY: ActionSet = ActionSet(0);

    /// Commands offered in every state.
    pub const ALWAYS: ActionSet = ActionSet::of(&[
        PlaybackAction::PlayFromMediaId,
        PlaybackAction::PlayFromSearch,
        PlaybackAction::SkipNext,
        PlaybackAction::SkipPrevious,
    ]);

    pub const fn of(actions: &[PlaybackAction]) -> ActionSet {
        let mut bits = 0;
        let mut i = 0;
        while i < actions.len() {
            bits |= actions[i].bit();
            i += 1;
        }
        ActionSet(bits)
    }

    /// Permitted actions in `state`, always including [`ActionSet::ALWAYS`].
    pub fn for_state(state: PlaybackState) -> ActionSet {
        use PlaybackAction::*;

        let specific = match state {
            PlaybackState::Stopped => ActionSet::of(&[Play, Pause]),
            PlaybackState::Playing => ActionSet::of(&[Stop, Pause, SeekTo]),
            PlaybackState::Paused => ActionSet::of(&[Play, Stop]),
            PlaybackState::Idle | PlaybackState::Preparing | PlaybackState::Error => {
                ActionSet::of(&[Play, PlayPause, Stop, Pause])
            }
        };
        specific.union(ActionSet::ALWAYS)
    }

    pub const fn bits(&self) -> u16 {
        self.0
    }

    pub const fn contains(&self, action: PlaybackAction) -> bool {
        self.0 & action.bit() != 0
    }

    pub fn insert(&mut self, action: PlaybackAction) {
        self.0 |= action.bit();
    }

    pub const fn union(self, other: ActionSet) -> ActionSet {
        ActionSet(self.0 | other.0)
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = PlaybackAction> + '_ {
        PlaybackAction::ALL
            .into_iter()
            .filter(move |action| self.contains(*action))
    }
}

impl FromIterator<PlaybackAction> for ActionSet {
    fn from_iter<I: IntoIterator<Item = PlaybackAction>>(iter: I) -> Self {
        let mut set = ActionSet::EMPTY;
        for action in iter {
            set.insert(action);
        }
        set
    }
}

impl fmt::Debug for ActionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

// ============================================================================
// Published Snapshot
// ============================================================================

/// Immutable status snapshot published on every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    /// Best effort from the engine; 0 without one
    pub position_ms: u64,
    pub duration_ms: u64,
    pub actions: ActionSet,
    /// Prepared item, for UI identification
    pub media_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PlaybackStatus {
    pub fn new(state: PlaybackState, timestamp: DateTime<Utc>) -> Self {
        Self {
            state,
            position_ms: 0,
            duration_ms: 0,
            actions: ActionSet::for_state(state),
            media_id: None,
            timestamp,
        }
    }

    pub fn with_position(mut self, position_ms: u64, duration_ms: u64) -> Self {
        self.position_ms = position_ms;
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_media_id(mut self, media_id: Option<String>) -> Self {
        self.media_id = media_id;
        self
    }
}
