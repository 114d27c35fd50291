//! Bridges controller publications onto the [`EventBus`].
//!
//! UI layers that only want a stream of [`CoreEvent`]s subscribe to the bus
//! instead of implementing [`PlaybackObserver`]. Status publications are
//! translated into lifecycle events by comparing with the previous status.

use crate::session::{
    ArtworkUpdate, FaultKind, PlaybackFault, PlaybackObserver, PlaybackProgress, QueueSnapshot,
};
use crate::state::{PlaybackState, PlaybackStatus};
use bridge_traits::QueueItem;
use core_runtime::events::{ArtworkEvent, CoreEvent, EventBus, PlaybackEvent, QueueEvent};
use parking_lot::Mutex;

#[derive(Default)]
struct Seen {
    state: Option<PlaybackState>,
    item: Option<QueueItem>,
}

pub struct EventBusObserver {
    bus: EventBus,
    seen: Mutex<Seen>,
}

impl EventBusObserver {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            seen: Mutex::new(Seen::default()),
        }
    }

    fn emit(&self, event: CoreEvent) {
        // No subscribers is not an error here.
        self.bus.emit(event).ok();
    }

    fn lifecycle_event(
        previous: Option<PlaybackState>,
        status: &PlaybackStatus,
        item: Option<&QueueItem>,
    ) -> Option<PlaybackEvent> {
        let media_id = status.media_id.clone();

        if previous == Some(status.state) {
            return match (status.state, media_id) {
                (PlaybackState::Playing | PlaybackState::Paused, Some(media_id)) => {
                    Some(PlaybackEvent::PositionChanged {
                        media_id,
                        position_ms: status.position_ms,
                        duration_ms: status.duration_ms,
                    })
                }
                _ => None,
            };
        }

        match status.state {
            PlaybackState::Preparing => Some(PlaybackEvent::Preparing {
                media_id: media_id?,
            }),
            PlaybackState::Playing if previous == Some(PlaybackState::Paused) => {
                Some(PlaybackEvent::Resumed {
                    media_id: media_id?,
                    position_ms: status.position_ms,
                })
            }
            PlaybackState::Playing => Some(PlaybackEvent::Started {
                title: item
                    .map(|item| item.display_title().to_string())
                    .unwrap_or_default(),
                media_id: media_id?,
            }),
            PlaybackState::Paused => Some(PlaybackEvent::Paused {
                media_id: media_id?,
                position_ms: status.position_ms,
            }),
            PlaybackState::Stopped => Some(PlaybackEvent::Stopped { media_id }),
            // Reported with details through on_fault.
            PlaybackState::Error | PlaybackState::Idle => None,
        }
    }
}

impl PlaybackObserver for EventBusObserver {
    fn on_status(&self, status: &PlaybackStatus) {
        let event = {
            let mut seen = self.seen.lock();
            let previous = seen.state.replace(status.state);
            Self::lifecycle_event(previous, status, seen.item.as_ref())
        };

        if let Some(event) = event {
            self.emit(CoreEvent::Playback(event));
        }
    }

    fn on_metadata(&self, item: Option<&QueueItem>) {
        self.seen.lock().item = item.cloned();

        if let Some(item) = item {
            self.emit(CoreEvent::Playback(PlaybackEvent::MediaChanged {
                media_id: item.media_id.clone(),
                title: item.display_title().to_string(),
                artist: item.artist.clone(),
            }));
        }
    }

    fn on_artwork(&self, update: &ArtworkUpdate) {
        if let Some(uri) = &update.uri {
            self.emit(CoreEvent::Artwork(ArtworkEvent::Updated {
                media_id: update.media_id.clone(),
                uri: uri.clone(),
                available: update.artwork.is_some(),
            }));
        }
    }

    fn on_progress(&self, progress: &PlaybackProgress) {
        self.emit(CoreEvent::Playback(PlaybackEvent::PositionChanged {
            media_id: progress.media_id.clone(),
            position_ms: progress.position_ms,
            duration_ms: progress.duration_ms,
        }));
    }

    fn on_queue(&self, queue: &QueueSnapshot) {
        self.emit(CoreEvent::Queue(QueueEvent::Changed {
            length: queue.items.len(),
            cursor: queue.cursor,
        }));
    }

    fn on_completed(&self, media_id: &str) {
        self.emit(CoreEvent::Playback(PlaybackEvent::Completed {
            media_id: media_id.to_string(),
        }));
    }

    fn on_fault(&self, fault: &PlaybackFault) {
        self.emit(CoreEvent::Playback(PlaybackEvent::Error {
            media_id: fault.media_id.clone(),
            message: fault.message.clone(),
            recoverable: fault.kind != FaultKind::EngineUnavailable,
        }));
    }
}
