//! Now-playing card presentation.
//!
//! [`NotificationPresenter`] is a [`PlaybackObserver`] that keeps the host's
//! now-playing card in step with playback:
//!
//! | Published state | Card                         |
//! |-----------------|------------------------------|
//! | `Playing`       | shown, foreground            |
//! | `Paused`        | shown, not foreground        |
//! | `Stopped`       | dismissed                    |
//! | anything else   | left as is                   |
//!
//! Artwork is applied only if it belongs to the item the card currently
//! shows; a late fetch for a previous item is ignored.
//!
//! Observer callbacks are synchronous, the sink is async, so updates are
//! forwarded over a channel to a task that talks to the sink in order.

use crate::session::{ArtworkUpdate, PlaybackObserver};
use crate::state::{PlaybackAction, PlaybackState, PlaybackStatus};
use bridge_traits::{CardArtwork, CardControls, NotificationSink, NowPlayingCard, QueueItem};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use std::sync::Arc;

enum Update {
    Status(PlaybackStatus),
    Metadata(Option<QueueItem>),
    Artwork(ArtworkUpdate),
}

pub struct NotificationPresenter {
    updates: UnboundedSender<Update>,
}

impl NotificationPresenter {
    /// Start the presenter task. Must be called from within a Tokio runtime.
    pub fn spawn(sink: Arc<dyn NotificationSink>) -> (Arc<Self>, JoinHandle<()>) {
        let (updates, inbox) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(CardState::new(sink), inbox));
        (Arc::new(Self { updates }), task)
    }

    fn forward(&self, update: Update) {
        if self.updates.send(update).is_err() {
            debug!("Notification presenter task has stopped");
        }
    }
}

impl PlaybackObserver for NotificationPresenter {
    fn on_status(&self, status: &PlaybackStatus) {
        self.forward(Update::Status(status.clone()));
    }

    fn on_metadata(&self, item: Option<&QueueItem>) {
        self.forward(Update::Metadata(item.cloned()));
    }

    fn on_artwork(&self, update: &ArtworkUpdate) {
        self.forward(Update::Artwork(update.clone()));
    }
}

async fn run(mut state: CardState, mut inbox: UnboundedReceiver<Update>) {
    while let Some(update) = inbox.recv().await {
        state.apply(update).await;
    }
    debug!("Notification presenter stopped");
}

struct CardState {
    sink: Arc<dyn NotificationSink>,
    status: Option<PlaybackStatus>,
    item: Option<QueueItem>,
    artwork: Option<(String, CardArtwork)>,
    visible: bool,
}

impl CardState {
    fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            status: None,
            item: None,
            artwork: None,
            visible: false,
        }
    }

    async fn apply(&mut self, update: Update) {
        match update {
            Update::Status(status) => {
                let state = status.state;
                self.status = Some(status);
                match state {
                    PlaybackState::Playing | PlaybackState::Paused => self.show().await,
                    PlaybackState::Stopped => self.dismiss().await,
                    // Keep the card but drop foreground status.
                    PlaybackState::Error => self.refresh().await,
                    PlaybackState::Idle | PlaybackState::Preparing => {}
                }
            }
            Update::Metadata(item) => {
                let artwork_uri = item.as_ref().and_then(|item| item.artwork_uri.as_deref());
                if self.artwork.as_ref().map(|(uri, _)| uri.as_str()) != artwork_uri {
                    self.artwork = None;
                }
                self.item = item;
                self.refresh().await;
            }
            Update::Artwork(update) => {
                let current = self.item.as_ref().and_then(|item| item.artwork_uri.as_deref());
                if update.uri.is_none() || update.uri.as_deref() != current {
                    debug!("Ignoring artwork for another item");
                    return;
                }

                self.artwork = match (update.uri, update.artwork) {
                    (Some(uri), Some(artwork)) => Some((
                        uri,
                        CardArtwork {
                            width: artwork.width,
                            height: artwork.height,
                            rgba: artwork.to_rgba_bytes(),
                            accent_color: Some(artwork.dominant_color.clone()),
                        },
                    )),
                    _ => None,
                };
                self.refresh().await;
            }
        }
    }

    async fn refresh(&mut self) {
        if self.visible {
            self.show().await;
        }
    }

    async fn show(&mut self) {
        let Some(card) = self.card() else {
            return;
        };
        let foreground = card.is_playing;

        match self.sink.show(card, foreground).await {
            Ok(()) => self.visible = true,
            Err(e) => warn!("Failed to show now-playing card: {}", e),
        }
    }

    async fn dismiss(&mut self) {
        if !self.visible {
            return;
        }
        self.visible = false;

        if let Err(e) = self.sink.dismiss().await {
            warn!("Failed to dismiss now-playing card: {}", e);
        }
    }

    fn card(&self) -> Option<NowPlayingCard> {
        let status = self.status.as_ref()?;
        let item = self.item.as_ref()?;
        let actions = status.actions;

        Some(NowPlayingCard {
            media_id: item.media_id.clone(),
            title: item.display_title().to_string(),
            artist: item.artist.clone(),
            is_playing: status.state == PlaybackState::Playing,
            controls: CardControls {
                can_play: actions.contains(PlaybackAction::Play),
                can_pause: actions.contains(PlaybackAction::Pause),
                can_skip_next: actions.contains(PlaybackAction::SkipNext),
                can_skip_previous: actions.contains(PlaybackAction::SkipPrevious),
            },
            artwork: self.artwork.as_ref().map(|(_, artwork)| artwork.clone()),
        })
    }
}
