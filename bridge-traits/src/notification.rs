//! Now-Playing Notification Bridge
//!
//! Hosts render the "now playing" surface (Android media notification,
//! macOS Now Playing widget, MPRIS). The core decides *when* a card is shown,
//! refreshed or dismissed and hands over plain data.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Decoded artwork ready for display, as tightly packed RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardArtwork {
    pub width: u32,
    pub height: u32,
    pub rgba: Bytes,
    /// Average colour as `#RRGGBB`, for tinting the card.
    pub accent_color: Option<String>,
}

/// Transport buttons the host should render as enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardControls {
    pub can_play: bool,
    pub can_pause: bool,
    pub can_skip_next: bool,
    pub can_skip_previous: bool,
}

/// Everything the host needs to draw the now-playing card.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingCard {
    pub media_id: String,
    pub title: String,
    pub artist: String,
    pub is_playing: bool,
    pub controls: CardControls,
    /// `None` means the host should use its default artwork.
    pub artwork: Option<CardArtwork>,
}

/// Host surface for the now-playing card.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Show or refresh the card. `foreground` asks the host to keep the
    /// playback process in the foreground while the card is visible.
    async fn show(&self, card: NowPlayingCard, foreground: bool) -> Result<()>;

    /// Remove the card and drop any foreground status.
    async fn dismiss(&self) -> Result<()>;
}
