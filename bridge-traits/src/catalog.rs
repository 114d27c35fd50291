//! Catalog Lookup and Queue Items
//!
//! The catalog is whatever the host uses to know about playable media
//! (a remote library, a local index, a playlist file). The core only needs
//! to turn a media id into a [`QueueItem`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A playable entry in the queue.
///
/// Items are immutable once enqueued; `media_id` is unique within a queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub media_id: String,
    pub title: String,
    pub artist: String,
    /// Source the engine loads (file path, content URI or stream URL).
    pub source_uri: String,
    /// Artwork location, if the item has any.
    pub artwork_uri: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(media_id: impl Into<String>, source_uri: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            title: String::new(),
            artist: String::new(),
            source_uri: source_uri.into(),
            artwork_uri: None,
            added_at: Utc::now(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }

    pub fn with_artwork(mut self, artwork_uri: impl Into<String>) -> Self {
        self.artwork_uri = Some(artwork_uri.into());
        self
    }

    pub fn with_added_at(mut self, added_at: DateTime<Utc>) -> Self {
        self.added_at = added_at;
        self
    }

    /// Title for display, falling back to the media id.
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.media_id
        } else {
            &self.title
        }
    }
}

/// Resolves media ids to queue items.
///
/// `Ok(None)` means the id is unknown to the catalog; errors are reserved
/// for lookups that could not be performed.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::catalog::CatalogLookup;
///
/// async fn exists(catalog: &dyn CatalogLookup, id: &str) -> bool {
///     matches!(catalog.resolve(id).await, Ok(Some(_)))
/// }
/// ```
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    async fn resolve(&self, media_id: &str) -> Result<Option<QueueItem>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_item_builder() {
        let item = QueueItem::new("track-1", "file:///music/one.mp3")
            .with_title("One")
            .with_artist("Band")
            .with_artwork("https://cdn.example.com/one.jpg");

        assert_eq!(item.media_id, "track-1");
        assert_eq!(item.display_title(), "One");
        assert_eq!(item.artist, "Band");
        assert_eq!(
            item.artwork_uri.as_deref(),
            Some("https://cdn.example.com/one.jpg")
        );
    }

    #[test]
    fn test_display_title_falls_back_to_id() {
        let item = QueueItem::new("track-2", "file:///music/two.mp3");
        assert_eq!(item.display_title(), "track-2");
    }

    #[test]
    fn test_queue_item_serde() {
        let item = QueueItem::new("track-3", "file:///music/three.mp3").with_title("Three");
        let json = serde_json::to_string(&item).unwrap();
        let back: QueueItem = serde_json::from_str(&json).unwrap();
        assert_eq!(item, back);
    }
}
