//! Artwork Backend
//!
//! Raw byte source for cover art. Hosts typically back this with their HTTP
//! stack or a content resolver; decoding and caching happen in the core.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Fetches encoded image bytes (JPEG, PNG, ...) for an artwork URI.
#[async_trait]
pub trait ArtworkBackend: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<Bytes>;
}
