//! # Host Bridge Traits
//!
//! Capability contracts between the playback core and the host platform.
//!
//! ## Overview
//!
//! The core owns queue, lifecycle and publication logic. Everything that
//! touches the outside world (rendering audio, looking up media, downloading
//! cover art, persisting preferences, drawing a notification) is a bridge
//! trait implemented by the host and injected at startup.
//!
//! ## Traits
//!
//! ### Playback
//! - [`MediaEngine`](engine::MediaEngine) - Opaque player for a single source
//! - [`MediaEngineFactory`](engine::MediaEngineFactory) - Creates one engine per prepared item
//! - [`CatalogLookup`](catalog::CatalogLookup) - Resolves media ids to [`QueueItem`]s
//!
//! ### Presentation
//! - [`ArtworkBackend`](artwork::ArtworkBackend) - Raw cover art bytes
//! - [`NotificationSink`](notification::NotificationSink) - Now-playing card surface
//!
//! ### Utilities
//! - [`SettingsStore`](storage::SettingsStore) - Key-value preferences
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! Required capabilities (engine factory, catalog) are checked when the core
//! configuration is built, so a host that forgot to inject one gets a
//! descriptive error at startup rather than a failure on first play.
//!
//! ## Error Handling
//!
//! All bridge traits return [`BridgeError`](error::BridgeError). Platform
//! implementations should convert native errors and keep messages actionable
//! (include the URI or key involved).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so they can be shared
//! across async tasks.
//!
//! ## Examples
//!
//! ### Implementing CatalogLookup
//!
//! ```ignore
//! use async_trait::async_trait;
//! use bridge_traits::{CatalogLookup, QueueItem};
//! use bridge_traits::error::Result;
//!
//! struct StaticCatalog(Vec<QueueItem>);
//!
//! #[async_trait]
//! impl CatalogLookup for StaticCatalog {
//!     async fn resolve(&self, media_id: &str) -> Result<Option<QueueItem>> {
//!         Ok(self.0.iter().find(|item| item.media_id == media_id).cloned())
//!     }
//! }
//! ```

pub mod artwork;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod notification;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use artwork::ArtworkBackend;
pub use catalog::{CatalogLookup, QueueItem};
pub use engine::{EngineEvent, EngineEventSink, MediaEngine, MediaEngineFactory};
pub use notification::{CardArtwork, CardControls, NotificationSink, NowPlayingCard};
pub use storage::{MemorySettingsStore, SettingsStore};
pub use time::{Clock, ConsoleLogger, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
