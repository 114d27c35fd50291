//! # Core Configuration Module
//!
//! Provides configuration management for the playback core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! holding every injected bridge and tuning value. Validation is fail-fast:
//! a host that forgets a required bridge or passes an out-of-range value
//! gets an actionable error from `build()`, not a surprise on first play.
//!
//! ## Required Dependencies
//!
//! - `MediaEngineFactory` - Creates the native player for each prepared item
//! - `CatalogLookup` - Resolves media ids to queue items
//!
//! ## Optional Dependencies
//!
//! - `ArtworkBackend` - Cover art bytes (artwork pipeline off without it)
//! - `SettingsStore` - Resume point persistence
//! - `NotificationSink` - Now-playing card
//! - `Clock` - Status timestamps (defaults to the system clock)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .engine_factory(Arc::new(MyEngineFactory))
//!     .catalog(Arc::new(MyCatalog))
//!     .artwork_backend(Arc::new(MyArtworkBackend))
//!     .enable_artwork(true)
//!     .position_poll_interval(Duration::from_millis(250))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    ArtworkBackend, CatalogLookup, Clock, MediaEngineFactory, NotificationSink, SettingsStore,
    SystemClock,
};
use std::sync::Arc;
use std::time::Duration;

/// Default cadence of the position-tracking loop.
pub const DEFAULT_POSITION_POLL_INTERVAL: Duration = Duration::from_millis(100);

const MIN_POSITION_POLL_INTERVAL: Duration = Duration::from_millis(10);
const MAX_POSITION_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default edge length decoded artwork is scaled down to.
pub const DEFAULT_ARTWORK_MAX_DIMENSION: u32 = 512;

/// Core configuration for the playback core.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Creates media engines (required)
    pub engine_factory: Arc<dyn MediaEngineFactory>,

    /// Resolves media ids (required)
    pub catalog: Arc<dyn CatalogLookup>,

    pub artwork_backend: Option<Arc<dyn ArtworkBackend>>,

    pub settings_store: Option<Arc<dyn SettingsStore>>,

    pub notification_sink: Option<Arc<dyn NotificationSink>>,

    pub clock: Arc<dyn Clock>,

    /// Interval of the position-tracking loop while playing
    pub position_poll_interval: Duration,

    /// Buffer size of the typed event bus
    pub event_buffer_size: usize,

    /// Volume applied to every new engine, in `[0.0, 1.0]`
    pub initial_volume: f32,

    /// Maximum number of decoded artworks kept; `None` keeps all of them
    pub artwork_cache_capacity: Option<usize>,

    /// Decoded artwork larger than this is downscaled; `None` keeps originals
    pub artwork_max_dimension: Option<u32>,

    pub features: FeatureFlags,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("engine_factory", &"MediaEngineFactory { ... }")
            .field("catalog", &"CatalogLookup { ... }")
            .field(
                "artwork_backend",
                &self.artwork_backend.as_ref().map(|_| "ArtworkBackend { ... }"),
            )
            .field(
                "settings_store",
                &self.settings_store.as_ref().map(|_| "SettingsStore { ... }"),
            )
            .field(
                "notification_sink",
                &self
                    .notification_sink
                    .as_ref()
                    .map(|_| "NotificationSink { ... }"),
            )
            .field("position_poll_interval", &self.position_poll_interval)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("initial_volume", &self.initial_volume)
            .field("artwork_cache_capacity", &self.artwork_cache_capacity)
            .field("artwork_max_dimension", &self.artwork_max_dimension)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional functionality.
///
/// Each flag needs its corresponding bridge; `validate()` rejects a flag
/// without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeatureFlags {
    /// Fetch and publish artwork for the now-playing item (requires ArtworkBackend)
    pub enable_artwork: bool,

    /// Remember queue position and last media id (requires SettingsStore)
    pub persist_resume_point: bool,
}

impl CoreConfig {
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates value ranges and feature/bridge consistency.
    pub fn validate(&self) -> Result<()> {
        if self.position_poll_interval < MIN_POSITION_POLL_INTERVAL
            || self.position_poll_interval > MAX_POSITION_POLL_INTERVAL
        {
            return Err(Error::Config(format!(
                "Position poll interval must be between {}ms and {}ms, got {}ms",
                MIN_POSITION_POLL_INTERVAL.as_millis(),
                MAX_POSITION_POLL_INTERVAL.as_millis(),
                self.position_poll_interval.as_millis()
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(Error::Config(format!(
                "Initial volume must be within [0.0, 1.0], got {}",
                self.initial_volume
            )));
        }

        if self.artwork_cache_capacity == Some(0) {
            return Err(Error::Config(
                "Artwork cache capacity must be greater than 0. \
                 Use None for an unbounded cache."
                    .to_string(),
            ));
        }

        if self.artwork_max_dimension == Some(0) {
            return Err(Error::Config(
                "Artwork max dimension must be greater than 0".to_string(),
            ));
        }

        if self.features.enable_artwork && self.artwork_backend.is_none() {
            return Err(Error::Config(
                "Artwork enabled but no ArtworkBackend provided. \
                 Disable the feature or inject an ArtworkBackend implementation."
                    .to_string(),
            ));
        }

        if self.features.persist_resume_point && self.settings_store.is_none() {
            return Err(Error::Config(
                "Resume point persistence enabled but no SettingsStore provided. \
                 Disable the feature or inject a SettingsStore implementation."
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for [`CoreConfig`].
pub struct CoreConfigBuilder {
    engine_factory: Option<Arc<dyn MediaEngineFactory>>,
    catalog: Option<Arc<dyn CatalogLookup>>,
    artwork_backend: Option<Arc<dyn ArtworkBackend>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    notification_sink: Option<Arc<dyn NotificationSink>>,
    clock: Option<Arc<dyn Clock>>,
    position_poll_interval: Duration,
    event_buffer_size: usize,
    initial_volume: f32,
    artwork_cache_capacity: Option<usize>,
    artwork_max_dimension: Option<u32>,
    features: FeatureFlags,
}

impl Default for CoreConfigBuilder {
    fn default() -> Self {
        Self {
            engine_factory: None,
            catalog: None,
            artwork_backend: None,
            settings_store: None,
            notification_sink: None,
            clock: None,
            position_poll_interval: DEFAULT_POSITION_POLL_INTERVAL,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            initial_volume: 1.0,
            artwork_cache_capacity: None,
            artwork_max_dimension: Some(DEFAULT_ARTWORK_MAX_DIMENSION),
            features: FeatureFlags::default(),
        }
    }
}

impl CoreConfigBuilder {
    pub fn engine_factory(mut self, factory: Arc<dyn MediaEngineFactory>) -> Self {
        self.engine_factory = Some(factory);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn CatalogLookup>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn artwork_backend(mut self, backend: Arc<dyn ArtworkBackend>) -> Self {
        self.artwork_backend = Some(backend);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.notification_sink = Some(sink);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn position_poll_interval(mut self, interval: Duration) -> Self {
        self.position_poll_interval = interval;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }

    pub fn initial_volume(mut self, level: f32) -> Self {
        self.initial_volume = level;
        self
    }

    /// Bound the artwork cache. Unbounded when never called.
    pub fn artwork_cache_capacity(mut self, capacity: usize) -> Self {
        self.artwork_cache_capacity = Some(capacity);
        self
    }

    pub fn artwork_max_dimension(mut self, dimension: Option<u32>) -> Self {
        self.artwork_max_dimension = dimension;
        self
    }

    pub fn enable_artwork(mut self, enabled: bool) -> Self {
        self.features.enable_artwork = enabled;
        self
    }

    pub fn persist_resume_point(mut self, enabled: bool) -> Self {
        self.features.persist_resume_point = enabled;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when the engine factory or catalog is absent
    /// - [`Error::Config`] when a value is out of range or a feature lacks its bridge
    pub fn build(self) -> Result<CoreConfig> {
        let engine_factory = self
            .engine_factory
            .ok_or_else(|| Error::CapabilityMissing {
                capability: "MediaEngineFactory".to_string(),
                message: "No media engine factory provided. \
                          Inject the platform player adapter with .engine_factory()."
                    .to_string(),
            })?;

        let catalog = self.catalog.ok_or_else(|| Error::CapabilityMissing {
            capability: "CatalogLookup".to_string(),
            message: "No catalog lookup provided. \
                      Inject the host media catalog with .catalog()."
                .to_string(),
        })?;

        let config = CoreConfig {
            engine_factory,
            catalog,
            artwork_backend: self.artwork_backend,
            settings_store: self.settings_store,
            notification_sink: self.notification_sink,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            position_poll_interval: self.position_poll_interval,
            event_buffer_size: self.event_buffer_size,
            initial_volume: self.initial_volume,
            artwork_cache_capacity: self.artwork_cache_capacity,
            artwork_max_dimension: self.artwork_max_dimension,
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}
