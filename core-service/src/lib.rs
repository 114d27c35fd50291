//! Core service façade and bootstrap.
//!
//! This crate wires host-provided bridge implementations (media engine,
//! catalog, artwork backend, settings, notification surface) into the
//! playback core. Hosts build a [`CoreConfig`], call [`CoreService::start`]
//! and then drive playback through [`CoreService::handle`] or
//! [`CoreService::session`].

pub mod error;

pub use error::{CoreError, Result};

pub use core_playback::{
    PlayOptions, PlaybackHandle, PlaybackObserver, PlaybackState, PlaybackStatus, ResumePoint,
    SessionBridge, SubscriptionId, TransportCommand,
};
pub use core_runtime::{CoreConfig, CoreConfigBuilder, CoreEvent, EventBus, EventStream};

use core_metadata::ArtworkFetcher;
use core_playback::{
    ControllerOptions, EventBusObserver, NotificationPresenter, PlaybackController, PlaybackError,
    ResumeStore, SessionPublisher,
};
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

struct ServiceInner {
    handle: PlaybackHandle,
    session: SessionBridge,
    events: EventBus,
    resume: Option<ResumeStore>,
    artwork: Option<ArtworkFetcher>,
    observers: Mutex<Vec<SubscriptionId>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Primary façade exposed to host applications.
///
/// Cheap to clone; clones drive the same controller.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<ServiceInner>,
}

impl CoreService {
    /// Validate `config`, build every component and spawn the controller.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`CoreError::Config`] when the configuration is inconsistent
    /// - [`CoreError::InitializationFailed`] outside a Tokio runtime
    pub fn start(config: CoreConfig) -> Result<Self> {
        config.validate()?;
        tokio::runtime::Handle::try_current()
            .map_err(|e| CoreError::InitializationFailed(e.to_string()))?;

        let events = EventBus::new(config.event_buffer_size);
        let publisher = SessionPublisher::new();
        let mut observers =
            vec![publisher.subscribe(Arc::new(EventBusObserver::new(events.clone())))];
        let mut tasks = Vec::new();

        if let Some(sink) = config.notification_sink.clone() {
            let (presenter, presenter_task) = NotificationPresenter::spawn(sink);
            observers.push(publisher.subscribe(presenter));
            tasks.push(presenter_task);
        }

        let artwork = match (&config.artwork_backend, config.features.enable_artwork) {
            (Some(backend), true) => Some(ArtworkFetcher::new(
                Arc::clone(backend),
                config.artwork_cache_capacity.and_then(NonZeroUsize::new),
                config.artwork_max_dimension,
            )),
            _ => None,
        };

        let resume = match (&config.settings_store, config.features.persist_resume_point) {
            (Some(store), true) => Some(ResumeStore::new(Arc::clone(store))),
            _ => None,
        };

        let mut controller = PlaybackController::new(
            Arc::clone(&config.engine_factory),
            Arc::clone(&config.catalog),
            publisher.clone(),
        )
        .with_clock(Arc::clone(&config.clock))
        .with_options(ControllerOptions {
            position_poll_interval: config.position_poll_interval,
            initial_volume: config.initial_volume,
        });

        if let Some(fetcher) = &artwork {
            controller = controller.with_artwork(fetcher.clone());
        }
        if let Some(store) = &resume {
            controller = controller.with_resume_store(store.clone());
        }

        let (handle, controller_task) = controller.spawn();
        tasks.insert(0, controller_task);

        info!(
            artwork = artwork.is_some(),
            resume = resume.is_some(),
            notifications = config.notification_sink.is_some(),
            "Core service started"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                session: SessionBridge::new(handle.clone(), publisher),
                handle,
                events,
                resume,
                artwork,
                observers: Mutex::new(observers),
                tasks: Mutex::new(tasks),
            }),
        })
    }

    /// Command surface of the playback controller.
    pub fn handle(&self) -> PlaybackHandle {
        self.inner.handle.clone()
    }

    /// Media-session surface: transport commands in, observers out.
    pub fn session(&self) -> &SessionBridge {
        &self.inner.session
    }

    /// Typed event bus carrying playback, queue and artwork events.
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Last persisted resume point, if resume persistence is enabled.
    pub async fn resume_point(&self) -> Option<ResumePoint> {
        match &self.inner.resume {
            Some(store) => store.load().await,
            None => None,
        }
    }

    pub fn artwork_enabled(&self) -> bool {
        self.inner.artwork.is_some()
    }

    /// Stop the controller and wait for every background task to finish.
    ///
    /// Calling this more than once is harmless.
    pub async fn shutdown(&self) -> Result<()> {
        match self.inner.handle.shutdown().await {
            Ok(()) | Err(PlaybackError::ControllerClosed) => {}
            Err(e) => return Err(e.into()),
        }

        let observers = std::mem::take(&mut *self.inner.observers.lock());
        for id in observers {
            self.inner.session.unsubscribe(id);
        }

        let tasks = std::mem::take(&mut *self.inner.tasks.lock());
        debug!(tasks = tasks.len(), "Waiting for background tasks");
        for task in tasks {
            task.await
                .map_err(|e| CoreError::TaskFailed(e.to_string()))?;
        }

        info!("Core service stopped");
        Ok(())
    }
}

impl std::fmt::Debug for CoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreService")
            .field("handle", &self.inner.handle)
            .field("artwork", &self.inner.artwork.is_some())
            .field("resume", &self.inner.resume.is_some())
            .finish()
    }
}
