//! Resume point persistence.
//!
//! After every successful play flow the controller records the queue
//! position and media id in the host's [`SettingsStore`], so the next session
//! can offer to pick up where the listener left off.

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::SettingsStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

pub const QUEUE_POSITION_KEY: &str = "playback.queue_position";
pub const LAST_MEDIA_ID_KEY: &str = "playback.last_media_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumePoint {
    pub queue_position: usize,
    pub media_id: String,
}

#[derive(Clone)]
pub struct ResumeStore {
    store: Arc<dyn SettingsStore>,
}

impl ResumeStore {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    pub async fn save(&self, point: &ResumePoint) -> BridgeResult<()> {
        let position = i64::try_from(point.queue_position).unwrap_or(i64::MAX);
        self.store.set_i64(QUEUE_POSITION_KEY, position).await?;
        self.store
            .set_string(LAST_MEDIA_ID_KEY, &point.media_id)
            .await
    }

    /// Last saved point, or `None` if nothing usable was stored.
    ///
    /// Read failures are logged and treated as "nothing stored".
    pub async fn load(&self) -> Option<ResumePoint> {
        match self.read().await {
            Ok(point) => point,
            Err(e) => {
                warn!("Failed to read resume point: {}", e);
                None
            }
        }
    }

    pub async fn clear(&self) -> BridgeResult<()> {
        self.store.delete(QUEUE_POSITION_KEY).await?;
        self.store.delete(LAST_MEDIA_ID_KEY).await
    }

    async fn read(&self) -> BridgeResult<Option<ResumePoint>> {
        let Some(media_id) = self.store.get_string(LAST_MEDIA_ID_KEY).await? else {
            return Ok(None);
        };
        let position = self.store.get_i64(QUEUE_POSITION_KEY).await?.unwrap_or(0);

        Ok(usize::try_from(position)
            .ok()
            .map(|queue_position| ResumePoint {
                queue_position,
                media_id,
            }))
    }
}

impl fmt::Debug for ResumeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResumeStore").finish_non_exhaustive()
    }
}
