//! Settings Storage
//!
//! Key-value preferences storage, used by the core to remember where the
//! listener left off between sessions.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::error::Result;

/// Key-value settings storage trait
///
/// Abstracts platform-specific preferences/settings storage:
/// - iOS: UserDefaults
/// - Android: SharedPreferences / DataStore
/// - Desktop: Config files or OS-specific preferences
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn remember(store: &dyn SettingsStore, media_id: &str) -> Result<()> {
///     store.set_string("playback.last_media_id", media_id).await?;
///     store.set_i64("playback.queue_position", 3).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    async fn set_i64(&self, key: &str, value: i64) -> Result<()>;

    async fn get_i64(&self, key: &str) -> Result<Option<i64>>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn has_key(&self, key: &str) -> Result<bool>;
}

#[derive(Debug, Clone)]
enum StoredValue {
    Text(String),
    Int(i64),
}

/// Process-local settings store for tests, demos and hosts without
/// persistent preferences. Values do not survive a restart.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    values: Mutex<HashMap<String, StoredValue>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn set_string(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .lock()
            .insert(key.to_string(), StoredValue::Text(value.to_string()));
        Ok(())
    }

    async fn get_string(&self, key: &str) -> Result<Option<String>> {
        Ok(match self.values.lock().get(key) {
            Some(StoredValue::Text(value)) => Some(value.clone()),
            _ => None,
        })
    }

    async fn set_i64(&self, key: &str, value: i64) -> Result<()> {
        self.values
            .lock()
            .insert(key.to_string(), StoredValue::Int(value));
        Ok(())
    }

    async fn get_i64(&self, key: &str) -> Result<Option<i64>> {
        Ok(match self.values.lock().get(key) {
            Some(StoredValue::Int(value)) => Some(*value),
            _ => None,
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.values.lock().remove(key);
        Ok(())
    }

    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.values.lock().contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemorySettingsStore::new();
        store.set_string("last", "track-7").await.unwrap();
        store.set_i64("position", 4).await.unwrap();

        assert_eq!(store.get_string("last").await.unwrap().as_deref(), Some("track-7"));
        assert_eq!(store.get_i64("position").await.unwrap(), Some(4));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_memory_store_type_mismatch_reads_none() {
        let store = MemorySettingsStore::new();
        store.set_i64("position", 4).await.unwrap();

        assert_eq!(store.get_string("position").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_store_delete() {
        let store = MemorySettingsStore::new();
        store.set_string("last", "track-7").await.unwrap();
        store.delete("last").await.unwrap();

        assert!(!store.has_key("last").await.unwrap());
        assert!(store.is_empty());
    }
}
