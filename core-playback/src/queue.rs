//! # Play Queue
//!
//! Ordered list of [`QueueItem`]s with a cursor on the current item.
//!
//! The cursor is `None` exactly when the queue is empty; otherwise it always
//! points at a valid index. `advance` and `rewind` wrap around the ends
//! (repeat-all), they never stop at a boundary.

use crate::error::{PlaybackError, Result};
use bridge_traits::QueueItem;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackQueue {
    items: Vec<QueueItem>,
    cursor: Option<usize>,
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a queue from items in order. The cursor starts on the first one.
    ///
    /// Items whose id is already present are skipped.
    pub fn from_items(items: impl IntoIterator<Item = QueueItem>) -> Self {
        let mut queue = Self::new();
        for item in items {
            queue.append(item);
        }
        queue
    }

    /// Add `item` at the end. The first item of an empty queue becomes current.
    ///
    /// Returns `false` and leaves the queue untouched when an item with the
    /// same media id is already queued.
    pub fn append(&mut self, item: QueueItem) -> bool {
        if self.position_of(&item.media_id).is_some() {
            return false;
        }

        self.items.push(item);
        if self.cursor.is_none() {
            self.cursor = Some(0);
        }
        true
    }

    /// Remove the item with `media_id`, keeping the cursor on a valid item.
    ///
    /// Removing an item at or before the cursor moves the cursor back by one
    /// (staying at 0 when it is already there). Returns the removed item.
    pub fn remove(&mut self, media_id: &str) -> Option<QueueItem> {
        let index = self.position_of(media_id)?;
        let removed = self.items.remove(index);

        self.cursor = match self.cursor {
            _ if self.items.is_empty() => None,
            Some(cursor) if index <= cursor => Some(cursor.saturating_sub(1)),
            other => other,
        };

        Some(removed)
    }

    /// Drop every item. Used when a new playlist replaces the old one.
    pub fn reset(&mut self) {
        self.items.clear();
        self.cursor = None;
    }

    /// Move to the next item, wrapping to the first after the last.
    pub fn advance(&mut self) -> Result<&QueueItem> {
        let len = self.items.len();
        let cursor = self.cursor.ok_or(PlaybackError::EmptyQueue)?;
        let next = (cursor + 1) % len;
        self.cursor = Some(next);
        Ok(&self.items[next])
    }

    /// Move to the previous item, wrapping to the last before the first.
    pub fn rewind(&mut self) -> Result<&QueueItem> {
        let len = self.items.len();
        let cursor = self.cursor.ok_or(PlaybackError::EmptyQueue)?;
        let previous = if cursor > 0 { cursor - 1 } else { len - 1 };
        self.cursor = Some(previous);
        Ok(&self.items[previous])
    }

    /// Put the cursor on an absolute position.
    pub fn jump_to(&mut self, index: usize) -> Result<&QueueItem> {
        if index >= self.items.len() {
            return Err(PlaybackError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        self.cursor = Some(index);
        Ok(&self.items[index])
    }

    pub fn current(&self) -> Option<&QueueItem> {
        self.cursor.map(|cursor| &self.items[cursor])
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn position_of(&self, media_id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.media_id == media_id)
    }

    pub fn get(&self, index: usize) -> Option<&QueueItem> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
