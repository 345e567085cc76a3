//! Play history tracking
//!
//! Bounded record of what has been played, used to restore "played already"
//! flags when the library is rescanned.

use chrono::{DateTime, Utc};
use juke_core::{Item, ItemKey, PlayHistory};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// One play
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub key: ItemKey,
    pub played_at: DateTime<Utc>,
}

/// Play history with bounded size
///
/// Ring buffer: once full, the oldest entries are discarded and those items
/// count as unplayed again.
#[derive(Debug)]
pub struct RecentHistory {
    /// History buffer (most recent = back)
    entries: Mutex<VecDeque<HistoryEntry>>,

    max_size: usize,
}

impl RecentHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(max_size)),
            max_size,
        }
    }

    /// All entries (oldest first)
    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<HistoryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RecentHistory {
    fn default() -> Self {
        Self::new(500)
    }
}

impl PlayHistory for RecentHistory {
    fn record(&self, item: &Item) {
        let mut entries = self.lock();
        if entries.len() >= self.max_size {
            entries.pop_front(); // Remove oldest
        }
        entries.push_back(HistoryEntry {
            key: item.key(),
            played_at: Utc::now(),
        });
    }

    fn was_played_already(&self, item: &Item) -> bool {
        let key = item.key();
        self.lock().iter().any(|entry| entry.key == key)
    }
}
