//! In-memory music library

use crate::traits::MusicLibrary;
use crate::types::{Item, ItemKey};
use std::sync::{PoisonError, RwLock};

/// Music library kept entirely in memory
///
/// Sufficient for hosts that rebuild the library from their providers on
/// every start.
#[derive(Debug, Default)]
pub struct InMemoryLibrary {
    items: RwLock<Vec<Item>>,
}

impl InMemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a library pre-filled with `items`
    pub fn with_items(items: impl IntoIterator<Item = Item>) -> Self {
        Self {
            items: RwLock::new(items.into_iter().collect()),
        }
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MusicLibrary for InMemoryLibrary {
    fn items(&self) -> Vec<Item> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn add(&self, item: Item) {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item);
    }

    fn remove(&self, key: &ItemKey) -> bool {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let before = items.len();
        items.retain(|item| &item.key() != key);
        items.len() != before
    }
}
