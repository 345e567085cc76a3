//! Selection strategy contract
//!
//! A strategy decides what to queue when the user queued nothing. The
//! engine hands it the items that must not be returned; everything else
//! (fairness, randomness) is up to the implementation.

use juke_core::{Item, ItemKey};
use std::collections::HashSet;

/// Items a strategy must not return
///
/// Built fresh for every request from now-playing, coming-up and the queue.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSet {
    keys: HashSet<ItemKey>,
}

impl ExclusionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: &Item) {
        self.keys.insert(item.key());
    }

    pub fn insert_key(&mut self, key: ItemKey) {
        self.keys.insert(key);
    }

    pub fn contains(&self, item: &Item) -> bool {
        self.keys.contains(&item.key())
    }

    pub fn keys(&self) -> impl Iterator<Item = &ItemKey> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether a strategy may return `item`
    pub fn permits(&self, item: &Item) -> bool {
        !item.is_blocked() && !self.contains(item)
    }
}

impl<'a> FromIterator<&'a Item> for ExclusionSet {
    fn from_iter<I: IntoIterator<Item = &'a Item>>(iter: I) -> Self {
        let mut set = Self::new();
        for item in iter {
            set.insert(item);
        }
        set
    }
}

/// Picks the next item to queue
///
/// Must never return an item contained in `exclusions` or a blocked item,
/// and must not change library contents or item flags. Returns `None` when
/// nothing is eligible.
pub trait SelectionStrategy: Send {
    fn next(&mut self, exclusions: &ExclusionSet) -> Option<Item>;
}

impl<F> SelectionStrategy for F
where
    F: FnMut(&ExclusionSet) -> Option<Item> + Send,
{
    fn next(&mut self, exclusions: &ExclusionSet) -> Option<Item> {
        self(exclusions)
    }
}
