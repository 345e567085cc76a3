//! Default selection strategy: random pick among unplayed items
//!
//! Two modes:
//! - Random: uniform over all eligible items
//! - Smart: prefers artists not currently playing, coming up or queued

use crate::strategy::{ExclusionSet, SelectionStrategy};
use juke_core::{Item, MusicLibrary};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Shuffle mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShuffleMode {
    /// Uniform random pick
    #[default]
    Random,

    /// Avoid artists that are already playing or queued (when possible)
    Smart,
}

/// Picks items that have not been played yet
pub struct UnplayedShuffler {
    library: Arc<dyn MusicLibrary>,
    mode: ShuffleMode,
    rng: StdRng,
}

impl UnplayedShuffler {
    pub fn new(library: Arc<dyn MusicLibrary>, mode: ShuffleMode) -> Self {
        Self {
            library,
            mode,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic picks for reproducible runs
    pub fn with_seed(library: Arc<dyn MusicLibrary>, mode: ShuffleMode, seed: u64) -> Self {
        Self {
            library,
            mode,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn mode(&self) -> ShuffleMode {
        self.mode
    }

    fn pick_smart(&mut self, candidates: &[Item], exclusions: &ExclusionSet) -> Option<Item> {
        let busy_artists: HashSet<&str> = exclusions.keys().map(|k| k.artist.as_str()).collect();
        let fresh: Vec<&Item> = candidates
            .iter()
            .filter(|item| !busy_artists.contains(item.artist.as_str()))
            .collect();

        match fresh.choose(&mut self.rng) {
            Some(item) => Some((*item).clone()),
            None => candidates.choose(&mut self.rng).cloned(),
        }
    }
}

impl SelectionStrategy for UnplayedShuffler {
    fn next(&mut self, exclusions: &ExclusionSet) -> Option<Item> {
        let candidates: Vec<Item> = self
            .library
            .items()
            .into_iter()
            .filter(|item| !item.played_already() && exclusions.permits(item))
            .collect();

        match self.mode {
            ShuffleMode::Random => candidates.choose(&mut self.rng).cloned(),
            ShuffleMode::Smart => self.pick_smart(&candidates, exclusions),
        }
    }
}
