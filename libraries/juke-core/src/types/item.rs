/// Playable item types
use super::ProviderId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Identity of an item for de-duplication
///
/// Two items are the same item only if title, artist, album and provider all
/// match. Flags and durations are not part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub provider_id: ProviderId,
    pub title: String,
    pub artist: String,
    pub album: String,
}

/// One playable unit
///
/// Clones share their flags: marking a clone as played (or blocked) is seen by
/// the library copy and by every session holding the same fetched item.
#[derive(Clone, Serialize, Deserialize)]
pub struct Item {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub provider_id: ProviderId,

    /// Descriptive tags (genre, mood, ...)
    #[serde(default)]
    pub tags: BTreeSet<String>,

    #[serde(default, with = "shared_flags")]
    flags: Arc<ItemFlags>,
}

#[derive(Debug, Default)]
struct ItemFlags {
    played_already: AtomicBool,
    blocked: AtomicBool,
    /// 0 = not resolved yet
    duration_ms: AtomicU64,
}

impl Item {
    /// Create a new item with no duration and cleared flags
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
        provider_id: ProviderId,
    ) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            album: album.into(),
            provider_id,
            tags: BTreeSet::new(),
            flags: Arc::default(),
        }
    }

    /// Builder-style duration setter
    #[must_use]
    pub fn with_duration(self, duration: Duration) -> Self {
        self.set_duration(duration);
        self
    }

    /// Builder-style tag setter
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    /// De-duplication identity
    pub fn key(&self) -> ItemKey {
        ItemKey {
            provider_id: self.provider_id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            album: self.album.clone(),
        }
    }

    /// Whether title, artist and album match, ignoring the provider
    pub fn same_tuple(&self, other: &Item) -> bool {
        self.title == other.title && self.artist == other.artist && self.album == other.album
    }

    pub fn played_already(&self) -> bool {
        self.flags.played_already.load(Ordering::Acquire)
    }

    /// Mark as played
    ///
    /// Returns `true` only for the call that flipped the flag.
    pub fn mark_played(&self) -> bool {
        self.flags
            .played_already
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Overwrite the played flag (library rescans restore it from history)
    pub fn set_played_already(&self, played: bool) {
        self.flags.played_already.store(played, Ordering::Release);
    }

    pub fn is_blocked(&self) -> bool {
        self.flags.blocked.load(Ordering::Acquire)
    }

    pub fn set_blocked(&self, blocked: bool) {
        self.flags.blocked.store(blocked, Ordering::Release);
    }

    /// Length, once some backend resolved it
    pub fn duration(&self) -> Option<Duration> {
        match self.flags.duration_ms.load(Ordering::Acquire) {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn set_duration(&self, duration: Duration) {
        let ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.flags.duration_ms.store(ms, Ordering::Release);
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.provider_id == other.provider_id && self.same_tuple(other)
    }
}

impl Eq for Item {}

impl Hash for Item {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.provider_id.hash(state);
        self.title.hash(state);
        self.artist.hash(state);
        self.album.hash(state);
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("title", &self.title)
            .field("artist", &self.artist)
            .field("album", &self.album)
            .field("provider_id", &self.provider_id)
            .field("played_already", &self.played_already())
            .field("blocked", &self.is_blocked())
            .field("duration", &self.duration())
            .finish()
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.artist, self.title)
    }
}

/// Serializes the shared flags as plain values
mod shared_flags {
    use super::ItemFlags;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Arc;

    #[derive(Serialize, Deserialize)]
    struct Flags {
        played_already: bool,
        blocked: bool,
        duration_ms: Option<u64>,
    }

    pub fn serialize<S: Serializer>(flags: &Arc<ItemFlags>, serializer: S) -> Result<S::Ok, S::Error> {
        let duration_ms = match flags.duration_ms.load(Ordering::Acquire) {
            0 => None,
            ms => Some(ms),
        };
        Flags {
            played_already: flags.played_already.load(Ordering::Acquire),
            blocked: flags.blocked.load(Ordering::Acquire),
            duration_ms,
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Arc<ItemFlags>, D::Error> {
        let flags = Flags::deserialize(deserializer)?;
        Ok(Arc::new(ItemFlags {
            played_already: AtomicBool::new(flags.played_already),
            blocked: AtomicBool::new(flags.blocked),
            duration_ms: AtomicU64::new(flags.duration_ms.unwrap_or(0)),
        }))
    }
}
