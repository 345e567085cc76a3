//! Playback Events
//!
//! Two kinds of events flow through the engine:
//! - `SessionEvent`: backend notifications tagged with the session they belong
//!   to, marshalled onto the owning context
//! - `BusMessage`: domain events published on the message bus, plus inbound
//!   player commands

use juke_core::{Item, ResourceEvent, SessionId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Backend event tagged with its session
///
/// `epoch` counts how often the session has been prepared, so events from a
/// resource released by an earlier `close()` never reach the reopened session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionEvent {
    pub session_id: SessionId,
    pub epoch: u32,
    pub event: ResourceEvent,
}

/// Where sessions deliver their tagged events
pub type SessionEventSink = Arc<dyn Fn(SessionEvent) + Send + Sync>;

/// Coarse playback state published on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackStateEvent {
    Playing,
    /// Also used for stopped and closed
    Paused,
}

/// Commands other components send to the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerCommand {
    Play,
    Pause,
    TogglePlayPause,
    /// Skip to the coming-up item with crossfade
    Next,
}

/// Bus topics handlers can register for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    NowPlaying,
    PlaybackState,
    Playlist,
    Progress,
    Volume,
    Starvation,
    ItemFailed,
    PlayerCommand,
}

/// Messages carried by the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BusMessage {
    /// The now-playing item changed (`None` when playback ran dry)
    NowPlayingChanged { item: Option<Item> },

    /// Now-playing started or stopped playing
    PlaybackState { state: PlaybackStateEvent },

    /// Coming-up slot or queue changed
    PlaylistChanged,

    /// Position or resolved length of the now-playing item changed
    Progress {
        position: Duration,
        length: Option<Duration>,
    },

    /// Master volume changed
    VolumeChanged { level: u8, muted: bool },

    /// Neither the queue nor the selection strategy could supply an item
    QueueStarved,

    /// The now-playing item ended or failed and nothing could follow it
    PlaybackFinished,

    /// An item could not be opened and was skipped
    ItemFailed { item: Item, reason: String },

    /// Inbound command for the player
    Command(PlayerCommand),
}

impl BusMessage {
    pub fn topic(&self) -> Topic {
        match self {
            Self::NowPlayingChanged { .. } => Topic::NowPlaying,
            Self::PlaybackState { .. } => Topic::PlaybackState,
            Self::PlaylistChanged => Topic::Playlist,
            Self::Progress { .. } => Topic::Progress,
            Self::VolumeChanged { .. } => Topic::Volume,
            Self::QueueStarved | Self::PlaybackFinished => Topic::Starvation,
            Self::ItemFailed { .. } => Topic::ItemFailed,
            Self::Command(_) => Topic::PlayerCommand,
        }
    }
}
