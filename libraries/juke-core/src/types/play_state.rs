/// Session state and backend event types
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// State of one playback session
///
/// `Closed -> Opening -> (ReadyToPlay | Error) -> Playing <-> Paused -> Stopped/Ended -> Closed`
///
/// `Closed` is both the initial and the terminal state; a closed session can
/// be opened again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayState {
    #[default]
    Closed,
    Opening,
    ReadyToPlay,
    Playing,
    Paused,
    Stopped,
    Ended,
    Error,
}

impl PlayState {
    /// Convert to string representation
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Opening => "opening",
            Self::ReadyToPlay => "ready_to_play",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Ended => "ended",
            Self::Error => "error",
        }
    }

    /// Whether `play()` is accepted in this state
    #[must_use]
    pub fn can_play(&self) -> bool {
        matches!(self, Self::ReadyToPlay | Self::Paused | Self::Stopped)
    }

    /// Whether `pause()`/`stop()` are accepted in this state
    #[must_use]
    pub fn can_pause(&self) -> bool {
        matches!(self, Self::Playing)
    }
}

impl std::fmt::Display for PlayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Change notification reported by an audio backend
///
/// Backends may report from any thread; the engine marshals these onto its
/// owning context before looking at them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceEvent {
    /// Backend moved to a new state
    StateChanged { state: PlayState },

    /// Playback position advanced
    PositionChanged { position: Duration },

    /// Total length became known
    LengthResolved { length: Duration },

    /// Buffering progress (0.0 - 1.0)
    BufferProgress { progress: f32 },
}
