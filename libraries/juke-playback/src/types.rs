//! Core types for playback orchestration

use crate::error::{PlaybackError, Result};
use crate::fade::FadeCurve;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Playback configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Overlap of old and new item during a crossfade (default: 2000 ms)
    pub crossfade_ms: u64,

    /// Fade applied when pausing or resuming (default: 1000 ms)
    pub pause_fade_ms: u64,

    /// Fade curve handed to backends that ramp volume themselves
    pub fade_curve: FadeCurve,

    /// Initial master volume (0-255, default: 255)
    pub volume: u8,

    /// Start playing the first startup item right away (default: false)
    pub autoplay_on_startup: bool,

    /// Entries kept in the play history (default: 500)
    pub history_size: usize,

    /// Concurrent background maintenance tasks (default: 4)
    pub background_concurrency: usize,

    /// Buffered bus messages per subscriber (default: 256)
    pub bus_capacity: usize,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            crossfade_ms: 2000,
            pause_fade_ms: 1000,
            fade_curve: FadeCurve::EqualPower,
            volume: 255,
            autoplay_on_startup: false,
            history_size: 500,
            background_concurrency: 4,
            bus_capacity: 256,
        }
    }
}

impl PlaybackConfig {
    pub fn crossfade(&self) -> Duration {
        Duration::from_millis(self.crossfade_ms)
    }

    pub fn pause_fade(&self) -> Duration {
        Duration::from_millis(self.pause_fade_ms)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.background_concurrency == 0 {
            return Err(PlaybackError::InvalidConfig(
                "background_concurrency must be at least 1".to_string(),
            ));
        }
        if self.bus_capacity == 0 {
            return Err(PlaybackError::InvalidConfig(
                "bus_capacity must be at least 1".to_string(),
            ));
        }
        if self.history_size == 0 {
            return Err(PlaybackError::InvalidConfig(
                "history_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of an advance request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvanceOutcome {
    /// The coming-up item is now playing and a new one is coming up
    Advanced,

    /// Advanced, but nothing could be found to come up next
    AdvancedStarved,

    /// Nothing to advance to; now-playing was left untouched
    Starved,
}

impl AdvanceOutcome {
    pub fn advanced(&self) -> bool {
        !matches!(self, Self::Starved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PlaybackConfig::default();
        assert_eq!(config.crossfade(), Duration::from_secs(2));
        assert_eq!(config.pause_fade(), Duration::from_secs(1));
        assert_eq!(config.volume, 255);
        assert!(!config.autoplay_on_startup);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = PlaybackConfig {
            background_concurrency: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PlaybackError::InvalidConfig(_))
        ));
    }

    #[test]
    fn partial_config_uses_defaults() {
        let config: PlaybackConfig = serde_json::from_str(r#"{"crossfade_ms": 500}"#).unwrap();
        assert_eq!(config.crossfade_ms, 500);
        assert_eq!(config.pause_fade_ms, 1000);
    }
}
