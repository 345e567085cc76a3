/// CLI configuration
use anyhow::{bail, Context, Result};
use juke_playback::{PlaybackConfig, ShuffleMode};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JukeConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default = "default_library")]
    pub library: LibrarySettings,

    #[serde(default = "default_simulation")]
    pub simulation: SimulationSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibrarySettings {
    /// Songs in the generated library
    #[serde(default = "default_songs")]
    pub songs: usize,

    #[serde(default = "default_artists")]
    pub artists: usize,

    #[serde(default = "default_shuffle")]
    pub shuffle: ShuffleMode,

    /// Fixed seed for reproducible libraries and picks
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SimulationSettings {
    /// Length of every simulated song
    #[serde(default = "default_song_length_ms")]
    pub song_length_ms: u64,

    /// Delay between load() and ReadyToPlay
    #[serde(default = "default_open_delay_ms")]
    pub open_delay_ms: u64,

    /// Interval of position reports while playing
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    /// Every n-th song fails to open (0 = never)
    #[serde(default)]
    pub fail_every: usize,
}

impl JukeConfig {
    /// Load configuration from an optional TOML file and the environment
    ///
    /// Environment variables are prefixed with `JUKE_` and use `__` between
    /// section and key, e.g. `JUKE_PLAYBACK__CROSSFADE_MS=500`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                bail!("Config file not found: {}", path.display());
            }
            settings = settings.add_source(config::File::from(path));
        } else if Path::new("juke.toml").exists() {
            settings = settings.add_source(config::File::with_name("juke.toml"));
        }

        settings = settings.add_source(
            config::Environment::with_prefix("JUKE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = settings
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.playback.validate()?;

        if self.library.songs == 0 {
            bail!("library.songs must be at least 1");
        }
        if self.library.artists == 0 {
            bail!("library.artists must be at least 1");
        }
        if self.simulation.song_length_ms == 0 {
            bail!("simulation.song_length_ms must be at least 1");
        }
        if self.simulation.tick_ms == 0 {
            bail!("simulation.tick_ms must be at least 1");
        }

        Ok(())
    }
}

impl Default for JukeConfig {
    fn default() -> Self {
        Self {
            playback: PlaybackConfig::default(),
            library: default_library(),
            simulation: default_simulation(),
        }
    }
}

// Default values
fn default_library() -> LibrarySettings {
    LibrarySettings {
        songs: default_songs(),
        artists: default_artists(),
        shuffle: default_shuffle(),
        seed: None,
    }
}

fn default_songs() -> usize {
    24
}

fn default_artists() -> usize {
    6
}

fn default_shuffle() -> ShuffleMode {
    ShuffleMode::Smart
}

fn default_simulation() -> SimulationSettings {
    SimulationSettings {
        song_length_ms: default_song_length_ms(),
        open_delay_ms: default_open_delay_ms(),
        tick_ms: default_tick_ms(),
        fail_every: 0,
    }
}

fn default_song_length_ms() -> u64 {
    8000
}

fn default_open_delay_ms() -> u64 {
    50
}

fn default_tick_ms() -> u64 {
    250
}
