//! Juke Player - Playback Orchestration
//!
//! Decides what plays next and drives the transition to it.
//!
//! This crate provides:
//! - Playback sessions binding an item to a backend resource handle
//! - Playlist queue with a distinguished coming-up slot
//! - Pluggable selection strategy with an exclusion contract
//! - Crossfading advance with scheduled, cancellable close
//! - Owning-context dispatcher and an in-process message bus
//! - Bounded background tasks and library rescans
//!
//! # Architecture
//!
//! `juke-playback` never decodes audio. Backends implement
//! [`juke_core::AudioResource`] and report state changes as events; the
//! [`PlaybackController`] applies them on its owning [`Dispatcher`] loop,
//! filtered by session identity so late events from superseded sessions are
//! dropped.
//!
//! # Example
//!
//! ```rust,no_run
//! use juke_playback::{MessageBus, PlaybackConfig, Player, RecentHistory, ShuffleMode, UnplayedShuffler};
//! use juke_core::{InMemoryLibrary, ProviderRegistry};
//! use std::sync::Arc;
//!
//! # async fn run(registry: ProviderRegistry) -> juke_playback::Result<()> {
//! let library = Arc::new(InMemoryLibrary::new());
//! let player = Player::spawn(
//!     PlaybackConfig::default(),
//!     Arc::new(registry),
//!     Box::new(UnplayedShuffler::new(library, ShuffleMode::Smart)),
//!     Arc::new(RecentHistory::default()),
//!     MessageBus::default(),
//! )?;
//!
//! player.load_startup_items().await?;
//! player.play().await?;
//! player.play_next(true).await?;
//! player.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod bus;
mod controller;
pub mod dispatcher;
mod error;
pub mod events;
pub mod fade;
mod history;
mod player;
mod queue;
pub mod rescan;
mod session;
mod shuffle;
mod strategy;
pub mod tasks;
pub mod types;
mod volume;

#[cfg(test)]
mod test_support;

// Public exports
pub use bus::{MessageBus, Registration};
pub use controller::{ControllerDeps, PlaybackController};
pub use dispatcher::{DispatchLoop, Dispatcher, DispatcherTimer, TimerMode, WeakDispatcher};
pub use error::{PlaybackError, Result};
pub use events::{BusMessage, PlaybackStateEvent, PlayerCommand, SessionEvent, SessionEventSink, Topic};
pub use fade::{FadeCurve, FadeDirection, FadeRamp};
pub use history::{HistoryEntry, RecentHistory};
pub use player::Player;
pub use queue::PlaylistQueue;
pub use rescan::{LibraryRescanner, ScanCallback, ScanProgress, ScanSummary};
pub use session::{PlaybackSession, SessionChange, SessionFactory, SessionInfo};
pub use shuffle::{ShuffleMode, UnplayedShuffler};
pub use strategy::{ExclusionSet, SelectionStrategy};
pub use tasks::{run_with_max_concurrency, BackgroundTaskCoordinator, TaskError};
pub use types::{AdvanceOutcome, PlaybackConfig};
pub use volume::Volume;
