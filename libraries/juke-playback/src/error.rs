//! Error types for playback orchestration

use juke_core::{JukeError, SessionId};
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No session with this id is queued
    #[error("Session not queued: {0}")]
    SessionNotQueued(SessionId),

    /// The owning dispatch loop has shut down
    #[error("Dispatcher closed")]
    DispatcherClosed,

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error from a core collaborator
    #[error(transparent)]
    Core(#[from] JukeError),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
