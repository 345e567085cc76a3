/// Core error types for Juke Player
use thiserror::Error;

/// Result type alias using `JukeError`
pub type Result<T> = std::result::Result<T, JukeError>;

/// Core error type for Juke Player
#[derive(Error, Debug)]
pub enum JukeError {
    /// Audio backend errors (opening, loading, output)
    #[error("Audio error: {0}")]
    Audio(String),

    /// No provider registered under the given id
    #[error("Library provider not found: {0}")]
    ProviderNotFound(String),

    /// Library maintenance errors, returned by providers whose scan fails
    #[error("Library error: {0}")]
    Library(String),
}

impl JukeError {
    /// Create an audio error
    pub fn audio(msg: impl Into<String>) -> Self {
        Self::Audio(msg.into())
    }

    /// Create a library error
    pub fn library(msg: impl Into<String>) -> Self {
        Self::Library(msg.into())
    }
}
