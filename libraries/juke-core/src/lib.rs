//! Juke Player Core
//!
//! Domain types, collaborator traits, and error handling shared by the
//! playback engine and its hosts.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Item`, `ItemKey`, `SessionId`, `PlayState`, `ResourceEvent`
//! - **Collaborator Traits**: `AudioResource`, `LibraryProvider`, `MusicLibrary`, `PlayHistory`
//! - **Wiring**: `ProviderRegistry` and an `InMemoryLibrary`
//! - **Error Handling**: Unified `JukeError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use juke_core::{InMemoryLibrary, Item, MusicLibrary, ProviderId};
//!
//! let provider = ProviderId::new("local");
//! let library = InMemoryLibrary::new();
//! library.add(Item::new("Intro", "The XX", "xx", provider.clone()));
//!
//! assert_eq!(library.items_for_provider(&provider).len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod library;
pub mod registry;
pub mod traits;
pub mod types;

#[cfg(feature = "test-utils")]
pub mod test_utils;

// Re-export commonly used types
pub use error::{JukeError, Result};
pub use library::InMemoryLibrary;
pub use registry::ProviderRegistry;
pub use traits::{
    AudioResource, LibraryCallback, LibraryProvider, MusicLibrary, PlayHistory, ResourceObserver,
};

pub use types::{Item, ItemKey, PlayState, ProviderId, ResourceEvent, SessionId};
