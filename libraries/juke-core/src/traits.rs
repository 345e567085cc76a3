/// Collaborator traits for Juke Player
use crate::error::Result;
use crate::types::{Item, ItemKey, ProviderId, ResourceEvent};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Callback a backend invokes for every change of one resource
pub type ResourceObserver = Arc<dyn Fn(ResourceEvent) + Send + Sync>;

/// Handle to one opened (or openable) audio resource
///
/// Implemented by the concrete audio backend. The engine never shares a handle
/// between sessions; closing the owning session releases it.
///
/// Commands are requests: the backend reports the resulting state through the
/// subscribed observer, possibly from another thread and after the call
/// returned.
pub trait AudioResource: Send {
    /// Start opening/buffering the resource
    ///
    /// Completion is reported as `ReadyToPlay` (or `Error`).
    ///
    /// # Errors
    /// Returns an error if the request could not be issued at all
    fn load(&mut self) -> Result<()>;

    fn play(&mut self);

    fn pause(&mut self);

    fn stop(&mut self);

    /// Move the playback position
    ///
    /// The new position is reported as `PositionChanged`.
    fn seek(&mut self, position: Duration);

    /// Ramp volume up from silence to the configured volume
    fn fade_in(&mut self, duration: Duration);

    /// Ramp volume down to silence
    fn fade_out(&mut self, duration: Duration);

    /// Set output volume (0 - 255)
    fn set_volume(&mut self, volume: u8);

    /// Register the observer that receives change notifications
    fn subscribe(&mut self, observer: ResourceObserver);

    /// Drop the registered observer; no events are reported afterwards
    fn unsubscribe(&mut self);

    /// Release the resource
    fn close(&mut self);
}

/// Receives library changes while a provider updates
pub trait LibraryCallback: Send + Sync {
    /// Add a newly discovered item
    ///
    /// Returns `false` if the library already knows an item with the same
    /// title, artist and album.
    fn add_item(&self, item: Item) -> bool;

    /// Remove an item that no longer exists at its source
    fn remove_item(&self, item: &Item) -> bool;

    /// Metadata of an existing item changed
    fn update_item(&self, item: &Item) -> bool;
}

/// Source of playable items (local folder, network share, streaming service)
#[async_trait]
pub trait LibraryProvider: Send + Sync {
    /// Stable provider identity, stored in every item it supplies
    fn id(&self) -> &ProviderId;

    /// Create a resource handle for one of this provider's items
    ///
    /// # Errors
    /// Returns an error if the item cannot be opened by this provider
    fn retrieve_audio_resource(&self, item: &Item) -> Result<Box<dyn AudioResource>>;

    /// Re-scan the source and report differences against `existing`
    ///
    /// Providers without a scan step keep the default.
    ///
    /// # Errors
    /// Returns an error if the source could not be scanned
    async fn update(&self, existing: Vec<Item>, callback: &dyn LibraryCallback) -> Result<()> {
        let _ = (existing, callback);
        Ok(())
    }
}

/// The music library
///
/// Storage is the host's business; the engine only reads items and marks
/// them.
pub trait MusicLibrary: Send + Sync {
    /// All known items
    fn items(&self) -> Vec<Item>;

    /// Items supplied by one provider
    fn items_for_provider(&self, provider_id: &ProviderId) -> Vec<Item> {
        self.items()
            .into_iter()
            .filter(|item| &item.provider_id == provider_id)
            .collect()
    }

    fn add(&self, item: Item);

    fn remove(&self, key: &ItemKey) -> bool;

    /// Rebuild derived indexes after a bulk change
    ///
    /// # Errors
    /// Returns an error if the library could not be rebuilt
    fn rebuild(&self) -> Result<()> {
        Ok(())
    }

    /// Persist the library
    ///
    /// # Errors
    /// Returns an error if the library could not be saved
    fn save(&self) -> Result<()> {
        Ok(())
    }
}

/// Record of what has been played
pub trait PlayHistory: Send + Sync {
    /// Called once when an item first starts playing
    fn record(&self, item: &Item);

    fn was_played_already(&self, item: &Item) -> bool;
}
