//! Lookup of library providers by id

use crate::error::{JukeError, Result};
use crate::traits::LibraryProvider;
use crate::types::ProviderId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Registered library providers
///
/// Built once by the host and handed to the engine.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderId, Arc<dyn LibraryProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider, replacing any previous one with the same id
    pub fn register(&mut self, provider: Arc<dyn LibraryProvider>) {
        self.providers.insert(provider.id().clone(), provider);
    }

    /// Builder-style registration
    #[must_use]
    pub fn with(mut self, provider: Arc<dyn LibraryProvider>) -> Self {
        self.register(provider);
        self
    }

    pub fn get(&self, id: &ProviderId) -> Option<Arc<dyn LibraryProvider>> {
        self.providers.get(id).cloned()
    }

    /// Like [`get`](Self::get), but a missing provider is an error
    pub fn require(&self, id: &ProviderId) -> Result<Arc<dyn LibraryProvider>> {
        self.get(id)
            .ok_or_else(|| JukeError::ProviderNotFound(id.to_string()))
    }

    /// All providers, ordered by id
    pub fn providers(&self) -> Vec<Arc<dyn LibraryProvider>> {
        let mut ids: Vec<_> = self.providers.keys().collect();
        ids.sort();
        ids.into_iter()
            .filter_map(|id| self.providers.get(id).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.providers.keys()).finish()
    }
}
