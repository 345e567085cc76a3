//! Session harness for unit tests
//!
//! Builds sessions on the scripted backend from `juke_core::test_utils` and
//! collects their events so a test can deliver them by hand.

use crate::events::{SessionEvent, SessionEventSink};
use crate::session::PlaybackSession;
use juke_core::test_utils::MockProvider;
use juke_core::{Item, ProviderRegistry};
use std::sync::{Arc, Mutex};

pub use juke_core::test_utils::{item, ResourceCall, ResourceLog};

/// Mock provider plus a sink that collects session events
pub struct Harness {
    pub log: Arc<ResourceLog>,
    pub registry: Arc<ProviderRegistry>,
    provider: Arc<MockProvider>,
    events: Arc<Mutex<Vec<SessionEvent>>>,
    sink: SessionEventSink,
}

impl Harness {
    pub fn new() -> Self {
        let provider = Arc::new(MockProvider::new());
        let log = Arc::clone(&provider.log);
        let registry = Arc::new(ProviderRegistry::new().with(provider.clone()));
        let events = Arc::new(Mutex::new(Vec::new()));
        let collected = Arc::clone(&events);
        let sink: SessionEventSink = Arc::new(move |event| collected.lock().unwrap().push(event));

        Self {
            log,
            registry,
            provider,
            events,
            sink,
        }
    }

    /// Items with this title fail to open
    pub fn failing(self, title: &str) -> Self {
        self.provider.fail(title);
        self
    }

    /// Items with this title stay `Opening` until the test emits `ReadyToPlay`
    pub fn manual_ready(self, title: &str) -> Self {
        self.provider.manual_ready(title);
        self
    }

    pub fn sink(&self) -> SessionEventSink {
        Arc::clone(&self.sink)
    }

    pub fn session(&self, title: &str) -> PlaybackSession {
        self.session_for(item(title))
    }

    pub fn session_for(&self, item: Item) -> PlaybackSession {
        PlaybackSession::new(item, Arc::clone(&self.registry), self.sink())
    }

    pub fn take_events(&self) -> Vec<SessionEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }

    /// Apply all pending events to `session`
    pub fn deliver(&self, session: &mut PlaybackSession) {
        loop {
            let events = self.take_events();
            if events.is_empty() {
                break;
            }
            for event in &events {
                session.apply(event);
            }
        }
    }
}
