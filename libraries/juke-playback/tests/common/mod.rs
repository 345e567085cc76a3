//! Common test utilities: controller fixture over the scripted backend

#![allow(dead_code)]

use juke_core::{InMemoryLibrary, Item, PlayState, ProviderRegistry};
use juke_playback::dispatcher::{self, DispatchLoop, Dispatcher};
use juke_playback::{
    ControllerDeps, MessageBus, PlaybackConfig, PlaybackController, RecentHistory,
    SelectionStrategy, SessionEvent, SessionEventSink,
};
use std::sync::Arc;

pub use juke_core::test_utils::{item, MockProvider, ResourceCall, ResourceLog, TRACK_LENGTH};

pub fn song(title: &str) -> Item {
    item(title).with_duration(TRACK_LENGTH)
}

/// Registry holding one mock provider
pub fn registry() -> (Arc<MockProvider>, Arc<ProviderRegistry>) {
    let provider = Arc::new(MockProvider::new());
    let registry = Arc::new(ProviderRegistry::new().with(provider.clone()));
    (provider, registry)
}

/// Sink that drops every event
pub fn null_sink() -> SessionEventSink {
    Arc::new(|_: SessionEvent| {})
}

pub fn library(titles: &[&str]) -> Arc<InMemoryLibrary> {
    Arc::new(InMemoryLibrary::with_items(titles.iter().map(|t| song(t))))
}

/// Controller driven by hand through `pump()`
pub struct Fixture {
    pub controller: PlaybackController,
    pub provider: Arc<MockProvider>,
    pub history: Arc<RecentHistory>,
    pub bus: MessageBus,
    dispatch: DispatchLoop<PlaybackController>,
    _dispatcher: Dispatcher<PlaybackController>,
}

impl Fixture {
    pub fn new(strategy: Box<dyn SelectionStrategy>) -> Self {
        let (provider, registry) = registry();
        let (dispatcher, dispatch) = dispatcher::channel();
        let bus = MessageBus::default();
        let history = Arc::new(RecentHistory::default());
        let controller = PlaybackController::new(
            PlaybackConfig::default(),
            ControllerDeps {
                registry,
                strategy,
                bus: bus.clone(),
                history: history.clone(),
            },
            dispatcher.downgrade(),
        );

        Self {
            controller,
            provider,
            history,
            bus,
            dispatch,
            _dispatcher: dispatcher,
        }
    }

    /// Run everything queued on the controller's loop
    pub fn pump(&mut self) -> usize {
        self.dispatch.run_pending(&mut self.controller)
    }

    pub fn log(&self) -> &ResourceLog {
        &self.provider.log
    }

    pub fn now_playing(&self) -> Option<(String, PlayState)> {
        self.controller
            .now_playing()
            .map(|s| (s.item().title.clone(), s.state()))
    }

    pub fn coming_up(&self) -> Option<String> {
        self.controller
            .coming_up()
            .map(|s| s.item().title.clone())
    }
}
