//! Scripted audio backend for tests
//!
//! `MockResource` answers every command synchronously through its observer,
//! the way a fast backend would, and records each call in a shared
//! [`ResourceLog`] stamped with tokio time.

use crate::error::{JukeError, Result};
use crate::traits::{AudioResource, LibraryProvider, ResourceObserver};
use crate::types::{Item, PlayState, ProviderId, ResourceEvent};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// Length every mock resource reports once loaded
pub const TRACK_LENGTH: Duration = Duration::from_secs(180);

/// Provider id used by [`MockProvider::new`] and [`item`]
pub fn provider_id() -> ProviderId {
    ProviderId::new("local")
}

/// Item served by the mock provider
pub fn item(title: &str) -> Item {
    Item::new(title, "Test Artist", "Test Album", provider_id())
}

/// One command issued to a mock resource
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResourceCall {
    Load,
    Play,
    Pause,
    Stop,
    Seek(Duration),
    FadeIn(Duration),
    FadeOut(Duration),
    SetVolume(u8),
    Close,
}

impl ResourceCall {
    fn same_kind(&self, other: &ResourceCall) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Every call made on any mock resource, in order
#[derive(Default)]
pub struct ResourceLog {
    calls: Mutex<Vec<(String, ResourceCall, Instant)>>,
    observers: Mutex<HashMap<String, ResourceObserver>>,
}

impl ResourceLog {
    fn record(&self, title: &str, call: ResourceCall) {
        lock(&self.calls).push((title.to_string(), call, Instant::now()));
    }

    /// Number of calls of the same kind (payload ignored)
    pub fn count(&self, title: &str, call: ResourceCall) -> usize {
        self.times(title, |c| c.same_kind(&call)).len()
    }

    /// Time of the first call of this kind
    pub fn first(&self, title: &str, call: ResourceCall) -> Option<Instant> {
        self.times(title, |c| c.same_kind(&call)).first().copied()
    }

    /// Times of every matching call on `title`
    pub fn times(&self, title: &str, matches: impl Fn(&ResourceCall) -> bool) -> Vec<Instant> {
        lock(&self.calls)
            .iter()
            .filter(|(t, c, _)| t == title && matches(c))
            .map(|(_, _, at)| *at)
            .collect()
    }

    /// Calls made on `title`, oldest first
    pub fn calls_for(&self, title: &str) -> Vec<ResourceCall> {
        lock(&self.calls)
            .iter()
            .filter(|(t, _, _)| t == title)
            .map(|(_, c, _)| *c)
            .collect()
    }

    /// Report an event as if the backend of `title` produced it
    pub fn emit(&self, title: &str, event: ResourceEvent) {
        let observer = lock(&self.observers).get(title).cloned();
        if let Some(observer) = observer {
            observer(event);
        }
    }
}

struct MockResource {
    title: String,
    log: Arc<ResourceLog>,
    observer: Option<ResourceObserver>,
    /// Answer load() with ReadyToPlay right away
    auto_ready: bool,
}

impl MockResource {
    fn report(&self, event: ResourceEvent) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }

    fn report_state(&self, state: PlayState) {
        self.report(ResourceEvent::StateChanged { state });
    }
}

impl AudioResource for MockResource {
    fn load(&mut self) -> Result<()> {
        self.log.record(&self.title, ResourceCall::Load);
        self.report(ResourceEvent::LengthResolved {
            length: TRACK_LENGTH,
        });
        if self.auto_ready {
            self.report_state(PlayState::ReadyToPlay);
        }
        Ok(())
    }

    fn play(&mut self) {
        self.log.record(&self.title, ResourceCall::Play);
        self.report_state(PlayState::Playing);
    }

    fn pause(&mut self) {
        self.log.record(&self.title, ResourceCall::Pause);
        self.report_state(PlayState::Paused);
    }

    fn stop(&mut self) {
        self.log.record(&self.title, ResourceCall::Stop);
        self.report_state(PlayState::Stopped);
    }

    fn seek(&mut self, position: Duration) {
        self.log.record(&self.title, ResourceCall::Seek(position));
        self.report(ResourceEvent::PositionChanged { position });
    }

    fn fade_in(&mut self, duration: Duration) {
        self.log.record(&self.title, ResourceCall::FadeIn(duration));
    }

    fn fade_out(&mut self, duration: Duration) {
        self.log.record(&self.title, ResourceCall::FadeOut(duration));
    }

    fn set_volume(&mut self, volume: u8) {
        self.log.record(&self.title, ResourceCall::SetVolume(volume));
    }

    fn subscribe(&mut self, observer: ResourceObserver) {
        lock(&self.log.observers).insert(self.title.clone(), Arc::clone(&observer));
        self.observer = Some(observer);
    }

    fn unsubscribe(&mut self) {
        self.observer = None;
    }

    fn close(&mut self) {
        self.log.record(&self.title, ResourceCall::Close);
    }
}

/// Provider handing out [`MockResource`]s that share one [`ResourceLog`]
pub struct MockProvider {
    id: ProviderId,
    /// Calls made on every resource this provider opened
    pub log: Arc<ResourceLog>,
    failing: Mutex<HashSet<String>>,
    manual_ready: Mutex<HashSet<String>>,
}

impl MockProvider {
    /// Provider registered under [`provider_id`]
    pub fn new() -> Self {
        Self {
            id: provider_id(),
            log: Arc::new(ResourceLog::default()),
            failing: Mutex::default(),
            manual_ready: Mutex::default(),
        }
    }

    /// Items with this title fail to open
    pub fn fail(&self, title: &str) {
        lock(&self.failing).insert(title.to_string());
    }

    /// Items with this title stay `Opening` until the test emits `ReadyToPlay`
    pub fn manual_ready(&self, title: &str) {
        lock(&self.manual_ready).insert(title.to_string());
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LibraryProvider for MockProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn retrieve_audio_resource(&self, item: &Item) -> Result<Box<dyn AudioResource>> {
        if lock(&self.failing).contains(&item.title) {
            return Err(JukeError::audio(format!("cannot open {}", item.title)));
        }
        Ok(Box::new(MockResource {
            title: item.title.clone(),
            log: Arc::clone(&self.log),
            observer: None,
            auto_ready: !lock(&self.manual_ready).contains(&item.title),
        }))
    }
}
