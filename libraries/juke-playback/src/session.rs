//! Playback session: one item bound to its audio resource
//!
//! A session never changes its own playback state in response to a command.
//! Commands are forwarded to the resource and the backend reports the
//! resulting state, which the owner feeds back through [`PlaybackSession::apply`].
//! The exceptions are `prepare()` (moves to `Opening`) and `close()` (moves
//! to `Closed`), which are session-local.

use crate::events::{SessionEvent, SessionEventSink};
use juke_core::{
    AudioResource, Item, PlayState, ProviderRegistry, ResourceEvent, Result, SessionId,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// While playing, position requests closer than this to the reported
/// position are dropped
pub const SEEK_TOLERANCE: Duration = Duration::from_secs(2);

/// What an applied event changed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionChange {
    State { from: PlayState, to: PlayState },
    Position(Duration),
    Length(Duration),
    Buffer(f32),
}

/// Creates sessions that report into one event sink
#[derive(Clone)]
pub struct SessionFactory {
    registry: Arc<ProviderRegistry>,
    sink: SessionEventSink,
}

impl SessionFactory {
    pub fn new(registry: Arc<ProviderRegistry>, sink: SessionEventSink) -> Self {
        Self { registry, sink }
    }

    pub fn create(&self, item: Item) -> PlaybackSession {
        PlaybackSession::new(item, Arc::clone(&self.registry), Arc::clone(&self.sink))
    }
}

/// Read-only snapshot of a session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: SessionId,
    pub item: Item,
    pub state: PlayState,
    pub position: Duration,
    pub length: Option<Duration>,
}

impl From<&PlaybackSession> for SessionInfo {
    fn from(session: &PlaybackSession) -> Self {
        Self {
            id: session.id(),
            item: session.item().clone(),
            state: session.state(),
            position: session.position(),
            length: session.length(),
        }
    }
}

/// One item bound to one audio resource handle
pub struct PlaybackSession {
    id: SessionId,
    item: Item,
    registry: Arc<ProviderRegistry>,
    sink: SessionEventSink,
    resource: Option<Box<dyn AudioResource>>,
    state: PlayState,
    /// Bumped on every prepare; stale events carry an older epoch
    epoch: u32,
    position: Duration,
    length: Option<Duration>,
    buffer_progress: f32,
    volume: u8,
}

impl PlaybackSession {
    pub fn new(item: Item, registry: Arc<ProviderRegistry>, sink: SessionEventSink) -> Self {
        Self {
            id: SessionId::generate(),
            item,
            registry,
            sink,
            resource: None,
            state: PlayState::Closed,
            epoch: 0,
            position: Duration::ZERO,
            length: None,
            buffer_progress: 0.0,
            volume: 255,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn item(&self) -> &Item {
        &self.item
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn position(&self) -> Duration {
        self.position
    }

    /// Length reported by the backend, else the item's known duration
    pub fn length(&self) -> Option<Duration> {
        self.length.or_else(|| self.item.duration())
    }

    pub fn buffer_progress(&self) -> f32 {
        self.buffer_progress
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Whether a resource handle is currently held
    pub fn is_open(&self) -> bool {
        self.resource.is_some()
    }

    /// Acquire and start loading the resource
    ///
    /// No-op unless `Closed`. Failure to obtain or load the resource is
    /// reported as a tagged `Error` event through the sink, so the owner sees
    /// it the same way as a backend failure.
    pub fn prepare(&mut self) {
        if self.state != PlayState::Closed {
            trace!("prepare ignored for {} in state {}", self.id, self.state);
            return;
        }

        self.epoch = self.epoch.wrapping_add(1);
        self.state = PlayState::Opening;
        debug!("Preparing {} ({})", self.item, self.id);

        match self.open() {
            Ok(resource) => self.resource = Some(resource),
            Err(e) => {
                warn!("Failed to open {}: {}", self.item, e);
                self.emit(ResourceEvent::StateChanged {
                    state: PlayState::Error,
                });
            }
        }
    }

    fn open(&self) -> Result<Box<dyn AudioResource>> {
        let provider = self.registry.require(&self.item.provider_id)?;
        let mut resource = provider.retrieve_audio_resource(&self.item)?;

        let sink = Arc::clone(&self.sink);
        let session_id = self.id;
        let epoch = self.epoch;
        resource.subscribe(Arc::new(move |event| {
            sink(SessionEvent {
                session_id,
                epoch,
                event,
            });
        }));
        resource.set_volume(self.volume);

        if let Err(e) = resource.load() {
            resource.unsubscribe();
            resource.close();
            return Err(e);
        }

        Ok(resource)
    }

    fn emit(&self, event: ResourceEvent) {
        (self.sink)(SessionEvent {
            session_id: self.id,
            epoch: self.epoch,
            event,
        });
    }

    /// Start or resume playback (from `ReadyToPlay`, `Paused` or `Stopped`)
    pub fn play(&mut self) {
        if !self.state.can_play() {
            trace!("play ignored for {} in state {}", self.id, self.state);
            return;
        }
        if let Some(resource) = self.resource.as_mut() {
            resource.play();
        }
    }

    pub fn pause(&mut self) {
        if !self.state.can_pause() {
            trace!("pause ignored for {} in state {}", self.id, self.state);
            return;
        }
        if let Some(resource) = self.resource.as_mut() {
            resource.pause();
        }
    }

    pub fn stop(&mut self) {
        if !self.state.can_pause() {
            trace!("stop ignored for {} in state {}", self.id, self.state);
            return;
        }
        if let Some(resource) = self.resource.as_mut() {
            resource.stop();
        }
    }

    /// Move playback to `position`
    ///
    /// Returns `false` if no resource is open, or if playing and `position` is
    /// within [`SEEK_TOLERANCE`] of the current position.
    pub fn seek(&mut self, position: Duration) -> bool {
        let Some(resource) = self.resource.as_mut() else {
            return false;
        };
        let position = self.length.map_or(position, |length| position.min(length));
        let distance = position
            .checked_sub(self.position)
            .unwrap_or_else(|| self.position - position);
        if self.state == PlayState::Playing && distance <= SEEK_TOLERANCE {
            trace!("seek to {:?} within tolerance for {}", position, self.id);
            return false;
        }
        resource.seek(position);
        true
    }

    pub fn fade_in(&mut self, duration: Duration) {
        if let Some(resource) = self.resource.as_mut() {
            resource.fade_in(duration);
        }
    }

    pub fn fade_out(&mut self, duration: Duration) {
        if let Some(resource) = self.resource.as_mut() {
            resource.fade_out(duration);
        }
    }

    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume;
        if let Some(resource) = self.resource.as_mut() {
            resource.set_volume(volume);
        }
    }

    /// Release the resource and return to `Closed`
    ///
    /// Safe to call any number of times.
    pub fn close(&mut self) {
        if let Some(mut resource) = self.resource.take() {
            debug!("Closing {} ({})", self.item, self.id);
            resource.unsubscribe();
            resource.close();
        }
        self.state = PlayState::Closed;
        self.position = Duration::ZERO;
        self.buffer_progress = 0.0;
    }

    /// Feed a backend event into the session
    ///
    /// Returns what changed, or `None` if the event belongs to another
    /// session, to an earlier opening of this one, or arrived after `close()`.
    pub fn apply(&mut self, event: &SessionEvent) -> Option<SessionChange> {
        if event.session_id != self.id || event.epoch != self.epoch {
            return None;
        }
        if self.state == PlayState::Closed {
            trace!("dropping event for closed session {}", self.id);
            return None;
        }

        match event.event {
            ResourceEvent::StateChanged { state } => {
                if state == self.state {
                    return None;
                }
                let from = self.state;
                if state == PlayState::Closed {
                    // Backend gave up the resource on its own
                    self.close();
                } else {
                    self.state = state;
                }
                Some(SessionChange::State { from, to: state })
            }
            ResourceEvent::PositionChanged { position } => {
                self.position = position;
                Some(SessionChange::Position(position))
            }
            ResourceEvent::LengthResolved { length } => {
                self.length = Some(length);
                self.item.set_duration(length);
                Some(SessionChange::Length(length))
            }
            ResourceEvent::BufferProgress { progress } => {
                self.buffer_progress = progress.clamp(0.0, 1.0);
                Some(SessionChange::Buffer(self.buffer_progress))
            }
        }
    }
}

impl fmt::Debug for PlaybackSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackSession")
            .field("id", &self.id)
            .field("item", &self.item.to_string())
            .field("state", &self.state)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.close();
    }
}
