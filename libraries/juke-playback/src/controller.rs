//! Playback controller
//!
//! Owns the now-playing session and the playlist queue and drives every
//! transition between them. All methods run on the owning context of a
//! [`Dispatcher`](crate::dispatcher::Dispatcher); backend events, timers and
//! commands reach the controller only through it.
//!
//! Backend events are tagged with their session id. An event is applied only
//! if its session still holds a role (now-playing, coming-up) or is fading
//! out; anything else is stale and dropped.

use crate::bus::MessageBus;
use crate::dispatcher::{DispatcherTimer, TimerMode, WeakDispatcher};
use crate::error::{PlaybackError, Result};
use crate::events::{BusMessage, PlaybackStateEvent, PlayerCommand, SessionEvent, SessionEventSink};
use crate::queue::PlaylistQueue;
use crate::session::{PlaybackSession, SessionChange, SessionFactory};
use crate::strategy::{ExclusionSet, SelectionStrategy};
use crate::types::{AdvanceOutcome, PlaybackConfig};
use crate::volume::Volume;
use juke_core::{Item, ItemKey, PlayHistory, PlayState, ProviderRegistry, SessionId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Collaborators handed to the controller at construction
pub struct ControllerDeps {
    pub registry: Arc<ProviderRegistry>,
    pub strategy: Box<dyn SelectionStrategy>,
    pub bus: MessageBus,
    pub history: Arc<dyn PlayHistory>,
}

#[derive(Debug, Clone, Copy)]
struct StartRequest {
    fade_in: bool,
}

/// The now-playing role
struct NowPlaying {
    session: PlaybackSession,
    /// Play as soon as the session is ready
    start: Option<StartRequest>,
    /// First `Playing` already handled
    played: bool,
}

/// Superseded session finishing its fade-out
struct FadingSession {
    session: PlaybackSession,
    _close: DispatcherTimer,
}

struct PendingPause {
    session_id: SessionId,
    _timer: DispatcherTimer,
}

/// Playback controller
pub struct PlaybackController {
    config: PlaybackConfig,
    now_playing: Option<NowPlaying>,
    queue: PlaylistQueue,
    fading: HashMap<SessionId, FadingSession>,
    pending_pause: Option<PendingPause>,
    strategy: Box<dyn SelectionStrategy>,
    sessions: SessionFactory,
    bus: MessageBus,
    history: Arc<dyn PlayHistory>,
    dispatcher: WeakDispatcher<PlaybackController>,
    volume: Volume,
    /// Items that failed to open in this run; never selected again
    failed: HashSet<ItemKey>,
    starved: bool,
}

impl PlaybackController {
    /// Create a controller living on the loop behind `dispatcher`
    pub fn new(
        config: PlaybackConfig,
        deps: ControllerDeps,
        dispatcher: WeakDispatcher<PlaybackController>,
    ) -> Self {
        let events = dispatcher.clone();
        let sink: SessionEventSink = Arc::new(move |event: SessionEvent| {
            if events
                .begin_invoke(move |controller: &mut PlaybackController| {
                    controller.handle_session_event(event);
                })
                .is_err()
            {
                trace!("dropping event for {}, dispatcher closed", event.session_id);
            }
        });

        Self {
            volume: Volume::new(config.volume),
            config,
            now_playing: None,
            queue: PlaylistQueue::new(),
            fading: HashMap::new(),
            pending_pause: None,
            strategy: deps.strategy,
            sessions: SessionFactory::new(deps.registry, sink),
            bus: deps.bus,
            history: deps.history,
            dispatcher,
            failed: HashSet::new(),
            starved: false,
        }
    }

    // ===== Queries =====

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn now_playing(&self) -> Option<&PlaybackSession> {
        self.now_playing.as_ref().map(|np| &np.session)
    }

    pub fn coming_up(&self) -> Option<&PlaybackSession> {
        self.queue.coming_up()
    }

    /// Snapshot of the queued items, in order
    pub fn queued_items(&self) -> Vec<Item> {
        self.queue.items()
    }

    pub fn queue(&self) -> &PlaylistQueue {
        &self.queue
    }

    /// Whether the last refill found nothing to come up next
    pub fn is_starved(&self) -> bool {
        self.starved
    }

    pub fn is_playing(&self) -> bool {
        self.now_playing()
            .is_some_and(|s| s.state() == PlayState::Playing)
    }

    /// Sessions still fading out after a crossfade
    pub fn fading_count(&self) -> usize {
        self.fading.len()
    }

    pub fn volume(&self) -> Volume {
        self.volume
    }

    /// Items the strategy must not return right now
    pub fn exclusions(&self) -> ExclusionSet {
        let mut exclusions = ExclusionSet::new();
        if let Some(session) = self.now_playing() {
            exclusions.insert(session.item());
        }
        if let Some(session) = self.queue.coming_up() {
            exclusions.insert(session.item());
        }
        for session in self.queue.entries() {
            exclusions.insert(session.item());
        }
        for key in &self.failed {
            exclusions.insert_key(key.clone());
        }
        exclusions
    }

    // ===== Playback Control =====

    /// Advance to the coming-up item
    ///
    /// `start_playing` is implied when the current item is playing or has
    /// ended. With `crossfade`, the current item fades out while the next one
    /// fades in, and is closed once the overlap has elapsed.
    pub fn play_next(&mut self, crossfade: bool, start_playing: bool) -> AdvanceOutcome {
        if self.queue.coming_up().is_none() && !self.refill_coming_up() {
            debug!("Nothing to advance to");
            return AdvanceOutcome::Starved;
        }
        let Some(next) = self.queue.take_coming_up() else {
            return AdvanceOutcome::Starved;
        };

        let mut start_playing = start_playing;
        let mut fade_in = false;
        if let Some(previous) = self.now_playing.take() {
            if matches!(
                previous.session.state(),
                PlayState::Playing | PlayState::Ended
            ) {
                start_playing = true;
            }
            fade_in = crossfade;
            self.retire(previous.session, crossfade);
        }
        self.pending_pause = None;

        self.start_session(next, start_playing, fade_in);

        let refilled = self.refill_coming_up();
        self.bus.publish(BusMessage::PlaylistChanged);
        if refilled {
            AdvanceOutcome::Advanced
        } else {
            AdvanceOutcome::AdvancedStarved
        }
    }

    /// Advance only if `id` is still now-playing (deferred end-of-item)
    pub fn advance_if_current(&mut self, id: SessionId) -> Option<AdvanceOutcome> {
        if self.now_playing().map(PlaybackSession::id) != Some(id) {
            trace!("Advance for {} dropped, no longer now playing", id);
            return None;
        }
        let outcome = self.play_next(false, false);
        if outcome == AdvanceOutcome::Starved {
            self.finish_playback();
        }
        Some(outcome)
    }

    /// Now-playing is done and nothing can follow it
    fn finish_playback(&mut self) {
        info!("Playback finished, nothing left to play");
        self.bus.publish(BusMessage::PlaybackState {
            state: PlaybackStateEvent::Paused,
        });
        self.bus.publish(BusMessage::PlaybackFinished);
    }

    /// Resume (or start) the now-playing item with a short fade-in
    pub fn play(&mut self) {
        let fade = self.config.pause_fade();
        let pending = self.pending_pause.take();
        let Some(np) = self.now_playing.as_mut() else {
            return;
        };

        match np.session.state() {
            PlayState::ReadyToPlay | PlayState::Paused | PlayState::Stopped => {
                np.session.play();
                np.session.fade_in(fade);
            }
            // Pause was still fading out; fade back in
            PlayState::Playing if pending.is_some() => np.session.fade_in(fade),
            PlayState::Opening => np.start = Some(StartRequest { fade_in: false }),
            PlayState::Closed => {
                np.start = Some(StartRequest { fade_in: false });
                np.session.prepare();
            }
            state => trace!("play ignored in state {}", state),
        }
    }

    /// Fade out, then pause once the fade has elapsed
    pub fn pause(&mut self) {
        let fade = self.config.pause_fade();
        let Some(np) = self.now_playing.as_mut() else {
            return;
        };

        match np.session.state() {
            PlayState::Playing => {
                if self.pending_pause.is_some() {
                    return;
                }
                np.session.fade_out(fade);
                let session_id = np.session.id();
                let timer = self.dispatcher.timer(fade, TimerMode::OneShot, move |c: &mut PlaybackController| {
                    c.finish_pause(session_id);
                });
                self.pending_pause = Some(PendingPause {
                    session_id,
                    _timer: timer,
                });
            }
            // Still opening: just forget the start request
            PlayState::Opening | PlayState::ReadyToPlay | PlayState::Closed => np.start = None,
            state => trace!("pause ignored in state {}", state),
        }
    }

    pub fn toggle_play_pause(&mut self) {
        if self.is_playing() && self.pending_pause.is_none() {
            self.pause();
        } else {
            self.play();
        }
    }

    fn finish_pause(&mut self, id: SessionId) {
        if self.pending_pause.as_ref().map(|p| p.session_id) != Some(id) {
            return;
        }
        self.pending_pause = None;
        if let Some(np) = self.now_playing.as_mut().filter(|np| np.session.id() == id) {
            np.session.pause();
        }
    }

    /// Stop and release now-playing and everything still fading out
    pub fn stop(&mut self) {
        self.pending_pause = None;
        if let Some(np) = self.now_playing.as_mut() {
            np.start = None;
            np.session.stop();
            np.session.close();
            self.bus.publish(BusMessage::PlaybackState {
                state: PlaybackStateEvent::Paused,
            });
        }
        for (_, mut fading) in self.fading.drain() {
            fading.session.close();
        }
    }

    /// Move the now-playing item to `position`
    ///
    /// Returns `false` when nothing is open or the request falls within the
    /// session's seek tolerance. The new position arrives as `Progress`.
    pub fn seek(&mut self, position: Duration) -> bool {
        let Some(np) = self.now_playing.as_mut() else {
            return false;
        };
        let issued = np.session.seek(position);
        if issued {
            debug!("Seek {} to {:?}", np.session.item(), position);
        }
        issued
    }

    /// Close every session, queued ones included
    pub fn shutdown(&mut self) {
        info!("Shutting down playback");
        self.stop();
        if self.now_playing.take().is_some() {
            self.bus
                .publish(BusMessage::NowPlayingChanged { item: None });
        }
        self.queue.close_all();
    }

    pub fn handle_command(&mut self, command: PlayerCommand) {
        debug!("Command: {:?}", command);
        match command {
            PlayerCommand::Play => self.play(),
            PlayerCommand::Pause => self.pause(),
            PlayerCommand::TogglePlayPause => self.toggle_play_pause(),
            PlayerCommand::Next => {
                if self.queue.coming_up().is_some() {
                    self.play_next(true, false);
                } else {
                    debug!("Next ignored, nothing coming up");
                }
            }
        }
    }

    // ===== Volume =====

    /// Set master volume (0-255)
    pub fn set_volume(&mut self, level: u8) {
        if self.volume.set_level(level) {
            self.apply_volume();
        }
    }

    /// Toggle mute; returns the new mute state
    pub fn toggle_mute(&mut self) -> bool {
        let muted = self.volume.toggle_mute();
        self.apply_volume();
        muted
    }

    fn apply_volume(&mut self) {
        let level = self.volume.effective();
        if let Some(np) = self.now_playing.as_mut() {
            np.session.set_volume(level);
        }
        self.bus.publish(BusMessage::VolumeChanged {
            level: self.volume.level(),
            muted: self.volume.is_muted(),
        });
    }

    // ===== Queue Management =====

    /// Append an item to the queue
    pub fn enqueue(&mut self, item: Item) -> SessionId {
        let session = self.sessions.create(item);
        let id = session.id();
        debug!("Enqueue {}", session.item());
        self.queue.enqueue(session);
        if self.queue.coming_up().is_none() {
            self.refill_coming_up();
        }
        self.bus.publish(BusMessage::PlaylistChanged);
        id
    }

    /// Make an item come up next; the previous coming-up goes to the queue head
    pub fn quickplay(&mut self, item: Item) -> SessionId {
        let session = self.sessions.create(item);
        let id = session.id();
        debug!("Quickplay {}", session.item());
        self.queue.quickplay(session);
        self.set_starved(false);
        self.bus.publish(BusMessage::PlaylistChanged);
        id
    }

    /// Add an external item to the first free role
    ///
    /// Fills an empty now-playing, then an empty coming-up, and only then
    /// inserts into the queue at `index` (clamped to the end). The item is
    /// never started here.
    pub fn insert_item(&mut self, index: usize, item: Item) -> SessionId {
        let session = self.sessions.create(item);
        let id = session.id();
        if self.now_playing.is_none() {
            self.start_session(session, false, false);
            if self.queue.coming_up().is_none() {
                self.refill_coming_up();
            }
        } else if self.queue.coming_up().is_none() {
            debug!("Coming up: {}", session.item());
            self.queue.replace_coming_up(Some(session), false);
            self.set_starved(false);
        } else {
            self.queue.insert(index, session);
        }
        self.bus.publish(BusMessage::PlaylistChanged);
        id
    }

    pub fn remove_queued(&mut self, id: SessionId) -> Result<()> {
        self.queue
            .remove(id)
            .ok_or(PlaybackError::SessionNotQueued(id))?;
        self.bus.publish(BusMessage::PlaylistChanged);
        Ok(())
    }

    pub fn move_up(&mut self, id: SessionId) -> Result<()> {
        if !self.queue.move_up(id) {
            return Err(PlaybackError::SessionNotQueued(id));
        }
        self.bus.publish(BusMessage::PlaylistChanged);
        Ok(())
    }

    pub fn move_down(&mut self, id: SessionId) -> Result<()> {
        if !self.queue.move_down(id) {
            return Err(PlaybackError::SessionNotQueued(id));
        }
        self.bus.publish(BusMessage::PlaylistChanged);
        Ok(())
    }

    /// Remove every queued entry; returns how many were removed
    pub fn clear_queue(&mut self) -> usize {
        let removed = self.queue.clear();
        if removed > 0 {
            self.bus.publish(BusMessage::PlaylistChanged);
        }
        removed
    }

    /// Replace coming-up with a fresh pick from the strategy
    ///
    /// Returns `false` (and keeps the current one) if nothing else is eligible.
    pub fn swap_coming_up(&mut self) -> bool {
        let Some(item) = self.select_next() else {
            debug!("Swap ignored, no alternative");
            return false;
        };
        let session = self.sessions.create(item);
        self.queue.replace_coming_up(Some(session), true);
        self.set_starved(false);
        self.bus.publish(BusMessage::PlaylistChanged);
        true
    }

    /// Drop coming-up; the queue head (else a strategy pick) takes its place
    pub fn remove_coming_up(&mut self) -> bool {
        if self.queue.coming_up().is_none() {
            return false;
        }
        // Pick while the current one is still excluded
        let replacement = match self.queue.take_next() {
            Some(session) => Some(session),
            None => self.select_next().map(|item| self.sessions.create(item)),
        };
        let found = replacement.is_some();
        self.queue.replace_coming_up(replacement, true);
        self.set_starved(!found);
        self.bus.publish(BusMessage::PlaylistChanged);
        true
    }

    /// Block the coming-up item for good and remove it
    pub fn block_coming_up(&mut self) -> bool {
        let Some(session) = self.queue.coming_up() else {
            return false;
        };
        info!("Blocking {}", session.item());
        session.item().set_blocked(true);
        self.remove_coming_up()
    }

    /// Fill empty roles from the strategy (typically at startup)
    ///
    /// The now-playing item only starts right away with
    /// `autoplay_on_startup`.
    pub fn load_startup_items(&mut self) {
        if self.now_playing.is_none() {
            match self.select_next() {
                Some(item) => {
                    let session = self.sessions.create(item);
                    let autoplay = self.config.autoplay_on_startup;
                    self.start_session(session, autoplay, false);
                }
                None => self.set_starved(true),
            }
        }
        if self.queue.coming_up().is_none() {
            self.refill_coming_up();
        }
        self.bus.publish(BusMessage::PlaylistChanged);
    }

    /// React to a rebuilt library
    pub fn on_library_updated(&mut self) {
        if self.now_playing.is_none() {
            self.load_startup_items();
        }
    }

    // ===== Internals =====

    /// Ask the strategy for an item, rejecting contract violations
    fn select_next(&mut self) -> Option<Item> {
        let exclusions = self.exclusions();
        let item = self.strategy.next(&exclusions)?;
        if !exclusions.permits(&item) {
            warn!(
                "Selection strategy returned excluded or blocked item {}",
                item
            );
            return None;
        }
        Some(item)
    }

    /// Fill an empty coming-up slot from the queue, else from the strategy
    fn refill_coming_up(&mut self) -> bool {
        if self.queue.coming_up().is_some() {
            return true;
        }
        let session = match self.queue.take_next() {
            Some(session) => Some(session),
            None => self.select_next().map(|item| self.sessions.create(item)),
        };
        match session {
            Some(session) => {
                debug!("Coming up: {}", session.item());
                self.queue.replace_coming_up(Some(session), false);
                self.set_starved(false);
                true
            }
            None => {
                self.set_starved(true);
                false
            }
        }
    }

    fn set_starved(&mut self, starved: bool) {
        if starved && !self.starved {
            info!("Queue starved, nothing left to play");
            self.bus.publish(BusMessage::QueueStarved);
        }
        self.starved = starved;
    }

    /// Make `session` the now-playing item
    fn start_session(&mut self, mut session: PlaybackSession, start_playing: bool, fade_in: bool) {
        session.set_volume(self.volume.effective());
        let id = session.id();
        let state = session.state();
        info!("Now playing: {}", session.item());
        self.bus.publish(BusMessage::NowPlayingChanged {
            item: Some(session.item().clone()),
        });

        self.now_playing = Some(NowPlaying {
            session,
            start: start_playing.then_some(StartRequest { fade_in }),
            played: false,
        });

        match state {
            PlayState::Closed => {
                if let Some(np) = self.now_playing.as_mut() {
                    np.session.prepare();
                }
            }
            PlayState::ReadyToPlay => self.begin_requested_playback(),
            PlayState::Error => self.defer_advance(id),
            _ => {}
        }
    }

    fn begin_requested_playback(&mut self) {
        let crossfade = self.config.crossfade();
        let Some(np) = self.now_playing.as_mut() else {
            return;
        };
        if let Some(start) = np.start.take() {
            np.session.play();
            if start.fade_in {
                np.session.fade_in(crossfade);
            }
        }
    }

    /// Stop a superseded session, after a fade-out if crossfading
    fn retire(&mut self, mut session: PlaybackSession, crossfade: bool) {
        if crossfade && session.state() == PlayState::Playing {
            let overlap = self.config.crossfade();
            let id = session.id();
            debug!("Fading out {} over {:?}", session.item(), overlap);
            session.fade_out(overlap);
            let timer = self.dispatcher.timer(overlap, TimerMode::OneShot, move |c: &mut PlaybackController| {
                c.finish_fade_out(id);
            });
            self.fading.insert(
                id,
                FadingSession {
                    session,
                    _close: timer,
                },
            );
        } else {
            session.stop();
            session.close();
        }
    }

    /// Scheduled close after a crossfade; no-op if already closed
    fn finish_fade_out(&mut self, id: SessionId) {
        if let Some(mut fading) = self.fading.remove(&id) {
            fading.session.stop();
            fading.session.close();
        }
    }

    fn defer_advance(&self, id: SessionId) {
        if self
            .dispatcher
            .begin_invoke(move |c: &mut PlaybackController| {
                c.advance_if_current(id);
            })
            .is_err()
        {
            debug!("Advance for {} dropped, dispatcher closed", id);
        }
    }

    // ===== Session Events =====

    /// Apply a tagged backend event, ignoring stale ones
    pub fn handle_session_event(&mut self, event: SessionEvent) {
        let id = event.session_id;

        if self.now_playing().map(PlaybackSession::id) == Some(id) {
            let change = self
                .now_playing
                .as_mut()
                .and_then(|np| np.session.apply(&event));
            if let Some(change) = change {
                self.on_now_playing_change(id, change);
            }
            return;
        }

        if self.queue.coming_up().map(PlaybackSession::id) == Some(id) {
            let change = self
                .queue
                .coming_up_mut()
                .and_then(|session| session.apply(&event));
            if let Some(SessionChange::State {
                to: PlayState::Error,
                ..
            }) = change
            {
                self.on_coming_up_failed();
            }
            return;
        }

        if let Some(fading) = self.fading.get_mut(&id) {
            fading.session.apply(&event);
            return;
        }

        trace!("Ignoring stale event from {}", id);
    }

    fn on_now_playing_change(&mut self, id: SessionId, change: SessionChange) {
        match change {
            SessionChange::State { from, to } => {
                debug!("Now playing {}: {} -> {}", id, from, to);
                match to {
                    PlayState::ReadyToPlay => self.begin_requested_playback(),
                    PlayState::Playing => {
                        self.mark_played();
                        self.bus.publish(BusMessage::PlaybackState {
                            state: PlaybackStateEvent::Playing,
                        });
                    }
                    PlayState::Paused | PlayState::Stopped | PlayState::Closed => {
                        self.bus.publish(BusMessage::PlaybackState {
                            state: PlaybackStateEvent::Paused,
                        });
                    }
                    PlayState::Ended => self.defer_advance(id),
                    PlayState::Error => self.on_now_playing_failed(from),
                    PlayState::Opening => {}
                }
            }
            SessionChange::Position(_) | SessionChange::Length(_) => {
                if let Some(session) = self.now_playing() {
                    self.bus.publish(BusMessage::Progress {
                        position: session.position(),
                        length: session.length(),
                    });
                }
            }
            SessionChange::Buffer(_) => {}
        }
    }

    /// First `Playing` of the now-playing session
    fn mark_played(&mut self) {
        let Some(np) = self.now_playing.as_mut() else {
            return;
        };
        if np.played {
            return;
        }
        np.played = true;
        let item = np.session.item();
        item.mark_played();
        self.history.record(item);
    }

    fn on_now_playing_failed(&mut self, previous: PlayState) {
        let Some(np) = self.now_playing.as_ref() else {
            return;
        };
        let item = np.session.item().clone();
        let resume = np.start.is_some() || previous == PlayState::Playing;
        warn!("Skipping {}, resource failed", item);

        self.failed.insert(item.key());
        self.bus.publish(BusMessage::ItemFailed {
            item,
            reason: "resource failed to open or play".to_string(),
        });
        if self.play_next(false, resume) == AdvanceOutcome::Starved {
            self.finish_playback();
        }
    }

    fn on_coming_up_failed(&mut self) {
        let Some(failed) = self.queue.replace_coming_up(None, true) else {
            return;
        };
        let item = failed.item().clone();
        warn!("Dropping coming up {}, resource failed", item);

        self.failed.insert(item.key());
        self.bus.publish(BusMessage::ItemFailed {
            item,
            reason: "resource failed to open".to_string(),
        });
        self.refill_coming_up();
        self.bus.publish(BusMessage::PlaylistChanged);
    }
}
