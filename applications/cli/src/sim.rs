/// Simulated audio backend and library provider
///
/// Resources "play" by advancing a clock on tokio timers and report their
/// state through the observer like a real backend thread would.
use crate::config::SimulationSettings;
use async_trait::async_trait;
use juke_core::{
    AudioResource, Item, JukeError, LibraryCallback, LibraryProvider, PlayState, ProviderId,
    ResourceEvent, ResourceObserver, Result,
};
use juke_playback::{FadeCurve, FadeDirection, FadeRamp, Volume};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;

const ADJECTIVES: &[&str] = &[
    "Electric", "Silent", "Golden", "Broken", "Midnight", "Velvet", "Distant", "Crimson",
    "Hollow", "Neon", "Paper", "Wild",
];

const NOUNS: &[&str] = &[
    "Heart", "River", "Engine", "Summer", "Signal", "Garden", "Highway", "Mirror", "Ocean",
    "Static", "Harbor", "Echo",
];

const ARTISTS: &[&str] = &[
    "The Lanterns", "Miso Ramen", "Polar Drift", "Juniper & Ash", "Low Orbit", "Saint Ferrous",
    "Cassette Club", "Marble Arch", "The Quiet Hours", "Vantablue",
];

/// Generate a library of `songs` items spread over `artists` artists
pub fn generate_library(
    provider_id: &ProviderId,
    songs: usize,
    artists: usize,
    song_length: Duration,
    rng: &mut StdRng,
) -> Vec<Item> {
    let artists: Vec<&str> = ARTISTS.iter().copied().cycle().take(artists.max(1)).collect();
    let mut items: Vec<Item> = Vec::with_capacity(songs);

    while items.len() < songs {
        let artist = artists[items.len() % artists.len()];
        let title = song_title(rng, items.len());
        let album = format!("{} Sessions", artist.trim_start_matches("The "));
        let item = Item::new(title, artist, album, provider_id.clone())
            .with_duration(song_length)
            .with_tag(if rng.gen_bool(0.5) { "rock" } else { "electronic" });
        if !items.iter().any(|known| known.same_tuple(&item)) {
            items.push(item);
        }
    }

    items
}

fn song_title(rng: &mut StdRng, index: usize) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("Untitled");
    let noun = NOUNS.choose(rng).copied().unwrap_or("Song");
    // Suffix keeps titles unique in large libraries
    if index >= ADJECTIVES.len() * NOUNS.len() / 2 {
        format!("{adjective} {noun} {index}")
    } else {
        format!("{adjective} {noun}")
    }
}

/// Provider serving simulated resources
pub struct SimulatedProvider {
    id: ProviderId,
    settings: SimulationSettings,
    curve: FadeCurve,
    opened: AtomicUsize,
    seed: u64,
}

impl SimulatedProvider {
    pub fn new(id: ProviderId, settings: SimulationSettings, curve: FadeCurve, seed: u64) -> Self {
        Self {
            id,
            settings,
            curve,
            opened: AtomicUsize::new(0),
            seed,
        }
    }
}

#[async_trait]
impl LibraryProvider for SimulatedProvider {
    fn id(&self) -> &ProviderId {
        &self.id
    }

    fn retrieve_audio_resource(&self, item: &Item) -> Result<Box<dyn AudioResource>> {
        let opened = self.opened.fetch_add(1, Ordering::Relaxed) + 1;
        let fail_every = self.settings.fail_every;
        if fail_every > 0 && opened % fail_every == 0 {
            return Err(JukeError::audio(format!("simulated failure opening {}", item)));
        }

        let length = item
            .duration()
            .unwrap_or(Duration::from_millis(self.settings.song_length_ms));
        Ok(Box::new(SimulatedResource::new(
            item.to_string(),
            length,
            &self.settings,
            self.curve,
        )))
    }

    /// Pretend the source changed: one song vanished, a few new ones appeared
    async fn update(&self, existing: Vec<Item>, callback: &dyn LibraryCallback) -> Result<()> {
        tokio::time::sleep(Duration::from_millis(self.settings.open_delay_ms)).await;
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(existing.len() as u64));

        for item in &existing {
            callback.update_item(item);
        }
        if let Some(gone) = existing.choose(&mut rng) {
            callback.remove_item(gone);
        }

        let song_length = Duration::from_millis(self.settings.song_length_ms);
        let fresh = generate_library(&self.id, existing.len() + 3, 4, song_length, &mut rng);
        for item in fresh.into_iter().skip(existing.len()) {
            callback.add_item(item);
        }
        Ok(())
    }
}

struct Shared {
    position: Duration,
    volume: Volume,
    /// Output level after the running fade, 0-255
    output: u8,
    observer: Option<ResourceObserver>,
}

impl Shared {
    fn report(&self, event: ResourceEvent) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }
}

/// A resource whose playback is a tokio timer
pub struct SimulatedResource {
    name: String,
    length: Duration,
    open_delay: Duration,
    tick: Duration,
    curve: FadeCurve,
    shared: Arc<Mutex<Shared>>,
    clock: Option<JoinHandle<()>>,
    fade: Option<JoinHandle<()>>,
}

impl SimulatedResource {
    fn new(name: String, length: Duration, settings: &SimulationSettings, curve: FadeCurve) -> Self {
        Self {
            name,
            length,
            open_delay: Duration::from_millis(settings.open_delay_ms),
            tick: Duration::from_millis(settings.tick_ms),
            curve,
            shared: Arc::new(Mutex::new(Shared {
                position: Duration::ZERO,
                volume: Volume::default(),
                output: Volume::default().effective(),
                observer: None,
            })),
            clock: None,
            fade: None,
        }
    }

    fn shared(&self) -> std::sync::MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current output level with the fade applied
    pub fn output_level(&self) -> u8 {
        self.shared().output
    }

    fn stop_clock(&mut self) {
        if let Some(clock) = self.clock.take() {
            clock.abort();
        }
    }

    fn start_clock(&mut self) {
        self.stop_clock();
        let shared = Arc::clone(&self.shared);
        let length = self.length;
        let tick = self.tick;

        self.clock = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let mut shared = shared.lock().unwrap_or_else(PoisonError::into_inner);
                let position = (shared.position + tick).min(length);
                shared.position = position;
                shared.report(ResourceEvent::PositionChanged { position });
                if position >= length {
                    shared.report(ResourceEvent::StateChanged {
                        state: PlayState::Ended,
                    });
                    break;
                }
            }
        }));
    }

    fn start_fade(&mut self, direction: FadeDirection, duration: Duration) {
        if let Some(fade) = self.fade.take() {
            fade.abort();
        }
        let shared = Arc::clone(&self.shared);
        let ramp = FadeRamp::new(self.curve, direction, duration);
        let name = self.name.clone();

        self.fade = Some(tokio::spawn(async move {
            let started = tokio::time::Instant::now();
            let mut ticker = tokio::time::interval(Duration::from_millis(50));
            loop {
                ticker.tick().await;
                let elapsed = started.elapsed();
                let volume = {
                    let mut shared = shared.lock().unwrap_or_else(PoisonError::into_inner);
                    let volume = ramp.volume(elapsed, shared.volume.effective());
                    shared.output = volume;
                    volume
                };
                if ramp.is_complete(elapsed) {
                    tracing::trace!("{}: fade {:?} done at volume {}", name, direction, volume);
                    break;
                }
            }
        }));
    }
}

impl AudioResource for SimulatedResource {
    fn load(&mut self) -> Result<()> {
        let shared = Arc::clone(&self.shared);
        let delay = self.open_delay;
        let length = self.length;

        self.clock = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let shared = shared.lock().unwrap_or_else(PoisonError::into_inner);
            shared.report(ResourceEvent::LengthResolved { length });
            shared.report(ResourceEvent::BufferProgress { progress: 1.0 });
            shared.report(ResourceEvent::StateChanged {
                state: PlayState::ReadyToPlay,
            });
        }));
        Ok(())
    }

    fn play(&mut self) {
        self.shared().report(ResourceEvent::StateChanged {
            state: PlayState::Playing,
        });
        self.start_clock();
    }

    fn pause(&mut self) {
        self.stop_clock();
        self.shared().report(ResourceEvent::StateChanged {
            state: PlayState::Paused,
        });
    }

    fn stop(&mut self) {
        self.stop_clock();
        let mut shared = self.shared();
        shared.position = Duration::ZERO;
        shared.report(ResourceEvent::StateChanged {
            state: PlayState::Stopped,
        });
    }

    fn fade_in(&mut self, duration: Duration) {
        self.start_fade(FadeDirection::In, duration);
    }

    fn fade_out(&mut self, duration: Duration) {
        self.start_fade(FadeDirection::Out, duration);
    }

    fn seek(&mut self, position: Duration) {
        let mut shared = self.shared();
        shared.position = position.min(self.length);
        let position = shared.position;
        shared.report(ResourceEvent::PositionChanged { position });
    }

    fn set_volume(&mut self, volume: u8) {
        let mut shared = self.shared();
        shared.volume.set_level(volume);
        if self.fade.as_ref().map_or(true, |fade| fade.is_finished()) {
            shared.output = shared.volume.effective();
        }
    }

    fn subscribe(&mut self, observer: ResourceObserver) {
        self.shared().observer = Some(observer);
    }

    fn unsubscribe(&mut self) {
        self.shared().observer = None;
    }

    fn close(&mut self) {
        self.stop_clock();
        if let Some(fade) = self.fade.take() {
            fade.abort();
        }
        self.shared().observer = None;
    }
}

impl Drop for SimulatedResource {
    fn drop(&mut self) {
        self.close();
    }
}
