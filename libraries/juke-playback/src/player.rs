//! Async player facade
//!
//! Spawns the controller on its own dispatch loop and exposes its surface as
//! async methods. Each call is one hand-off to the owning context.

use crate::bus::{MessageBus, Registration};
use crate::controller::{ControllerDeps, PlaybackController};
use crate::dispatcher::{self, Dispatcher};
use crate::error::{PlaybackError, Result};
use crate::events::{BusMessage, PlayerCommand, Topic};
use crate::session::SessionInfo;
use crate::strategy::SelectionStrategy;
use crate::types::{AdvanceOutcome, PlaybackConfig};
use crate::volume::Volume;
use juke_core::{Item, PlayHistory, ProviderRegistry, SessionId};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Handle to a running playback controller
pub struct Player {
    dispatcher: Dispatcher<PlaybackController>,
    bus: MessageBus,
    _commands: Registration,
    task: JoinHandle<PlaybackController>,
}

impl Player {
    /// Start the controller loop
    ///
    /// `PlayerCommand`s published on `bus` are forwarded to the controller.
    /// Must be called within a tokio runtime.
    pub fn spawn(
        config: PlaybackConfig,
        registry: Arc<ProviderRegistry>,
        strategy: Box<dyn SelectionStrategy>,
        history: Arc<dyn PlayHistory>,
        bus: MessageBus,
    ) -> Result<Self> {
        config.validate()?;

        let (dispatcher, dispatch_loop) = dispatcher::channel();
        let deps = ControllerDeps {
            registry,
            strategy,
            bus: bus.clone(),
            history,
        };
        let controller = PlaybackController::new(config, deps, dispatcher.downgrade());
        let task = dispatch_loop.spawn(controller);

        let commands = dispatcher.downgrade();
        let registration = bus.register(Topic::PlayerCommand, move |message| {
            if let BusMessage::Command(command) = message {
                if commands
                    .begin_invoke(move |c: &mut PlaybackController| c.handle_command(command))
                    .is_err()
                {
                    debug!("Command {:?} dropped, player stopped", command);
                }
            }
        });

        info!("Player started");
        Ok(Self {
            dispatcher,
            bus,
            _commands: registration,
            task,
        })
    }

    pub fn bus(&self) -> &MessageBus {
        &self.bus
    }

    /// Publish a command on the bus, as a remote control would
    pub fn send(&self, command: PlayerCommand) {
        self.bus.publish(BusMessage::Command(command));
    }

    /// Run `action` on the controller and return its result
    pub async fn with_controller<R: Send + 'static>(
        &self,
        action: impl FnOnce(&mut PlaybackController) -> R + Send + 'static,
    ) -> Result<R> {
        self.dispatcher.invoke(action).await
    }

    // ===== Playback =====

    pub async fn load_startup_items(&self) -> Result<()> {
        self.with_controller(PlaybackController::load_startup_items)
            .await
    }

    pub async fn play(&self) -> Result<()> {
        self.with_controller(PlaybackController::play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.with_controller(PlaybackController::pause).await
    }

    pub async fn toggle_play_pause(&self) -> Result<()> {
        self.with_controller(PlaybackController::toggle_play_pause)
            .await
    }

    pub async fn play_next(&self, crossfade: bool) -> Result<AdvanceOutcome> {
        self.with_controller(move |c| c.play_next(crossfade, false))
            .await
    }

    pub async fn stop(&self) -> Result<()> {
        self.with_controller(PlaybackController::stop).await
    }

    /// Seek the now-playing item; `false` if the request was dropped
    pub async fn seek(&self, position: Duration) -> Result<bool> {
        self.with_controller(move |c| c.seek(position)).await
    }

    pub async fn set_volume(&self, level: u8) -> Result<()> {
        self.with_controller(move |c| c.set_volume(level)).await
    }

    pub async fn toggle_mute(&self) -> Result<bool> {
        self.with_controller(PlaybackController::toggle_mute).await
    }

    // ===== Queue =====

    pub async fn enqueue(&self, item: Item) -> Result<SessionId> {
        self.with_controller(move |c| c.enqueue(item)).await
    }

    pub async fn quickplay(&self, item: Item) -> Result<SessionId> {
        self.with_controller(move |c| c.quickplay(item)).await
    }

    pub async fn insert_item(&self, index: usize, item: Item) -> Result<SessionId> {
        self.with_controller(move |c| c.insert_item(index, item))
            .await
    }

    pub async fn remove_queued(&self, id: SessionId) -> Result<()> {
        self.with_controller(move |c| c.remove_queued(id)).await?
    }

    pub async fn move_up(&self, id: SessionId) -> Result<()> {
        self.with_controller(move |c| c.move_up(id)).await?
    }

    pub async fn move_down(&self, id: SessionId) -> Result<()> {
        self.with_controller(move |c| c.move_down(id)).await?
    }

    pub async fn clear_queue(&self) -> Result<usize> {
        self.with_controller(PlaybackController::clear_queue).await
    }

    pub async fn swap_coming_up(&self) -> Result<bool> {
        self.with_controller(PlaybackController::swap_coming_up)
            .await
    }

    pub async fn remove_coming_up(&self) -> Result<bool> {
        self.with_controller(PlaybackController::remove_coming_up)
            .await
    }

    pub async fn block_coming_up(&self) -> Result<bool> {
        self.with_controller(PlaybackController::block_coming_up)
            .await
    }

    pub async fn on_library_updated(&self) -> Result<()> {
        self.with_controller(PlaybackController::on_library_updated)
            .await
    }

    // ===== Snapshots =====

    pub async fn now_playing(&self) -> Result<Option<SessionInfo>> {
        self.with_controller(|c| c.now_playing().map(SessionInfo::from))
            .await
    }

    pub async fn coming_up(&self) -> Result<Option<SessionInfo>> {
        self.with_controller(|c| c.coming_up().map(SessionInfo::from))
            .await
    }

    pub async fn queued(&self) -> Result<Vec<SessionInfo>> {
        self.with_controller(|c| c.queue().entries().map(SessionInfo::from).collect())
            .await
    }

    /// Queue summary like "3 items (0:09:12)"
    pub async fn queue_length_text(&self) -> Result<String> {
        self.with_controller(|c| c.queue().length_text()).await
    }

    pub async fn is_starved(&self) -> Result<bool> {
        self.with_controller(|c| c.is_starved()).await
    }

    pub async fn volume(&self) -> Result<Volume> {
        self.with_controller(|c| c.volume()).await
    }

    /// Close every session and wait for the controller loop to end
    pub async fn shutdown(self) -> Result<()> {
        let Self {
            dispatcher,
            bus: _,
            _commands,
            task,
        } = self;

        dispatcher
            .invoke(PlaybackController::shutdown)
            .await?;
        drop(_commands);
        drop(dispatcher);

        task.await.map_err(|_| PlaybackError::DispatcherClosed)?;
        info!("Player stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::RecentHistory;
    use crate::shuffle::{ShuffleMode, UnplayedShuffler};
    use crate::test_support::{item, Harness, ResourceCall};
    use juke_core::{InMemoryLibrary, PlayState};
    use std::time::Duration;

    fn spawn_player(harness: &Harness, titles: &[&str]) -> Player {
        let library = Arc::new(InMemoryLibrary::with_items(titles.iter().map(|t| item(t))));
        Player::spawn(
            PlaybackConfig::default(),
            Arc::clone(&harness.registry),
            Box::new(UnplayedShuffler::with_seed(library, ShuffleMode::Random, 9)),
            Arc::new(RecentHistory::default()),
            MessageBus::default(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_startup_and_play() {
        let harness = Harness::new();
        let player = spawn_player(&harness, &["A", "B", "C"]);

        player.load_startup_items().await.unwrap();
        player.play().await.unwrap();

        let now = player.now_playing().await.unwrap().unwrap();
        assert_eq!(now.state, PlayState::Playing);
        assert!(player.coming_up().await.unwrap().is_some());

        player.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_queue_operations_round_trip() {
        let harness = Harness::new();
        let player = spawn_player(&harness, &["A", "B"]);
        player.load_startup_items().await.unwrap();

        let first = player.enqueue(item("X")).await.unwrap();
        let second = player.enqueue(item("Y")).await.unwrap();
        player.move_down(first).await.unwrap();

        let queued: Vec<SessionId> = player.queued().await.unwrap().iter().map(|s| s.id).collect();
        assert_eq!(queued, vec![second, first]);

        assert!(matches!(
            player.remove_queued(SessionId::generate()).await,
            Err(PlaybackError::SessionNotQueued(_))
        ));
        assert_eq!(player.clear_queue().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_bus_command_reaches_controller() {
        let harness = Harness::new();
        let player = spawn_player(&harness, &["A", "B", "C"]);
        player.load_startup_items().await.unwrap();

        player.send(PlayerCommand::TogglePlayPause);

        let playing = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                let state = player.now_playing().await.unwrap().map(|s| s.state);
                if state == Some(PlayState::Playing) {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(playing.is_ok());
    }

    #[tokio::test]
    async fn test_seek_round_trip() {
        let harness = Harness::new();
        let player = spawn_player(&harness, &["A", "B"]);
        player.load_startup_items().await.unwrap();
        player.play().await.unwrap();

        assert!(player.seek(Duration::from_secs(100)).await.unwrap());
        assert!(!player.seek(Duration::from_secs(101)).await.unwrap());

        let now = player.now_playing().await.unwrap().unwrap();
        assert_eq!(now.position, Duration::from_secs(100));
        assert_eq!(
            harness.log.count(&now.item.title, ResourceCall::Seek(Duration::ZERO)),
            1
        );
        player.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let harness = Harness::new();
        let config = PlaybackConfig {
            bus_capacity: 0,
            ..PlaybackConfig::default()
        };
        let result = Player::spawn(
            config,
            Arc::clone(&harness.registry),
            Box::new(|_: &crate::strategy::ExclusionSet| -> Option<Item> { None }),
            Arc::new(RecentHistory::default()),
            MessageBus::default(),
        );
        assert!(matches!(result, Err(PlaybackError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_shutdown_closes_sessions() {
        let harness = Harness::new();
        let player = spawn_player(&harness, &["A", "B"]);
        player.load_startup_items().await.unwrap();
        let now = player.now_playing().await.unwrap().unwrap().item.title;
        let next = player.coming_up().await.unwrap().unwrap().item.title;

        player.shutdown().await.unwrap();

        assert_eq!(harness.log.count(&now, ResourceCall::Close), 1);
        assert_eq!(harness.log.count(&next, ResourceCall::Close), 1);
    }
}
