/// Juke - automatic jukebox driven by a simulated audio backend
mod config;
mod sim;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::JukeConfig;
use juke_core::{
    InMemoryLibrary, Item, LibraryProvider, MusicLibrary, PlayHistory, ProviderId, ProviderRegistry,
};
use juke_playback::{
    BackgroundTaskCoordinator, BusMessage, LibraryRescanner, MessageBus, PlaybackStateEvent,
    Player, PlayerCommand, RecentHistory, UnplayedShuffler,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sim::SimulatedProvider;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "juke")]
#[command(about = "Automatic jukebox with crossfading playback", long_about = None)]
struct Cli {
    /// Configuration file path (default: ./juke.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play through the simulated library
    Play {
        /// Stop after this many songs have started
        #[arg(short, long, default_value_t = 5)]
        songs: usize,

        /// Skip to the next song every N seconds
        #[arg(long)]
        skip_every: Option<u64>,
    },
    /// Rescan the simulated library in the background
    Scan,
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "juke=info,juke_playback=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = JukeConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Play { songs, skip_every } => {
            play(config, songs, skip_every.map(Duration::from_secs)).await?;
        }
        Commands::Scan => {
            scan(config).await?;
        }
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

/// Library, provider and history shared by all subcommands
struct Simulation {
    library: Arc<InMemoryLibrary>,
    provider: Arc<SimulatedProvider>,
    history: Arc<RecentHistory>,
    seed: u64,
}

impl Simulation {
    fn new(config: &JukeConfig) -> Self {
        let seed = config.library.seed.unwrap_or_else(rand::random);
        let provider_id = ProviderId::new("simulated");
        let mut rng = StdRng::seed_from_u64(seed);

        let items = sim::generate_library(
            &provider_id,
            config.library.songs,
            config.library.artists,
            Duration::from_millis(config.simulation.song_length_ms),
            &mut rng,
        );
        tracing::info!("Generated {} songs (seed {})", items.len(), seed);

        Self {
            library: Arc::new(InMemoryLibrary::with_items(items)),
            provider: Arc::new(SimulatedProvider::new(
                provider_id,
                config.simulation.clone(),
                config.playback.fade_curve,
                seed,
            )),
            history: Arc::new(RecentHistory::new(config.playback.history_size)),
            seed,
        }
    }
}

fn describe(item: &Item) -> String {
    match item.duration() {
        Some(length) => format!("{} [{}s]", item, length.as_secs()),
        None => item.to_string(),
    }
}

async fn play(config: JukeConfig, songs: usize, skip_every: Option<Duration>) -> Result<()> {
    let simulation = Simulation::new(&config);
    let library: Arc<dyn MusicLibrary> = simulation.library.clone();
    let history: Arc<dyn PlayHistory> = simulation.history.clone();
    let provider: Arc<dyn LibraryProvider> = simulation.provider.clone();

    let bus = MessageBus::new(config.playback.bus_capacity);
    let mut messages = bus.subscribe();
    let strategy = UnplayedShuffler::with_seed(library, config.library.shuffle, simulation.seed);

    let player = Player::spawn(
        config.playback.clone(),
        Arc::new(ProviderRegistry::new().with(provider)),
        Box::new(strategy),
        history,
        bus.clone(),
    )?;

    tracing::info!(
        "Crossfade {} ms ({}), pause fade {} ms",
        config.playback.crossfade_ms,
        config.playback.fade_curve.display_name(),
        config.playback.pause_fade_ms
    );
    player.load_startup_items().await?;
    if !config.playback.autoplay_on_startup {
        player.play().await?;
    }

    let mut skip = skip_every.filter(|period| !period.is_zero()).map(|period| {
        tokio::time::interval_at(tokio::time::Instant::now() + period, period)
    });
    let mut started = 0;

    loop {
        let skip_tick = async {
            match skip.as_mut() {
                Some(interval) => {
                    interval.tick().await;
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            message = messages.recv() => match message {
                Ok(BusMessage::NowPlayingChanged { item: Some(item) }) => {
                    started += 1;
                    if started > songs {
                        tracing::info!("Played {} songs, stopping", songs);
                        break;
                    }
                    tracing::info!("Now playing {} ({}/{})", describe(&item), started, songs);
                    if let Some(next) = player.coming_up().await? {
                        tracing::info!("Coming up: {}", describe(&next.item));
                    }
                }
                Ok(BusMessage::NowPlayingChanged { item: None }) => {
                    tracing::info!("Nothing left to play");
                    break;
                }
                Ok(BusMessage::PlaybackState { state: PlaybackStateEvent::Playing }) => {
                    tracing::debug!("Playback started");
                }
                Ok(BusMessage::PlaybackState { state: PlaybackStateEvent::Paused }) => {
                    tracing::debug!("Playback paused");
                }
                Ok(BusMessage::PlaybackFinished) => {
                    tracing::info!("Library exhausted, nothing left to play");
                    break;
                }
                Ok(BusMessage::Progress { position, length }) => {
                    tracing::trace!("Position {:?} of {:?}", position, length);
                }
                Ok(BusMessage::ItemFailed { item, reason }) => {
                    tracing::warn!("Skipped {}: {}", item, reason);
                }
                Ok(BusMessage::QueueStarved) => {
                    tracing::warn!("Nothing left to queue, finishing the current song");
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("Missed {} player messages", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            () = skip_tick => {
                tracing::info!("Skipping");
                bus.publish(BusMessage::Command(PlayerCommand::Next));
            }
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Interrupted");
                break;
            }
        }
    }

    tracing::info!("Queue: {}", player.queue_length_text().await?);
    player.shutdown().await?;
    tracing::info!("{} songs in play history", simulation.history.len());
    Ok(())
}

async fn scan(config: JukeConfig) -> Result<()> {
    let simulation = Simulation::new(&config);
    let before = simulation.library.len();

    let rescanner =
        LibraryRescanner::new(BackgroundTaskCoordinator::new(config.playback.background_concurrency));
    let mut progress = rescanner.progress();
    let reporter = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let current = progress.borrow_and_update().clone();
            if current.indeterminate {
                tracing::info!("{}", current.description);
            } else {
                tracing::info!("{} ({}/{})", current.description, current.step, current.max);
            }
        }
    });

    let (done, finished) = tokio::sync::oneshot::channel();
    let providers: Vec<Arc<dyn LibraryProvider>> = vec![simulation.provider.clone()];
    rescanner.rescan(
        simulation.library.clone(),
        simulation.history.clone(),
        providers,
        move |result| {
            let _ = done.send(result);
        },
    );

    let summary = finished.await.context("Rescan task vanished")??;
    rescanner.coordinator().wait_idle().await;
    drop(rescanner);
    let _ = reporter.await;

    tracing::info!(
        "Rescan finished: {} added, {} removed, {} updated ({} -> {} songs)",
        summary.added,
        summary.removed,
        summary.updated,
        before,
        simulation.library.len()
    );
    Ok(())
}
