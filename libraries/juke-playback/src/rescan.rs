//! Library rescan
//!
//! Asks every provider to reconcile its part of the library, then rebuilds
//! and saves the library. Runs on the [`BackgroundTaskCoordinator`] so the
//! player stays responsive.

use crate::tasks::{BackgroundTaskCoordinator, TaskError};
use anyhow::Context;
use juke_core::{Item, LibraryCallback, LibraryProvider, MusicLibrary, PlayHistory, ProviderId};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

/// Progress of the running rescan, for status displays
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanProgress {
    /// No step count known yet
    pub indeterminate: bool,
    pub description: String,
    pub step: usize,
    pub max: usize,
}

/// What a finished rescan changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
}

/// Runs library rescans in the background
pub struct LibraryRescanner {
    coordinator: BackgroundTaskCoordinator,
    progress: Arc<watch::Sender<ScanProgress>>,
}

impl LibraryRescanner {
    pub fn new(coordinator: BackgroundTaskCoordinator) -> Self {
        let (progress, _) = watch::channel(ScanProgress::default());
        Self {
            coordinator,
            progress: Arc::new(progress),
        }
    }

    pub fn coordinator(&self) -> &BackgroundTaskCoordinator {
        &self.coordinator
    }

    pub fn progress(&self) -> watch::Receiver<ScanProgress> {
        self.progress.subscribe()
    }

    /// Rescan all `providers` into `library`
    ///
    /// `on_finished` runs on the background task once the library has been
    /// saved, or with the reason the rescan stopped.
    pub fn rescan(
        &self,
        library: Arc<dyn MusicLibrary>,
        history: Arc<dyn PlayHistory>,
        providers: Vec<Arc<dyn LibraryProvider>>,
        on_finished: impl FnOnce(Result<ScanSummary, TaskError>) + Send + 'static,
    ) -> JoinHandle<()> {
        let progress = Arc::clone(&self.progress);
        progress.send_replace(ScanProgress {
            indeterminate: true,
            description: "Preparing rescan".to_string(),
            step: 0,
            max: 0,
        });

        let done = Arc::clone(&self.progress);
        let on_finished = Arc::new(std::sync::Mutex::new(Some(on_finished)));
        let on_failed = Arc::clone(&on_finished);

        self.coordinator.enqueue(
            run_rescan(library, history, providers, progress),
            move |summary| {
                done.send_replace(ScanProgress::default());
                if let Some(callback) = take_callback(&on_finished) {
                    callback(Ok(summary));
                }
            },
            move |e| {
                if let Some(callback) = take_callback(&on_failed) {
                    callback(Err(e));
                }
            },
        )
    }
}

fn take_callback<F>(slot: &std::sync::Mutex<Option<F>>) -> Option<F> {
    slot.lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .take()
}

async fn run_rescan(
    library: Arc<dyn MusicLibrary>,
    history: Arc<dyn PlayHistory>,
    providers: Vec<Arc<dyn LibraryProvider>>,
    progress: Arc<watch::Sender<ScanProgress>>,
) -> anyhow::Result<ScanSummary> {
    let max = providers.len() + 2;
    let counters = Arc::new(ScanCounters::default());
    info!("Rescanning library with {} providers", providers.len());

    for (step, provider) in providers.iter().enumerate() {
        let provider_id = provider.id().clone();
        progress.send_replace(ScanProgress {
            indeterminate: false,
            description: format!("Updating {}", provider_id),
            step,
            max,
        });

        let existing = library.items_for_provider(&provider_id);
        let callback = ScanCallback {
            library: Arc::clone(&library),
            history: Arc::clone(&history),
            provider_id: provider_id.clone(),
            counters: Arc::clone(&counters),
        };
        provider
            .update(existing, &callback)
            .await
            .with_context(|| format!("provider {} failed to update", provider_id))?;
    }

    progress.send_replace(ScanProgress {
        indeterminate: false,
        description: "Rebuilding library".to_string(),
        step: max - 2,
        max,
    });
    library.rebuild().context("failed to rebuild library")?;

    progress.send_replace(ScanProgress {
        indeterminate: false,
        description: "Saving library".to_string(),
        step: max - 1,
        max,
    });
    library.save().context("failed to save library")?;

    let summary = counters.summary();
    info!(
        "Rescan finished: {} added, {} removed, {} updated",
        summary.added, summary.removed, summary.updated
    );
    Ok(summary)
}

#[derive(Default)]
struct ScanCounters {
    added: AtomicUsize,
    removed: AtomicUsize,
    updated: AtomicUsize,
}

impl ScanCounters {
    fn summary(&self) -> ScanSummary {
        ScanSummary {
            added: self.added.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
        }
    }
}

/// Library side of one provider's update
pub struct ScanCallback {
    library: Arc<dyn MusicLibrary>,
    history: Arc<dyn PlayHistory>,
    provider_id: ProviderId,
    counters: Arc<ScanCounters>,
}

impl LibraryCallback for ScanCallback {
    fn add_item(&self, mut item: Item) -> bool {
        if self.library.items().iter().any(|known| known.same_tuple(&item)) {
            debug!("Skipping duplicate {}", item);
            return false;
        }

        item.provider_id = self.provider_id.clone();
        item.set_played_already(self.history.was_played_already(&item));
        debug!("Adding {}", item);
        self.library.add(item);
        self.counters.added.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn remove_item(&self, item: &Item) -> bool {
        let removed = self.library.remove(&item.key());
        if removed {
            debug!("Removing {}", item);
            self.counters.removed.fetch_add(1, Ordering::Relaxed);
        }
        removed
    }

    fn update_item(&self, item: &Item) -> bool {
        trace!("Updated {}", item);
        self.counters.updated.fetch_add(1, Ordering::Relaxed);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::RecentHistory;
    use async_trait::async_trait;
    use juke_core::{AudioResource, InMemoryLibrary, JukeError};
    use tokio::sync::oneshot;

    struct ScriptedProvider {
        id: ProviderId,
        add: Vec<Item>,
        remove: Vec<Item>,
        fail: bool,
    }

    #[async_trait]
    impl LibraryProvider for ScriptedProvider {
        fn id(&self) -> &ProviderId {
            &self.id
        }

        fn retrieve_audio_resource(&self, item: &Item) -> juke_core::Result<Box<dyn AudioResource>> {
            Err(JukeError::audio(format!("{} is not playable here", item)))
        }

        async fn update(&self, existing: Vec<Item>, callback: &dyn LibraryCallback) -> juke_core::Result<()> {
            if self.fail {
                return Err(JukeError::library("share offline"));
            }
            for item in &existing {
                callback.update_item(item);
            }
            for item in &self.remove {
                callback.remove_item(item);
            }
            for item in &self.add {
                callback.add_item(item.clone());
            }
            Ok(())
        }
    }

    fn song(title: &str, provider: &str) -> Item {
        Item::new(title, "Artist", "Album", ProviderId::new(provider))
    }

    async fn run(
        library: Arc<InMemoryLibrary>,
        history: Arc<RecentHistory>,
        providers: Vec<Arc<dyn LibraryProvider>>,
    ) -> Result<ScanSummary, TaskError> {
        let rescanner = LibraryRescanner::new(BackgroundTaskCoordinator::new(1));
        let (tx, rx) = oneshot::channel();
        rescanner.rescan(library, history, providers, move |result| {
            let _ = tx.send(result);
        });
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_rescan_adds_and_removes() {
        let gone = song("Gone", "disk");
        let library = Arc::new(InMemoryLibrary::with_items([gone.clone(), song("Kept", "disk")]));
        let provider = ScriptedProvider {
            id: ProviderId::new("disk"),
            add: vec![song("New", "disk")],
            remove: vec![gone],
            fail: false,
        };

        let summary = run(library.clone(), Arc::new(RecentHistory::default()), vec![Arc::new(provider)])
            .await
            .unwrap();

        assert_eq!(summary, ScanSummary { added: 1, removed: 1, updated: 2 });
        let mut titles: Vec<String> = library.items().into_iter().map(|i| i.title).collect();
        titles.sort();
        assert_eq!(titles, vec!["Kept", "New"]);
    }

    #[tokio::test]
    async fn test_duplicates_are_rejected_across_providers() {
        let library = Arc::new(InMemoryLibrary::with_items([song("Same", "disk")]));
        let provider = ScriptedProvider {
            id: ProviderId::new("share"),
            add: vec![song("Same", "share")],
            remove: Vec::new(),
            fail: false,
        };

        let summary = run(library.clone(), Arc::new(RecentHistory::default()), vec![Arc::new(provider)])
            .await
            .unwrap();

        assert_eq!(summary.added, 0);
        assert_eq!(library.len(), 1);
    }

    #[tokio::test]
    async fn test_added_items_take_provider_and_history() {
        let library = Arc::new(InMemoryLibrary::new());
        let history = Arc::new(RecentHistory::default());
        history.record(&song("Heard", "share"));
        let provider = ScriptedProvider {
            id: ProviderId::new("share"),
            // Provider id is stamped by the callback
            add: vec![song("Heard", "unset"), song("Fresh", "unset")],
            remove: Vec::new(),
            fail: false,
        };

        run(library.clone(), history, vec![Arc::new(provider)]).await.unwrap();

        let items = library.items();
        assert!(items.iter().all(|i| i.provider_id.as_str() == "share"));
        let heard = items.iter().find(|i| i.title == "Heard").unwrap();
        let fresh = items.iter().find(|i| i.title == "Fresh").unwrap();
        assert!(heard.played_already());
        assert!(!fresh.played_already());
    }

    #[tokio::test]
    async fn test_provider_failure_is_reported() {
        let library = Arc::new(InMemoryLibrary::new());
        let provider = ScriptedProvider {
            id: ProviderId::new("share"),
            add: Vec::new(),
            remove: Vec::new(),
            fail: true,
        };

        let error = run(library, Arc::new(RecentHistory::default()), vec![Arc::new(provider)])
            .await
            .unwrap_err();

        assert!(matches!(error, TaskError::Failed(_)));
        assert!(error.to_string().contains("share"));
    }

    #[tokio::test]
    async fn test_progress_returns_to_idle() {
        let rescanner = LibraryRescanner::new(BackgroundTaskCoordinator::new(1));
        let progress = rescanner.progress();
        let (tx, rx) = oneshot::channel();

        rescanner.rescan(
            Arc::new(InMemoryLibrary::new()),
            Arc::new(RecentHistory::default()),
            Vec::new(),
            move |result| {
                let _ = tx.send(result.is_ok());
            },
        );

        assert!(rx.await.unwrap());
        assert_eq!(*progress.borrow(), ScanProgress::default());
        rescanner.coordinator().wait_idle().await;
        assert!(!rescanner.coordinator().is_busy());
    }
}
