//! Background task coordinator
//!
//! Runs maintenance work (library rescans, bulk updates) off the owning
//! context with bounded concurrency and a busy counter that the UI can watch.

use futures_util::future;
use futures_util::stream::{self, StreamExt};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Why a background task did not complete
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task failed: {0:#}")]
    Failed(anyhow::Error),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task cancelled")]
    Cancelled,
}

struct Inner {
    permits: Arc<Semaphore>,
    count: watch::Sender<usize>,
}

/// Bounded executor for background work with an observable busy counter
#[derive(Clone)]
pub struct BackgroundTaskCoordinator {
    inner: Arc<Inner>,
}

impl BackgroundTaskCoordinator {
    /// Coordinator running at most `concurrency` tasks at a time
    pub fn new(concurrency: usize) -> Self {
        let (count, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                permits: Arc::new(Semaphore::new(concurrency.max(1))),
                count,
            }),
        }
    }

    /// Run `task` in the background
    ///
    /// The task counts as busy from this call until its callback has run.
    /// `on_completed` receives the value of a successful task; `on_failed`
    /// receives the error, panic or cancellation of an unsuccessful one.
    /// Must be called within a tokio runtime.
    pub fn enqueue<T, F, C, E>(&self, task: F, on_completed: C, on_failed: E) -> JoinHandle<()>
    where
        T: Send + 'static,
        F: Future<Output = anyhow::Result<T>> + Send + 'static,
        C: FnOnce(T) + Send + 'static,
        E: FnOnce(TaskError) + Send + 'static,
    {
        let busy = BusyGuard::acquire(Arc::clone(&self.inner));
        let permits = Arc::clone(&self.inner.permits);

        tokio::spawn(async move {
            let _busy = busy;
            let Ok(_permit) = permits.acquire_owned().await else {
                on_failed(TaskError::Cancelled);
                return;
            };

            // Nested task so a panic surfaces as a JoinError instead of
            // tearing down this one
            let outcome = match tokio::spawn(task).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(TaskError::Failed(e)),
                Err(e) if e.is_panic() => Err(TaskError::Panicked(panic_message(e.into_panic()))),
                Err(_) => Err(TaskError::Cancelled),
            };

            match outcome {
                Ok(value) => on_completed(value),
                Err(e) => {
                    warn!("Background task did not complete: {}", e);
                    on_failed(e);
                }
            }
        })
    }

    /// Tasks enqueued and not yet finished
    pub fn task_count(&self) -> usize {
        *self.inner.count.borrow()
    }

    pub fn is_busy(&self) -> bool {
        self.task_count() > 0
    }

    /// Watch the task count; every change (including completions) is signalled
    pub fn subscribe(&self) -> watch::Receiver<usize> {
        self.inner.count.subscribe()
    }

    /// Wait until no task is pending
    pub async fn wait_idle(&self) {
        let mut count = self.subscribe();
        // Sender lives in self, so the channel cannot close here
        let _ = count.wait_for(|n| *n == 0).await;
    }
}

impl Default for BackgroundTaskCoordinator {
    fn default() -> Self {
        Self::new(4)
    }
}

/// Counts one task as busy; decrements exactly once when dropped
struct BusyGuard {
    inner: Arc<Inner>,
}

impl BusyGuard {
    fn acquire(inner: Arc<Inner>) -> Self {
        inner.count.send_modify(|n| *n += 1);
        Self { inner }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.inner.count.send_modify(|n| *n = n.saturating_sub(1));
        debug!("Background task finished, {} pending", *self.inner.count.borrow());
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Run one future per item with at most `limit` in flight
///
/// No new future is started once `cancel` fires; those already running are
/// awaited. Results come back in completion order, failures included.
pub async fn run_with_max_concurrency<I, T, R, F, Fut>(
    limit: usize,
    cancel: &CancellationToken,
    items: I,
    factory: F,
) -> Vec<Result<R, TaskError>>
where
    I: IntoIterator<Item = T>,
    F: FnMut(T) -> Fut,
    Fut: Future<Output = anyhow::Result<R>>,
{
    stream::iter(items)
        .take_while(|_| future::ready(!cancel.is_cancelled()))
        .map(factory)
        .buffer_unordered(limit.max(1))
        .map(|result| {
            result.map_err(|e| {
                warn!("Bulk item failed: {:#}", e);
                TaskError::Failed(e)
            })
        })
        .collect()
        .await
}
