//! Owning-context dispatcher
//!
//! All mutations of a piece of state `S` run as jobs on one loop that owns
//! `S`. Other threads (backend callbacks, timers, bus handlers, async
//! callers) hand jobs over through a [`Dispatcher`]; jobs run one at a time
//! in submission order.

use crate::error::{PlaybackError, Result};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

type Job<S> = Box<dyn FnOnce(&mut S) + Send>;

/// Create a dispatcher and the loop that executes its jobs
pub fn channel<S: 'static>() -> (Dispatcher<S>, DispatchLoop<S>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Dispatcher { tx }, DispatchLoop { rx })
}

/// Hands jobs to the owning context of `S`
pub struct Dispatcher<S> {
    tx: mpsc::UnboundedSender<Job<S>>,
}

impl<S> Clone for Dispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S: 'static> Dispatcher<S> {
    /// Queue `action` and return immediately
    pub fn begin_invoke(&self, action: impl FnOnce(&mut S) + Send + 'static) -> Result<()> {
        self.tx
            .send(Box::new(action))
            .map_err(|_| PlaybackError::DispatcherClosed)
    }

    /// Run `action` on the owning context and wait for its result
    ///
    /// Must not be awaited from inside a job of the same dispatcher: the loop
    /// would wait for itself.
    pub async fn invoke<R: Send + 'static>(
        &self,
        action: impl FnOnce(&mut S) -> R + Send + 'static,
    ) -> Result<R> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.begin_invoke(move |state| {
            let _ = reply_tx.send(action(state));
        })?;
        reply_rx.await.map_err(|_| PlaybackError::DispatcherClosed)
    }

    /// Blocking variant of [`invoke`](Self::invoke) for threads outside the runtime
    ///
    /// Panics if called from within an async context, like
    /// `oneshot::Receiver::blocking_recv`.
    pub fn invoke_blocking<R: Send + 'static>(
        &self,
        action: impl FnOnce(&mut S) -> R + Send + 'static,
    ) -> Result<R> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.begin_invoke(move |state| {
            let _ = reply_tx.send(action(state));
        })?;
        reply_rx
            .blocking_recv()
            .map_err(|_| PlaybackError::DispatcherClosed)
    }

    /// Schedule `callback` on the owning context after `interval`
    ///
    /// See [`WeakDispatcher::timer`].
    pub fn timer(
        &self,
        interval: Duration,
        mode: TimerMode,
        callback: impl FnMut(&mut S) + Send + 'static,
    ) -> DispatcherTimer {
        self.downgrade().timer(interval, mode, callback)
    }

    /// Handle that does not keep the loop alive
    pub fn downgrade(&self) -> WeakDispatcher<S> {
        WeakDispatcher {
            tx: self.tx.downgrade(),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Dispatcher handle that lets the loop end once all strong handles are gone
///
/// State that needs to schedule work on its own loop holds one of these.
pub struct WeakDispatcher<S> {
    tx: mpsc::WeakUnboundedSender<Job<S>>,
}

impl<S> Clone for WeakDispatcher<S> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<S: 'static> WeakDispatcher<S> {
    pub fn upgrade(&self) -> Option<Dispatcher<S>> {
        self.tx.upgrade().map(|tx| Dispatcher { tx })
    }

    /// Queue `action`; dropped silently if the loop is gone
    pub fn begin_invoke(&self, action: impl FnOnce(&mut S) + Send + 'static) -> Result<()> {
        self.upgrade()
            .ok_or(PlaybackError::DispatcherClosed)?
            .begin_invoke(action)
    }

    /// Schedule `callback` on the owning context after `interval`
    ///
    /// One-shot timers fire once; repeating timers fire every `interval` until
    /// the returned handle is dropped or cancelled. Dropping the handle before
    /// the interval elapsed means the callback never runs.
    pub fn timer(
        &self,
        interval: Duration,
        mode: TimerMode,
        callback: impl FnMut(&mut S) + Send + 'static,
    ) -> DispatcherTimer {
        let weak = self.clone();
        let callback = Arc::new(Mutex::new(callback));

        let handle = tokio::spawn(async move {
            // interval_at panics on a zero period
            let period = interval.max(Duration::from_millis(1));
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, period);
            loop {
                ticker.tick().await;
                let callback = Arc::clone(&callback);
                let delivered = weak.begin_invoke(move |state| {
                    let mut callback = callback.lock().unwrap_or_else(PoisonError::into_inner);
                    (*callback)(state);
                });
                if delivered.is_err() {
                    trace!("timer stopped, dispatcher closed");
                    break;
                }
                if mode == TimerMode::OneShot {
                    break;
                }
            }
        });

        DispatcherTimer { handle }
    }
}

/// Whether a timer fires once or repeatedly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerMode {
    OneShot,
    Repeating,
}

/// Scheduled timer; aborted when dropped
#[derive(Debug)]
pub struct DispatcherTimer {
    handle: JoinHandle<()>,
}

impl DispatcherTimer {
    pub fn cancel(self) {
        drop(self);
    }

    /// Whether the timer task has ended (fired for one-shot, or cancelled)
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for DispatcherTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Executes dispatched jobs against the owned state
pub struct DispatchLoop<S> {
    rx: mpsc::UnboundedReceiver<Job<S>>,
}

impl<S: Send + 'static> DispatchLoop<S> {
    /// Run jobs until every strong [`Dispatcher`] is dropped, then return the state
    pub async fn run(mut self, mut state: S) -> S {
        debug!("Dispatch loop started");
        while let Some(job) = self.rx.recv().await {
            job(&mut state);
        }
        debug!("Dispatch loop finished");
        state
    }

    /// Spawn [`run`](Self::run) on the current runtime
    pub fn spawn(self, state: S) -> JoinHandle<S> {
        tokio::spawn(self.run(state))
    }

    /// Run every job queued so far (and any they queue) without waiting
    ///
    /// Returns the number of jobs executed.
    pub fn run_pending(&mut self, state: &mut S) -> usize {
        let mut executed = 0;
        while let Ok(job) = self.rx.try_recv() {
            job(state);
            executed += 1;
        }
        executed
    }
}
