use crate::foundation::error::{OverlordError, OverlordResult};
use std::ops::ControlFlow;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// Background thread running a closure at a fixed period until cancelled.
///
/// Cancellation wakes the thread out of its wait, so [`Ticker::cancel`] returns within one tick's
/// worth of work.
pub struct Ticker {
    name: String,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    /// Spawn a named ticker thread. The closure runs once immediately, then after every
    /// `interval`.
    pub fn spawn<F>(name: impl Into<String>, interval: Duration, mut tick: F) -> OverlordResult<Self>
    where
        F: FnMut() + Send + 'static,
    {
        Self::spawn_inner(name.into(), interval, true, move || {
            tick();
            ControlFlow::Continue(())
        })
    }

    /// Spawn a ticker whose first tick comes one `interval` after spawning. The thread exits on
    /// its own once `tick` returns [`ControlFlow::Break`].
    pub fn spawn_delayed<F>(
        name: impl Into<String>,
        interval: Duration,
        tick: F,
    ) -> OverlordResult<Self>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        Self::spawn_inner(name.into(), interval, false, tick)
    }

    fn spawn_inner<F>(
        name: String,
        interval: Duration,
        immediate: bool,
        mut tick: F,
    ) -> OverlordResult<Self>
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                if immediate && tick().is_break() {
                    return;
                }
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => {
                            if tick().is_break() {
                                break;
                            }
                        }
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .map_err(|e| {
                OverlordError::Other(anyhow::anyhow!("failed to spawn '{name}' thread: {e}"))
            })?;

        tracing::debug!(ticker = %name, ?interval, "ticker started");
        Ok(Self {
            name,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Return `true` while the thread is alive and has not been cancelled.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the thread and wait for it to exit. Safe to call repeatedly.
    pub fn cancel(&mut self) {
        drop(self.stop_tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!(ticker = %self.name, "ticker thread panicked");
            } else {
                tracing::debug!(ticker = %self.name, "ticker stopped");
            }
        }
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel();
    }
}
