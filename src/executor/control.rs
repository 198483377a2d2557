//! Run-scoped stop and pause signals
//!
//! [`RunControl`] is the owner side, held by whoever drives the run (CLI
//! input, a Ctrl-C handler, a test). Workers only ever see the read side,
//! [`ControlSignals`]. A run gets its own pair; nothing here is global.

use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Owner side of the stop and pause flags
#[derive(Debug)]
pub struct RunControl {
    stop_tx: watch::Sender<bool>,
    pause_tx: watch::Sender<bool>,
}

impl RunControl {
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        let (pause_tx, _) = watch::channel(false);
        Self { stop_tx, pause_tx }
    }

    /// Read-only handle to pass into a run
    pub fn signals(&self) -> ControlSignals {
        ControlSignals {
            stop: self.stop_tx.subscribe(),
            pause: self.pause_tx.subscribe(),
        }
    }

    /// Request a stop. One-way for the lifetime of the run.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    pub fn pause(&self) {
        self.pause_tx.send_replace(true);
    }

    pub fn resume(&self) {
        self.pause_tx.send_replace(false);
    }

    /// Flip the pause flag and return the new state
    pub fn toggle_pause(&self) -> bool {
        let mut paused = false;
        self.pause_tx.send_modify(|flag| {
            *flag = !*flag;
            paused = *flag;
        });
        paused
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop_tx.borrow()
    }

    pub fn is_paused(&self) -> bool {
        *self.pause_tx.borrow()
    }
}

impl Default for RunControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Worker side of the stop and pause flags. Cheap to clone.
///
/// Once the owning [`RunControl`] is dropped a pending pause no longer
/// holds anyone back, while a stop that was already requested stays in
/// force.
#[derive(Debug, Clone)]
pub struct ControlSignals {
    stop: watch::Receiver<bool>,
    pause: watch::Receiver<bool>,
}

impl ControlSignals {
    /// Signals that never fire, for one-off probes outside a managed run
    pub fn detached() -> Self {
        let (_stop_tx, stop) = watch::channel(false);
        let (_pause_tx, pause) = watch::channel(false);
        Self { stop, pause }
    }

    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    pub fn is_paused(&self) -> bool {
        *self.pause.borrow() && self.pause.has_changed().is_ok()
    }

    /// Resolves once a stop is requested; never resolves if it cannot be
    pub async fn stopped(&self) {
        let mut stop = self.stop.clone();
        if stop.wait_for(|stopped| *stopped).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Resolves once a pause is requested; never resolves if it cannot be.
    ///
    /// A pause left behind by a dropped owner does not count, matching
    /// [`ControlSignals::is_paused`].
    pub async fn paused(&self) {
        let mut pause = self.pause.clone();
        let closed = pause.wait_for(|paused| *paused).await.is_err();
        if closed || pause.has_changed().is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Park until the pause clears or a stop arrives. Returns the time spent parked.
    pub async fn wait_while_paused(&self) -> Duration {
        let started = Instant::now();
        let mut pause = self.pause.clone();
        tokio::select! {
            // An Err means the owner is gone, which also releases the pause.
            _ = pause.wait_for(|paused| !*paused) => {}
            _ = self.stopped() => {}
        }
        started.elapsed()
    }
}
