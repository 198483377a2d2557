//! Target queue drained by the worker pool
//!
//! Targets are pushed once, then the queue is closed. A worker learns the
//! queue is finished from [`Dequeue::Closed`], which is only returned once
//! the queue is both closed and empty.

use super::control::ControlSignals;
use crate::models::ProbeTarget;
use std::sync::Mutex;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

/// Outcome of one dequeue attempt
#[derive(Debug, Clone, PartialEq)]
pub enum Dequeue {
    Target(ProbeTarget),
    /// Pause is set; nothing was taken
    Paused,
    /// Stop is set; nothing was taken
    Stopped,
    /// Closed and empty
    Closed,
}

pub struct TargetQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<ProbeTarget>>>,
    receiver: AsyncMutex<mpsc::UnboundedReceiver<ProbeTarget>>,
}

impl TargetQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: AsyncMutex::new(rx),
        }
    }

    /// A queue holding `targets`, already closed
    pub fn from_targets<I: IntoIterator<Item = ProbeTarget>>(targets: I) -> Self {
        let queue = Self::new();
        for target in targets {
            // Cannot fail: the queue is still open.
            let _ = queue.push(target);
        }
        queue.close();
        queue
    }

    /// Add a target. Hands it back if the queue is already closed.
    pub fn push(&self, target: ProbeTarget) -> Result<(), ProbeTarget> {
        let guard = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        match guard.as_ref() {
            Some(tx) => tx.send(target).map_err(|e| e.0),
            None => Err(target),
        }
    }

    /// No more targets will be pushed
    pub fn close(&self) {
        let mut guard = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        guard.take();
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().unwrap_or_else(|e| e.into_inner()).is_none()
    }

    /// Take the next target, waiting until one is available, the queue is
    /// finished, or a control signal fires.
    pub async fn dequeue(&self, signals: &ControlSignals) -> Dequeue {
        if signals.is_stopped() {
            return Dequeue::Stopped;
        }
        if signals.is_paused() {
            return Dequeue::Paused;
        }

        let mut receiver = tokio::select! {
            biased;
            _ = signals.stopped() => return Dequeue::Stopped,
            receiver = self.receiver.lock() => receiver,
        };

        // Another worker held the lock; the flags may have moved meanwhile.
        if signals.is_stopped() {
            return Dequeue::Stopped;
        }
        if signals.is_paused() {
            return Dequeue::Paused;
        }

        tokio::select! {
            biased;
            _ = signals.stopped() => Dequeue::Stopped,
            _ = signals.paused() => Dequeue::Paused,
            next = receiver.recv() => match next {
                Some(target) => Dequeue::Target(target),
                None => Dequeue::Closed,
            },
        }
    }

    /// Remove every target not yet taken by a worker
    pub async fn drain(&self) -> Vec<ProbeTarget> {
        let mut receiver = self.receiver.lock().await;
        let mut drained = Vec::new();
        while let Ok(target) = receiver.try_recv() {
            drained.push(target);
        }
        drained
    }
}

impl Default for TargetQueue {
    fn default() -> Self {
        Self::new()
    }
}
