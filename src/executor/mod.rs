//! Probe execution engine
//!
//! This module contains the concurrent run machinery:
//! - Run-scoped stop/pause control ([`RunControl`], [`ControlSignals`])
//! - A closable target queue with cancellable dequeue
//! - The bounded worker pool that drains it and aggregates the outcome

pub mod control;
pub mod pool;
pub mod queue;

pub use control::{ControlSignals, RunControl};
pub use pool::WorkerPool;
pub use queue::{Dequeue, TargetQueue};

use crate::aggregator::RunSummary;
use crate::logging::ProbeLogger;
use crate::models::{ProbeResult, ProbeTarget};
use crate::probe::{NetworkProber, ProbeParams};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Receives the completion percentage after each published result
pub type ProgressCallback = Arc<dyn Fn(f64) -> anyhow::Result<()> + Send + Sync>;

/// Receives every published or skipped result, in completion order
pub type ResultCallback = Arc<dyn Fn(&ProbeResult) -> anyhow::Result<()> + Send + Sync>;

/// Caller hooks for a run. Errors and panics raised here are logged, never propagated.
#[derive(Clone, Default)]
pub struct RunCallbacks {
    pub progress: Option<ProgressCallback>,
    pub result: Option<ResultCallback>,
}

impl RunCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(f64) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    pub fn on_result<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ProbeResult) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.result = Some(Arc::new(callback));
        self
    }
}

impl fmt::Debug for RunCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunCallbacks")
            .field("progress", &self.progress.is_some())
            .field("result", &self.result.is_some())
            .finish()
    }
}

/// Outcome of one pool run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    /// Published results, ranked
    pub results: Vec<ProbeResult>,
    /// Targets never measured because of a stop request
    pub skipped: Vec<ProbeTarget>,
    pub stopped: bool,
    pub elapsed: Duration,
    pub summary: RunSummary,
    /// Run-level conditions reported once, such as a missing ping utility
    pub notices: Vec<String>,
}

impl RunReport {
    /// Published plus skipped; equals the number of submitted targets
    pub fn accounted(&self) -> usize {
        self.results.len() + self.skipped.len()
    }

    /// Every target was published and none skipped
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }

    pub fn has_measurements(&self) -> bool {
        self.summary.measured > 0
    }
}

/// Probe `targets` over the live network with up to `max_workers` concurrent workers
pub async fn run_probes(
    targets: Vec<ProbeTarget>,
    max_workers: usize,
    params: ProbeParams,
    callbacks: RunCallbacks,
    signals: ControlSignals,
    logger: Arc<ProbeLogger>,
) -> RunReport {
    let prober = Arc::new(NetworkProber::new(params, logger.clone()));
    WorkerPool::new(prober, max_workers)
        .with_logger(logger)
        .run(targets, callbacks, signals)
        .await
}
