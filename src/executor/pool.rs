//! Bounded worker pool
//!
//! Per worker: `idle -> dequeuing -> probing -> publishing -> idle`, parking
//! while paused at the idle and dequeue boundaries. Stop is terminal and is
//! observed at the next check. A worker exits when the queue reports closed
//! and empty, or on stop.
//!
//! Every submitted target ends up either published (and counted towards
//! progress) or skipped.

use super::control::ControlSignals;
use super::queue::{Dequeue, TargetQueue};
use super::{RunCallbacks, RunReport};
use crate::aggregator::{self, RunSummary};
use crate::error::ProbeError;
use crate::logging::ProbeLogger;
use crate::models::{ProbeResult, ProbeTarget};
use crate::probe::TargetProber;
use crate::types::SortKey;
use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use uuid::Uuid;

pub struct WorkerPool<P: TargetProber + ?Sized + 'static> {
    prober: Arc<P>,
    max_workers: usize,
    sort_key: SortKey,
    logger: Arc<ProbeLogger>,
}

impl<P: TargetProber + ?Sized + 'static> WorkerPool<P> {
    pub fn new(prober: Arc<P>, max_workers: usize) -> Self {
        Self {
            prober,
            max_workers: max_workers.max(1),
            sort_key: SortKey::default(),
            logger: Arc::new(ProbeLogger::silent()),
        }
    }

    pub fn with_sort_key(mut self, sort_key: SortKey) -> Self {
        self.sort_key = sort_key;
        self
    }

    pub fn with_logger(mut self, logger: Arc<ProbeLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Workers used for `target_count` targets
    pub fn worker_count(&self, target_count: usize) -> usize {
        self.max_workers.min(target_count)
    }

    /// Probe every target and return the ranked outcome.
    ///
    /// Never fails: per-target problems are carried in the results and
    /// run-level ones in [`RunReport::notices`].
    pub async fn run(&self, targets: Vec<ProbeTarget>, callbacks: RunCallbacks, signals: ControlSignals) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let total = targets.len();

        if total == 0 {
            let notice = "no targets to probe".to_string();
            self.logger.logger().warn(&notice).correlation_id(&run_id).log().await;
            return RunReport {
                run_id,
                results: Vec::new(),
                skipped: Vec::new(),
                stopped: signals.is_stopped(),
                elapsed: started.elapsed(),
                summary: RunSummary::default(),
                notices: vec![notice],
            };
        }

        let workers = self.worker_count(total);
        self.logger
            .logger()
            .debug(&format!("Starting run with {} workers for {} targets", workers, total))
            .correlation_id(&run_id)
            .field("workers", workers)
            .field("targets", total)
            .log()
            .await;

        let queue = Arc::new(TargetQueue::from_targets(targets));
        let shared = Arc::new(RunShared::new(total, callbacks, self.logger.clone(), run_id.clone()));

        let handles: Vec<_> = (0..workers)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    self.prober.clone(),
                    queue.clone(),
                    shared.clone(),
                    signals.clone(),
                ))
            })
            .collect();

        let all_workers = join_all(handles);
        tokio::pin!(all_workers);
        let joined = tokio::select! {
            biased;
            joined = &mut all_workers => joined,
            _ = signals.stopped() => {
                // Un-started entries are skipped so idle workers see an empty queue.
                for target in queue.drain().await {
                    shared.skip(target).await;
                }
                all_workers.await
            }
        };

        for outcome in joined {
            if let Err(e) = outcome {
                shared.add_notice(format!("worker task failed: {}", e)).await;
            }
        }
        // A stop can land after the drain above, or after every worker exited.
        for target in queue.drain().await {
            shared.skip(target).await;
        }

        let stopped = signals.is_stopped();
        let mut results = std::mem::take(&mut *lock(&shared.results));
        let skipped = std::mem::take(&mut *lock(&shared.skipped));
        let notices = std::mem::take(&mut *lock(&shared.notices));

        aggregator::rank(&mut results, self.sort_key);
        let summary = RunSummary::from_results(&results, skipped.len(), self.sort_key);
        self.logger.log_run_summary(&run_id, &summary, stopped).await;

        RunReport {
            run_id,
            results,
            skipped,
            stopped,
            elapsed: started.elapsed(),
            summary,
            notices,
        }
    }
}

/// State shared by the workers and the coordinator of one run
struct RunShared {
    total: usize,
    results: Mutex<Vec<ProbeResult>>,
    skipped: Mutex<Vec<ProbeTarget>>,
    completed: Mutex<usize>,
    notices: Mutex<Vec<String>>,
    callbacks: RunCallbacks,
    logger: Arc<ProbeLogger>,
    run_id: String,
}

impl RunShared {
    fn new(total: usize, callbacks: RunCallbacks, logger: Arc<ProbeLogger>, run_id: String) -> Self {
        Self {
            total,
            results: Mutex::new(Vec::with_capacity(total)),
            skipped: Mutex::new(Vec::new()),
            completed: Mutex::new(0),
            notices: Mutex::new(Vec::new()),
            callbacks,
            logger,
            run_id,
        }
    }

    /// Record a finished probe, then advance progress
    async fn publish(&self, result: ProbeResult) {
        if let Some(error) = result.error.as_ref().filter(|e| e.is_global()) {
            self.add_notice(error.to_string()).await;
        }

        let mut failures = Vec::new();
        if let Some(callback) = &self.callbacks.result {
            if let Some(detail) = invoke_callback(|| callback(&result)) {
                failures.push(("result", detail));
            }
        }
        lock(&self.results).push(result);

        {
            // Held across the callback so reported percentages never go backwards.
            let mut completed = lock(&self.completed);
            *completed += 1;
            let percent = *completed as f64 / self.total as f64 * 100.0;
            if let Some(callback) = &self.callbacks.progress {
                if let Some(detail) = invoke_callback(|| callback(percent)) {
                    failures.push(("progress", detail));
                }
            }
        }

        for (callback, detail) in failures {
            self.logger.log_callback_failure(callback, &detail).await;
        }
    }

    /// Record a target abandoned because of a stop. Progress does not move.
    async fn skip(&self, target: ProbeTarget) {
        let result = ProbeResult::skipped(target.clone());
        lock(&self.skipped).push(target);

        if let Some(callback) = &self.callbacks.result {
            if let Some(detail) = invoke_callback(|| callback(&result)) {
                self.logger.log_callback_failure("result", &detail).await;
            }
        }
    }

    /// Keep a run-level message, once
    async fn add_notice(&self, notice: String) {
        let is_new = {
            let mut notices = lock(&self.notices);
            if notices.contains(&notice) {
                false
            } else {
                notices.push(notice.clone());
                true
            }
        };

        if is_new {
            self.logger.logger().warn(&notice).correlation_id(&self.run_id).log().await;
        }
    }
}

async fn worker_loop<P: TargetProber + ?Sized>(
    worker_id: usize,
    prober: Arc<P>,
    queue: Arc<TargetQueue>,
    shared: Arc<RunShared>,
    signals: ControlSignals,
) {
    let mut probed = 0usize;
    loop {
        if signals.is_stopped() {
            break;
        }
        if signals.is_paused() {
            signals.wait_while_paused().await;
            continue;
        }

        let target = match queue.dequeue(&signals).await {
            Dequeue::Target(target) => target,
            Dequeue::Paused => continue,
            Dequeue::Stopped | Dequeue::Closed => break,
        };

        // The stop may have fired while this worker waited on the queue.
        if signals.is_stopped() {
            shared.skip(target).await;
            break;
        }

        let result = match AssertUnwindSafe(prober.probe(&target, &signals)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => ProbeResult::failed(
                target.clone(),
                ProbeError::Io(format!("probe panicked: {}", panic_message(payload.as_ref()))),
            ),
        };
        probed += 1;

        if result.is_skipped() || result.was_cancelled() {
            shared.skip(target).await;
        } else {
            shared.publish(result).await;
        }
    }

    shared
        .logger
        .logger()
        .trace(&format!("Worker {} exiting", worker_id))
        .correlation_id(&shared.run_id)
        .field("probed", probed)
        .log()
        .await;
}

/// Run a caller callback, turning an error or a panic into a message
fn invoke_callback<F>(callback: F) -> Option<String>
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(callback)) {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(format!("{:#}", e)),
        Err(payload) => Some(format!("panicked: {}", panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}
