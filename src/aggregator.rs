//! Ranking and run summaries
//!
//! Unknown values always sort after known ones, whatever the key.

use crate::models::{ProbeResult, ProbeStatus};
use crate::types::SortKey;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Sort results in place. Stable, so ties keep their publication order.
pub fn rank(results: &mut [ProbeResult], key: SortKey) {
    match key {
        SortKey::Latency => results.sort_by(|a, b| ascending(a.latency_ms, b.latency_ms)),
        SortKey::Download => results.sort_by(|a, b| descending(a.download_mbps(), b.download_mbps())),
        SortKey::Upload => results.sort_by(|a, b| descending(a.upload_mbps(), b.upload_mbps())),
    }
}

/// Owned variant of [`rank`]
pub fn ranked(mut results: Vec<ProbeResult>, key: SortKey) -> Vec<ProbeResult> {
    rank(&mut results, key);
    results
}

/// Missing values compare as +infinity
fn ascending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Largest first, missing values last
fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn key_value(result: &ProbeResult, key: SortKey) -> Option<f64> {
    match key {
        SortKey::Latency => result.latency_ms,
        SortKey::Download => result.download_mbps(),
        SortKey::Upload => result.upload_mbps(),
    }
}

/// The recommended target of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestTarget {
    pub id: String,
    pub address: String,
    pub latency_ms: Option<f64>,
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub median_ms: f64,
}

impl LatencyStats {
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len();
        let median_ms = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };

        Some(Self {
            min_ms: sorted[0],
            max_ms: sorted[n - 1],
            mean_ms: sorted.iter().sum::<f64>() / n as f64,
            median_ms,
        })
    }
}

/// Counts and aggregates over one run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Targets submitted
    pub total: usize,
    pub measured: usize,
    pub failed: usize,
    pub skipped: usize,
    pub best: Option<BestTarget>,
    pub latency: Option<LatencyStats>,
    pub mean_download_mbps: Option<f64>,
    pub mean_upload_mbps: Option<f64>,
}

impl RunSummary {
    /// Summarize published results plus the count of skipped targets
    pub fn from_results(results: &[ProbeResult], skipped: usize, key: SortKey) -> Self {
        let measured = results.iter().filter(|r| r.status == ProbeStatus::Measured).count();
        let failed = results.iter().filter(|r| r.status == ProbeStatus::Failed).count();

        let latencies: Vec<f64> = results.iter().filter_map(|r| r.latency_ms).collect();
        let downloads: Vec<f64> = results.iter().filter_map(|r| r.download_mbps()).collect();
        let uploads: Vec<f64> = results.iter().filter_map(|r| r.upload_mbps()).collect();

        let best = results
            .iter()
            .filter(|r| key_value(r, key).is_some())
            .min_by(|a, b| match key {
                SortKey::Latency => ascending(a.latency_ms, b.latency_ms),
                _ => descending(key_value(a, key), key_value(b, key)),
            })
            .map(|r| BestTarget {
                id: r.target.id.clone(),
                address: r.target.address.clone(),
                latency_ms: r.latency_ms,
                download_mbps: r.download_mbps(),
                upload_mbps: r.upload_mbps(),
            });

        Self {
            total: results.len() + skipped,
            measured,
            failed,
            skipped,
            best,
            latency: LatencyStats::from_samples(&latencies),
            mean_download_mbps: mean(&downloads),
            mean_upload_mbps: mean(&uploads),
        }
    }

    /// Share of submitted targets that produced a measurement, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.measured as f64 / self.total as f64 * 100.0
        }
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
