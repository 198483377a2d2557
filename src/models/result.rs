//! Per-target probe results

use crate::error::ProbeError;
use crate::models::ProbeTarget;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Throughput estimate from one echo session
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SpeedResult {
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
}

impl SpeedResult {
    pub fn new(download_mbps: Option<f64>, upload_mbps: Option<f64>) -> Self {
        Self {
            download_mbps,
            upload_mbps,
        }
    }

    /// Neither direction measured
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_measured(&self) -> bool {
        self.download_mbps.is_some() || self.upload_mbps.is_some()
    }
}

/// Outcome class of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// At least one figure was measured
    Measured,
    /// Probed, nothing measurable
    Failed,
    /// Never probed, or abandoned, because the run was stopped
    Skipped,
}

/// Everything learned about one target. Never mutated after publication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub target: ProbeTarget,
    pub latency_ms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<SpeedResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ProbeError>,
    pub status: ProbeStatus,
    pub completed_at: DateTime<Utc>,
}

impl ProbeResult {
    /// Build a result from whatever the probers produced
    pub fn new(
        target: ProbeTarget,
        latency_ms: Option<f64>,
        speed: Option<SpeedResult>,
        error: Option<ProbeError>,
    ) -> Self {
        let measured = latency_ms.is_some() || speed.map(|s| s.is_measured()).unwrap_or(false);
        Self {
            target,
            latency_ms,
            speed,
            error,
            status: if measured {
                ProbeStatus::Measured
            } else {
                ProbeStatus::Failed
            },
            completed_at: Utc::now(),
        }
    }

    pub fn latency(target: ProbeTarget, latency_ms: f64) -> Self {
        Self::new(target, Some(latency_ms), None, None)
    }

    pub fn failed(target: ProbeTarget, error: ProbeError) -> Self {
        Self::new(target, None, None, Some(error))
    }

    pub fn skipped(target: ProbeTarget) -> Self {
        Self {
            target,
            latency_ms: None,
            speed: None,
            error: Some(ProbeError::Cancelled),
            status: ProbeStatus::Skipped,
            completed_at: Utc::now(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.status == ProbeStatus::Skipped
    }

    /// True when the probe was interrupted by a stop request
    pub fn was_cancelled(&self) -> bool {
        matches!(self.error, Some(ProbeError::Cancelled))
    }

    pub fn download_mbps(&self) -> Option<f64> {
        self.speed.and_then(|s| s.download_mbps)
    }

    pub fn upload_mbps(&self) -> Option<f64> {
        self.speed.and_then(|s| s.upload_mbps)
    }
}
