//! Per-target probers
//!
//! [`TargetProber`] is the seam the worker pool drives. [`NetworkProber`]
//! is the real implementation: OS ping for latency, the echo session for
//! throughput, selected by [`TestType`].

pub mod latency;
pub mod speed;

pub use latency::{LatencyProber, PingStyle};
pub use speed::{calculate_mbps, SessionEnd, SessionReport, SpeedProber, SpeedSettings};

use crate::defaults;
use crate::error::ProbeError;
use crate::executor::ControlSignals;
use crate::logging::ProbeLogger;
use crate::models::{Config, ProbeResult, ProbeTarget, SpeedResult};
use crate::types::TestType;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Measures one target. Failures belong in the returned result, never in a panic.
///
/// Returning [`ProbeResult::skipped`] (or any result whose error is
/// [`ProbeError::Cancelled`]) tells the pool the probe was abandoned
/// because of a stop request.
#[async_trait]
pub trait TargetProber: Send + Sync {
    async fn probe(&self, target: &ProbeTarget, signals: &ControlSignals) -> ProbeResult;
}

/// Everything a [`NetworkProber`] needs besides a logger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeParams {
    pub test_type: TestType,
    pub ping_count: u32,
    pub ping_timeout: Duration,
    pub ping_command: String,
    pub speed: SpeedSettings,
}

impl Default for ProbeParams {
    fn default() -> Self {
        Self {
            test_type: TestType::default(),
            ping_count: defaults::DEFAULT_PING_COUNT,
            ping_timeout: defaults::DEFAULT_TIMEOUT / 2,
            ping_command: defaults::DEFAULT_PING_COMMAND.to_string(),
            speed: SpeedSettings::default(),
        }
    }
}

impl ProbeParams {
    pub fn from_config(config: &Config) -> Self {
        Self {
            test_type: config.test_type,
            ping_count: config.ping_count,
            ping_timeout: config.ping_reply_timeout(),
            ping_command: config.ping_command.clone(),
            speed: SpeedSettings::from_config(config),
        }
    }

    pub fn latency_prober(&self) -> LatencyProber {
        LatencyProber::new(self.ping_count, self.ping_timeout).with_command(self.ping_command.clone())
    }
}

/// Latency and/or throughput against the live network
pub struct NetworkProber {
    test_type: TestType,
    latency: LatencyProber,
    speed: SpeedProber,
    logger: Arc<ProbeLogger>,
}

impl NetworkProber {
    pub fn new(params: ProbeParams, logger: Arc<ProbeLogger>) -> Self {
        Self {
            test_type: params.test_type,
            latency: params.latency_prober(),
            speed: SpeedProber::new(params.speed, logger.clone()),
            logger,
        }
    }

    pub fn test_type(&self) -> TestType {
        self.test_type
    }

    pub fn latency(&self) -> &LatencyProber {
        &self.latency
    }

    pub fn speed(&self) -> &SpeedProber {
        &self.speed
    }
}

#[async_trait]
impl TargetProber for NetworkProber {
    async fn probe(&self, target: &ProbeTarget, signals: &ControlSignals) -> ProbeResult {
        let address = match target.probe_address() {
            Some(address) => address.to_string(),
            None => return ProbeResult::failed(target.clone(), ProbeError::MissingAddress),
        };

        let mut latency_ms = None;
        let mut error = None;

        if self.test_type.includes_latency() {
            let outcome = self.latency.measure(&address, signals).await;
            self.logger.log_latency(target, &outcome).await;
            match outcome {
                Ok(ms) => latency_ms = Some(ms),
                Err(ProbeError::Cancelled) => return ProbeResult::skipped(target.clone()),
                Err(e) => error = Some(e),
            }
        }

        let mut speed = None;
        if self.test_type.includes_speed() {
            if signals.is_stopped() {
                return ProbeResult::skipped(target.clone());
            }
            match self.speed.probe(&address, signals).await {
                Ok(report) if report.end == SessionEnd::Cancelled => {
                    return ProbeResult::skipped(target.clone());
                }
                Ok(report) => speed = Some(report.speed()),
                Err(ProbeError::Cancelled) => return ProbeResult::skipped(target.clone()),
                Err(e) => {
                    speed = Some(SpeedResult::none());
                    // A latency failure is the more telling reason; keep it.
                    error.get_or_insert(e);
                }
            }
        }

        ProbeResult::new(target.clone(), latency_ms, speed, error)
    }
}
