//! Throughput estimate over a symmetric TCP echo exchange
//!
//! One session connects to a candidate port and repeats rounds until its
//! duration runs out: write one random payload block, then read the same
//! number of bytes back before the round deadline. Rounds are strictly
//! stop-and-wait, so the figure is capped by round-trip latency. It is a
//! cheap relative signal, not a calibrated benchmark.
//!
//! Round rules:
//! - a zero-length write or a write error ends the session (fatal)
//! - the peer closing during the read ends the session (fatal)
//! - the read deadline expiring is not fatal; partial bytes still count

use crate::defaults;
use crate::error::ProbeError;
use crate::executor::ControlSignals;
use crate::logging::ProbeLogger;
use crate::models::{Config, SpeedResult};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep_until, timeout, Instant};

/// Session parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeedSettings {
    /// Wall-clock length of the exchange loop, excluding paused time
    pub duration: Duration,
    pub chunk_size: usize,
    pub connect_timeout: Duration,
    /// Budget for one write-then-read round
    pub round_timeout: Duration,
    /// Candidate ports in priority order
    pub ports: Vec<u16>,
}

impl Default for SpeedSettings {
    fn default() -> Self {
        Self {
            duration: defaults::DEFAULT_SPEED_DURATION,
            chunk_size: defaults::DEFAULT_CHUNK_SIZE,
            connect_timeout: defaults::DEFAULT_CONNECT_TIMEOUT,
            round_timeout: defaults::DEFAULT_ROUND_TIMEOUT,
            ports: defaults::DEFAULT_SPEED_PORTS.to_vec(),
        }
    }
}

impl SpeedSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            duration: config.speed_duration(),
            chunk_size: config.speed_chunk_size,
            connect_timeout: config.connect_timeout(),
            round_timeout: config.round_timeout(),
            ports: config.speed_ports.clone(),
        }
    }
}

/// Megabits per second. `0.0` for empty transfers or windows of 10 ms or less.
pub fn calculate_mbps(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if bytes == 0 || secs <= defaults::MIN_THROUGHPUT_WINDOW.as_secs_f64() {
        return 0.0;
    }
    (bytes as f64 * 8.0) / (secs * 1_000_000.0)
}

/// Opaque block for one session; only its length matters
pub fn random_payload(size: usize) -> Vec<u8> {
    let mut block = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut block);
    block
}

/// Why a session's exchange loop ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum SessionEnd {
    /// Duration elapsed
    Completed,
    /// Stop requested
    Cancelled,
    Fatal(String),
}

impl SessionEnd {
    pub fn label(&self) -> &str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Fatal(reason) => reason,
        }
    }
}

/// What one connected session measured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub port: u16,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub rounds: u32,
    /// Rounds that got at least one byte back
    pub successful_exchanges: u32,
    pub avg_rtt_ms: Option<f64>,
    /// Exchange loop time, paused time excluded
    pub elapsed: Duration,
    pub end: SessionEnd,
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
}

impl SessionReport {
    pub fn speed(&self) -> SpeedResult {
        SpeedResult::new(self.download_mbps, self.upload_mbps)
    }
}

#[derive(Debug, Default)]
struct SessionStats {
    bytes_sent: u64,
    bytes_received: u64,
    rounds: u32,
    successful_exchanges: u32,
    rtt_total: Duration,
    rtt_samples: u32,
}

impl SessionStats {
    fn record_round(&mut self, received: usize, rtt: Duration) {
        self.bytes_received += received as u64;
        self.rtt_total += rtt;
        self.rtt_samples += 1;
        if received > 0 {
            self.successful_exchanges += 1;
        }
    }

    fn finish(self, port: u16, end: SessionEnd, elapsed: Duration) -> SessionReport {
        let avg_rtt_ms = if self.rtt_samples > 0 {
            Some(self.rtt_total.as_secs_f64() * 1000.0 / self.rtt_samples as f64)
        } else {
            None
        };

        SessionReport {
            port,
            bytes_sent: self.bytes_sent,
            bytes_received: self.bytes_received,
            rounds: self.rounds,
            successful_exchanges: self.successful_exchanges,
            avg_rtt_ms,
            elapsed,
            end,
            download_mbps: Some(calculate_mbps(self.bytes_received, elapsed)),
            upload_mbps: Some(calculate_mbps(self.bytes_sent, elapsed)),
        }
    }
}

enum SendOutcome {
    Sent(usize),
    Cancelled(usize),
    Fatal(usize, String),
}

enum ReceiveOutcome {
    Complete(usize),
    DeadlineElapsed(usize),
    Cancelled(usize),
    Fatal(usize, String),
}

/// Runs echo sessions against one address, falling back across ports
pub struct SpeedProber {
    settings: SpeedSettings,
    logger: Arc<ProbeLogger>,
}

impl SpeedProber {
    pub fn new(settings: SpeedSettings, logger: Arc<ProbeLogger>) -> Self {
        Self { settings, logger }
    }

    pub fn settings(&self) -> &SpeedSettings {
        &self.settings
    }

    /// Try ports in order and return the first connected session's report.
    ///
    /// Once a port connects its session is the answer, even if it measured
    /// nothing. Later ports are only tried when a connect fails.
    pub async fn probe(&self, address: &str, signals: &ControlSignals) -> Result<SessionReport, ProbeError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ProbeError::MissingAddress);
        }

        let mut failures = Vec::new();
        for &port in &self.settings.ports {
            if signals.is_stopped() {
                return Err(ProbeError::Cancelled);
            }

            match self.run_session(address, port, signals).await {
                Ok(report) => {
                    self.logger.log_session(address, &report).await;
                    return Ok(report);
                }
                Err(ProbeError::Cancelled) => return Err(ProbeError::Cancelled),
                Err(error) => {
                    let detail = match error {
                        ProbeError::ConnectFailed(detail) => detail,
                        other => other.to_string(),
                    };
                    self.logger.log_connection(address, port, Some(&detail)).await;
                    failures.push(format!("{}: {}", port, detail));
                }
            }
        }

        Err(ProbeError::ConnectFailed(if failures.is_empty() {
            "no ports configured".to_string()
        } else {
            failures.join("; ")
        }))
    }

    /// Download and upload figures, `(None, None)` when no port connects
    pub async fn measure(&self, address: &str, signals: &ControlSignals) -> SpeedResult {
        self.probe(address, signals)
            .await
            .map(|report| report.speed())
            .unwrap_or_default()
    }

    /// One session on one port. Errors only when the connection never opens.
    pub async fn run_session(
        &self,
        address: &str,
        port: u16,
        signals: &ControlSignals,
    ) -> Result<SessionReport, ProbeError> {
        let payload = random_payload(self.settings.chunk_size.max(1));

        let mut stream = tokio::select! {
            biased;
            _ = signals.stopped() => return Err(ProbeError::Cancelled),
            connected = self.connect(address, port) => connected?,
        };
        self.logger.log_connection(address, port, None).await;
        let _ = stream.set_nodelay(true);

        let mut stats = SessionStats::default();
        let started = Instant::now();
        let (end, paused) = self.exchange(&mut stream, &payload, signals, &mut stats).await;
        let elapsed = started.elapsed().saturating_sub(paused);

        // Best effort on every path; the socket closes when dropped.
        let _ = stream.shutdown().await;
        drop(stream);

        Ok(stats.finish(port, end, elapsed))
    }

    async fn connect(&self, address: &str, port: u16) -> Result<TcpStream, ProbeError> {
        match timeout(self.settings.connect_timeout, TcpStream::connect((address, port))).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(ProbeError::ConnectFailed(e.to_string())),
            Err(_) => Err(ProbeError::ConnectFailed(format!(
                "timed out after {}s",
                self.settings.connect_timeout.as_secs_f64()
            ))),
        }
    }

    /// The round loop. Returns how it ended and the time spent paused.
    async fn exchange(
        &self,
        stream: &mut TcpStream,
        payload: &[u8],
        signals: &ControlSignals,
        stats: &mut SessionStats,
    ) -> (SessionEnd, Duration) {
        let mut deadline = Instant::now() + self.settings.duration;
        let mut paused = Duration::ZERO;
        let mut buffer = vec![0u8; payload.len()];

        let end = loop {
            if signals.is_stopped() {
                break SessionEnd::Cancelled;
            }
            if signals.is_paused() {
                let parked = signals.wait_while_paused().await;
                deadline += parked;
                paused += parked;
                continue;
            }
            if Instant::now() >= deadline {
                break SessionEnd::Completed;
            }

            let round_started = Instant::now();
            let send_deadline = round_started + self.settings.round_timeout;

            match send_block(stream, payload, send_deadline, signals).await {
                SendOutcome::Sent(sent) => stats.bytes_sent += sent as u64,
                SendOutcome::Cancelled(sent) => {
                    stats.bytes_sent += sent as u64;
                    break SessionEnd::Cancelled;
                }
                SendOutcome::Fatal(sent, reason) => {
                    stats.bytes_sent += sent as u64;
                    break SessionEnd::Fatal(reason);
                }
            }
            stats.rounds += 1;

            // The echo gets a full round timeout of its own, however long the send took.
            let receive_deadline = Instant::now() + self.settings.round_timeout;
            match receive_block(stream, &mut buffer, receive_deadline, signals).await {
                ReceiveOutcome::Complete(received) | ReceiveOutcome::DeadlineElapsed(received) => {
                    stats.record_round(received, round_started.elapsed());
                }
                ReceiveOutcome::Cancelled(received) => {
                    stats.bytes_received += received as u64;
                    break SessionEnd::Cancelled;
                }
                ReceiveOutcome::Fatal(received, reason) => {
                    stats.bytes_received += received as u64;
                    break SessionEnd::Fatal(reason);
                }
            }
        };

        (end, paused)
    }
}

/// Write the whole block before `deadline`
async fn send_block(
    stream: &mut TcpStream,
    payload: &[u8],
    deadline: Instant,
    signals: &ControlSignals,
) -> SendOutcome {
    let mut sent = 0;
    while sent < payload.len() {
        tokio::select! {
            biased;
            _ = signals.stopped() => return SendOutcome::Cancelled(sent),
            _ = sleep_until(deadline) => {
                return SendOutcome::Fatal(sent, "send stalled past the round deadline".to_string());
            }
            written = stream.write(&payload[sent..]) => match written {
                Ok(0) => return SendOutcome::Fatal(sent, "connection broken during send".to_string()),
                Ok(n) => sent += n,
                Err(e) => return SendOutcome::Fatal(sent, format!("send failed: {}", e)),
            },
        }
    }
    SendOutcome::Sent(sent)
}

/// Read up to `buffer.len()` bytes before `deadline`, keeping partial reads
async fn receive_block(
    stream: &mut TcpStream,
    buffer: &mut [u8],
    deadline: Instant,
    signals: &ControlSignals,
) -> ReceiveOutcome {
    let mut received = 0;
    while received < buffer.len() {
        if signals.is_stopped() {
            return ReceiveOutcome::Cancelled(received);
        }
        if Instant::now() >= deadline {
            return ReceiveOutcome::DeadlineElapsed(received);
        }

        tokio::select! {
            biased;
            _ = signals.stopped() => return ReceiveOutcome::Cancelled(received),
            _ = sleep_until(deadline) => return ReceiveOutcome::DeadlineElapsed(received),
            read = stream.read(&mut buffer[received..]) => match read {
                Ok(0) => return ReceiveOutcome::Fatal(received, "connection closed by peer".to_string()),
                Ok(n) => received += n,
                Err(e) => return ReceiveOutcome::Fatal(received, format!("receive failed: {}", e)),
            },
        }
    }
    ReceiveOutcome::Complete(received)
}
