//! ICMP latency via the platform ping utility
//!
//! The utility runs as a child process. Its summary line is the only
//! contract: Unix-style `rtt min/avg/max/mdev = a/b/c/d ms` (with a looser
//! `avg ... = a/b/...` fallback that also covers BSD and busybox) and
//! Windows-style `Average = Nms`.

use crate::defaults::PROCESS_TIMEOUT_GRACE;
use crate::error::ProbeError;
use crate::executor::ControlSignals;
use regex::Regex;
use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;

const UNIX_SUMMARY: &str = r"rtt min/avg/max/mdev = [\d.]+/([\d.]+)/[\d.]+/[\d.]+ ms";
const WINDOWS_AVERAGE: &str = r"Average = (\d+(?:\.\d+)?)\s*ms";

/// Command line and output dialect of the ping utility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingStyle {
    Unix,
    Windows,
}

impl PingStyle {
    pub fn native() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Unix
        }
    }

    /// Arguments for `count` echoes with a per-reply `timeout`
    pub fn args(&self, count: u32, timeout: Duration, address: &str) -> Vec<String> {
        match self {
            Self::Unix => vec![
                "-c".to_string(),
                count.to_string(),
                "-W".to_string(),
                timeout.as_secs().max(1).to_string(),
                address.to_string(),
            ],
            Self::Windows => vec![
                "-n".to_string(),
                count.to_string(),
                "-w".to_string(),
                timeout.as_millis().max(1).to_string(),
                address.to_string(),
            ],
        }
    }
}

fn cached_pattern(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

/// Mean round-trip time from Unix-style ping output
pub fn parse_unix_ping(output: &str) -> Option<f64> {
    static SUMMARY: OnceLock<Option<Regex>> = OnceLock::new();

    if let Some(captures) = cached_pattern(&SUMMARY, UNIX_SUMMARY).and_then(|re| re.captures(output)) {
        if let Ok(avg) = captures[1].parse::<f64>() {
            return Some(avg);
        }
    }

    output
        .lines()
        .filter(|line| line.contains("avg") && line.contains('='))
        .find_map(|line| {
            let (_, values) = line.split_once('=')?;
            values.split('/').nth(1)?.trim().parse::<f64>().ok()
        })
}

/// Mean round-trip time from Windows-style ping output
pub fn parse_windows_ping(output: &str) -> Option<f64> {
    static AVERAGE: OnceLock<Option<Regex>> = OnceLock::new();

    let captures = cached_pattern(&AVERAGE, WINDOWS_AVERAGE)?.captures(output)?;
    captures[1].parse::<f64>().ok()
}

pub fn parse_ping_output(style: PingStyle, output: &str) -> Option<f64> {
    match style {
        PingStyle::Unix => parse_unix_ping(output),
        PingStyle::Windows => parse_windows_ping(output),
    }
}

/// Turn a finished ping process into a latency or a failure reason
pub fn interpret_ping_output(
    style: PingStyle,
    exit_code: Option<i32>,
    stdout: &str,
    stderr: &str,
) -> Result<f64, ProbeError> {
    if exit_code != Some(0) {
        return Err(classify_failure(exit_code, stdout, stderr));
    }
    parse_ping_output(style, stdout).ok_or(ProbeError::Unparsable)
}

fn classify_failure(exit_code: Option<i32>, stdout: &str, stderr: &str) -> ProbeError {
    let text = format!("{}\n{}", stdout, stderr).to_lowercase();

    const RESOLUTION: &[&str] = &[
        "unknown host",
        "could not find host",
        "name or service not known",
        "temporary failure in name resolution",
        "cannot resolve",
        "nodename nor servname",
    ];
    const LOSS: &[&str] = &[
        "100% packet loss",
        "100.0% packet loss",
        "100% loss",
        "request timed out",
        "destination host unreachable",
    ];

    if RESOLUTION.iter().any(|needle| text.contains(needle)) {
        ProbeError::UnknownHost
    } else if LOSS.iter().any(|needle| text.contains(needle)) {
        ProbeError::PacketLoss
    } else {
        ProbeError::ExitStatus(exit_code)
    }
}

/// Runs the ping utility against one address at a time
#[derive(Debug, Clone)]
pub struct LatencyProber {
    command: String,
    count: u32,
    timeout: Duration,
    style: PingStyle,
}

impl LatencyProber {
    pub fn new(count: u32, timeout: Duration) -> Self {
        Self {
            command: crate::defaults::DEFAULT_PING_COMMAND.to_string(),
            count: count.max(1),
            timeout,
            style: PingStyle::native(),
        }
    }

    pub fn with_command<S: Into<String>>(mut self, command: S) -> Self {
        self.command = command.into();
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Wall-clock budget for the child process
    pub fn process_timeout(&self) -> Duration {
        self.timeout + PROCESS_TIMEOUT_GRACE
    }

    /// Mean RTT in milliseconds, or why there is none.
    ///
    /// A stop request kills the child and yields [`ProbeError::Cancelled`].
    pub async fn measure(&self, address: &str, signals: &ControlSignals) -> Result<f64, ProbeError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ProbeError::MissingAddress);
        }
        if signals.is_stopped() {
            return Err(ProbeError::Cancelled);
        }

        let child = Command::new(&self.command)
            .args(self.style.args(self.count, self.timeout, address))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let limit = self.process_timeout();
        let output = tokio::select! {
            biased;
            _ = signals.stopped() => return Err(ProbeError::Cancelled),
            waited = tokio::time::timeout(limit, child.wait_with_output()) => match waited {
                Err(_) => return Err(ProbeError::ProcessTimeout(limit.as_secs())),
                Ok(Err(e)) => return Err(ProbeError::Io(e.to_string())),
                Ok(Ok(output)) => output,
            },
        };

        interpret_ping_output(
            self.style,
            output.status.code(),
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
        )
    }

    /// Mean RTT in milliseconds; every failure degrades to `None`
    pub async fn probe(&self, address: &str) -> Option<f64> {
        self.measure(address, &ControlSignals::detached()).await.ok()
    }

    /// Confirm the ping utility can be started at all
    pub async fn check_available(&self) -> Result<(), ProbeError> {
        let mut child = Command::new(&self.command)
            .args(self.style.args(1, Duration::from_secs(1), "127.0.0.1"))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        // Exit status is irrelevant here, only that the binary exists.
        let _ = tokio::time::timeout(self.process_timeout(), child.wait()).await;
        Ok(())
    }

    fn spawn_error(&self, error: std::io::Error) -> ProbeError {
        match error.kind() {
            std::io::ErrorKind::NotFound => ProbeError::CommandNotFound(self.command.clone()),
            _ => ProbeError::Io(format!("failed to start '{}': {}", self.command, error)),
        }
    }
}
