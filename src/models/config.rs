//! Configuration data model and validation

use crate::types::{AppError, RelayProtocol, Result, SortKey, TestType};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Upper bounds enforced by [`Config::validate`]
pub const MAX_WORKERS_LIMIT: usize = 256;
pub const MAX_PING_COUNT: u32 = 100;
pub const MAX_TIMEOUT_SECONDS: u64 = 300;
pub const MAX_SPEED_DURATION_SECONDS: u64 = 120;
pub const MAX_CHUNK_SIZE: usize = 1024 * 1024;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Explicit targets, `name=address` or a bare address
    #[serde(default)]
    pub targets: Vec<String>,

    /// Relay inventory JSON file
    #[serde(default)]
    pub relays_file: Option<PathBuf>,

    /// Country code filter for inventory relays
    #[serde(default)]
    pub country: Option<String>,

    /// Protocol filter for inventory relays
    #[serde(default)]
    pub protocol: RelayProtocol,

    /// Measurements to run per target
    #[serde(default)]
    pub test_type: TestType,

    /// Upper bound on concurrent workers
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Echo requests per ping invocation
    #[serde(default = "default_ping_count")]
    pub ping_count: u32,

    /// Ping reply timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_seconds: u64,

    /// Ping executable name or path
    #[serde(default = "default_ping_command")]
    pub ping_command: String,

    /// Wall-clock length of one echo session
    #[serde(default = "default_speed_duration_secs")]
    pub speed_duration_seconds: u64,

    /// Payload block size for one round
    #[serde(default = "default_chunk_size")]
    pub speed_chunk_size: usize,

    #[serde(default = "default_connect_timeout_secs")]
    pub speed_connect_timeout_seconds: u64,

    #[serde(default = "default_round_timeout_ms")]
    pub speed_round_timeout_ms: u64,

    /// Candidate echo ports in priority order
    #[serde(default = "default_speed_ports")]
    pub speed_ports: Vec<u16>,

    #[serde(default)]
    pub sort_by: SortKey,

    /// Show only the best N results
    #[serde(default)]
    pub limit: Option<usize>,

    #[serde(default)]
    pub json_output: bool,

    /// Read pause/resume/stop commands from stdin
    #[serde(default)]
    pub interactive: bool,

    #[serde(default = "default_enable_color")]
    pub enable_color: bool,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            relays_file: None,
            country: None,
            protocol: RelayProtocol::default(),
            test_type: TestType::default(),
            max_workers: default_max_workers(),
            ping_count: default_ping_count(),
            timeout_seconds: default_timeout_secs(),
            ping_command: default_ping_command(),
            speed_duration_seconds: default_speed_duration_secs(),
            speed_chunk_size: default_chunk_size(),
            speed_connect_timeout_seconds: default_connect_timeout_secs(),
            speed_round_timeout_ms: default_round_timeout_ms(),
            speed_ports: default_speed_ports(),
            sort_by: SortKey::default(),
            limit: None,
            json_output: false,
            interactive: false,
            enable_color: default_enable_color(),
            verbose: false,
            debug: false,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Get ping timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Per-reply wait handed to the ping utility: half the target timeout, at least 1s
    pub fn ping_reply_timeout(&self) -> Duration {
        Duration::from_secs((self.timeout_seconds / 2).max(1))
    }

    pub fn speed_duration(&self) -> Duration {
        Duration::from_secs(self.speed_duration_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.speed_connect_timeout_seconds)
    }

    pub fn round_timeout(&self) -> Duration {
        Duration::from_millis(self.speed_round_timeout_ms)
    }

    /// True when at least one target source is configured
    pub fn has_target_source(&self) -> bool {
        !self.targets.is_empty() || self.relays_file.is_some()
    }

    /// Validate hard limits; soft concerns live in `ConfigValidator`
    pub fn validate(&self) -> Result<()> {
        for spec in &self.targets {
            if spec.trim().is_empty() {
                return Err(AppError::config("Target entry cannot be empty"));
            }
        }

        if self.max_workers == 0 {
            return Err(AppError::config("Worker count must be greater than 0"));
        }
        if self.max_workers > MAX_WORKERS_LIMIT {
            return Err(AppError::config(format!("Worker count cannot exceed {}", MAX_WORKERS_LIMIT)));
        }

        if self.ping_count == 0 {
            return Err(AppError::config("Ping count must be greater than 0"));
        }
        if self.ping_count > MAX_PING_COUNT {
            return Err(AppError::config(format!("Ping count cannot exceed {}", MAX_PING_COUNT)));
        }

        if self.timeout_seconds == 0 {
            return Err(AppError::config("Timeout must be greater than 0"));
        }
        if self.timeout_seconds > MAX_TIMEOUT_SECONDS {
            return Err(AppError::config(format!("Timeout cannot exceed {} seconds", MAX_TIMEOUT_SECONDS)));
        }

        if self.ping_command.trim().is_empty() {
            return Err(AppError::config("Ping command cannot be empty"));
        }

        if self.test_type.includes_speed() {
            if self.speed_duration_seconds == 0 || self.speed_duration_seconds > MAX_SPEED_DURATION_SECONDS {
                return Err(AppError::config(format!(
                    "Speed test duration must be between 1 and {} seconds",
                    MAX_SPEED_DURATION_SECONDS
                )));
            }
            if self.speed_chunk_size == 0 || self.speed_chunk_size > MAX_CHUNK_SIZE {
                return Err(AppError::config(format!(
                    "Speed chunk size must be between 1 and {} bytes",
                    MAX_CHUNK_SIZE
                )));
            }
            if self.speed_connect_timeout_seconds == 0 {
                return Err(AppError::config("Connect timeout must be greater than 0"));
            }
            if self.speed_round_timeout_ms == 0 {
                return Err(AppError::config("Round timeout must be greater than 0"));
            }
            if self.speed_ports.is_empty() {
                return Err(AppError::config("Speed testing needs at least one candidate port"));
            }
            if self.speed_ports.contains(&0) {
                return Err(AppError::config("Port 0 is not a valid candidate port"));
            }
        }

        if self.limit == Some(0) {
            return Err(AppError::config("Result limit must be greater than 0"));
        }

        Ok(())
    }

    /// Merge environment variables into this configuration
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(targets) = std::env::var("RPROBE_TARGETS") {
            self.targets = split_list(&targets);
        }

        if let Ok(path) = std::env::var("RPROBE_RELAYS_FILE") {
            if !path.trim().is_empty() {
                self.relays_file = Some(PathBuf::from(path.trim()));
            }
        }

        if let Ok(country) = std::env::var("RPROBE_COUNTRY") {
            if !country.trim().is_empty() {
                self.country = Some(country.trim().to_string());
            }
        }

        if let Ok(command) = std::env::var("RPROBE_PING_COMMAND") {
            if !command.trim().is_empty() {
                self.ping_command = command.trim().to_string();
            }
        }

        if let Some(protocol) = parse_env("RPROBE_PROTOCOL")? {
            self.protocol = protocol;
        }
        if let Some(test_type) = parse_env("RPROBE_TEST_TYPE")? {
            self.test_type = test_type;
        }
        if let Some(workers) = parse_env("RPROBE_MAX_WORKERS")? {
            self.max_workers = workers;
        }
        if let Some(count) = parse_env("RPROBE_PING_COUNT")? {
            self.ping_count = count;
        }
        if let Some(timeout) = parse_env("RPROBE_TIMEOUT_SECONDS")? {
            self.timeout_seconds = timeout;
        }
        if let Some(duration) = parse_env("RPROBE_SPEED_DURATION")? {
            self.speed_duration_seconds = duration;
        }
        if let Some(chunk) = parse_env("RPROBE_SPEED_CHUNK_SIZE")? {
            self.speed_chunk_size = chunk;
        }
        if let Ok(ports) = std::env::var("RPROBE_SPEED_PORTS") {
            self.speed_ports = parse_port_list(&ports)?;
        }
        if let Some(enable_color) = parse_env("ENABLE_COLOR")? {
            self.enable_color = enable_color;
        }

        Ok(())
    }
}

/// Split a comma-separated list, dropping blanks
pub fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parse a comma-separated port list such as `443,80,51820`
pub fn parse_port_list(value: &str) -> Result<Vec<u16>> {
    split_list(value)
        .iter()
        .map(|p| {
            p.parse::<u16>()
                .map_err(|e| AppError::config(format!("Invalid port '{}': {}", p, e)))
        })
        .collect()
}

fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e))),
        Err(_) => Ok(None),
    }
}

// Default value functions for serde
fn default_max_workers() -> usize {
    crate::defaults::DEFAULT_MAX_WORKERS
}

fn default_ping_count() -> u32 {
    crate::defaults::DEFAULT_PING_COUNT
}

fn default_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_TIMEOUT.as_secs()
}

fn default_ping_command() -> String {
    crate::defaults::DEFAULT_PING_COMMAND.to_string()
}

fn default_speed_duration_secs() -> u64 {
    crate::defaults::DEFAULT_SPEED_DURATION.as_secs()
}

fn default_chunk_size() -> usize {
    crate::defaults::DEFAULT_CHUNK_SIZE
}

fn default_connect_timeout_secs() -> u64 {
    crate::defaults::DEFAULT_CONNECT_TIMEOUT.as_secs()
}

fn default_round_timeout_ms() -> u64 {
    crate::defaults::DEFAULT_ROUND_TIMEOUT.as_millis() as u64
}

fn default_speed_ports() -> Vec<u16> {
    crate::defaults::DEFAULT_SPEED_PORTS.to_vec()
}

fn default_enable_color() -> bool {
    crate::defaults::DEFAULT_ENABLE_COLOR
}
