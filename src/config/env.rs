//! Environment variable handling and .env file management

use crate::error::{AppError, Result};
use crate::models::config::{
    parse_port_list, split_list, MAX_CHUNK_SIZE, MAX_PING_COUNT, MAX_SPEED_DURATION_SECONDS, MAX_TIMEOUT_SECONDS,
    MAX_WORKERS_LIMIT,
};
use crate::types::{RelayProtocol, TestType};
use std::path::Path;

/// Environment variable configuration manager
pub struct EnvManager;

impl EnvManager {
    /// Load .env file if it exists. Variables already set in the process win.
    pub fn load_env_file(debug: bool) -> Result<()> {
        Self::load_env_file_from(Path::new(".env"), debug)
    }

    pub fn load_env_file_from(path: &Path, debug: bool) -> Result<()> {
        if path.exists() {
            dotenv::from_path(path)
                .map_err(|e| AppError::config(format!("Failed to load {}: {}", path.display(), e)))?;

            if debug {
                eprintln!("Loaded configuration from {}", path.display());
            }
        } else if debug {
            eprintln!("No {} file found, using defaults and CLI arguments", path.display());
        }

        Ok(())
    }

    /// Create example .env file content
    pub fn create_example_env_content() -> String {
        r#"# Relay Probe Configuration
#
# Values here are defaults for rprobe; environment variables set in the
# shell and command-line arguments both take precedence.

# Explicit targets (comma-separated, name=address or bare address)
# RPROBE_TARGETS=gw=192.168.1.1,dns=1.1.1.1

# Relay inventory JSON and its filters
# RPROBE_RELAYS_FILE=/var/cache/vpn/relays.json
# RPROBE_COUNTRY=se
# RPROBE_PROTOCOL=wireguard

# ping, speed or both
# RPROBE_TEST_TYPE=ping

# Concurrent workers (1-256)
# RPROBE_MAX_WORKERS=15

# Echo requests per target and the per-target timeout in seconds
# (each reply waits half of it)
# RPROBE_PING_COUNT=3
# RPROBE_TIMEOUT_SECONDS=10
# RPROBE_PING_COMMAND=ping

# Echo session length in seconds, block size in bytes, candidate ports
# RPROBE_SPEED_DURATION=5
# RPROBE_SPEED_CHUNK_SIZE=8192
# RPROBE_SPEED_PORTS=443,80,8080,51820

# Enable colored output (true/false)
# ENABLE_COLOR=true
"#
        .to_string()
    }

    /// Validate environment variable format before parsing
    pub fn validate_env_var(key: &str, value: &str) -> Result<()> {
        match key {
            "RPROBE_TARGETS" => {
                for spec in split_list(value) {
                    crate::inventory::parse_target_spec(&spec)
                        .map_err(|e| AppError::config(format!("Invalid RPROBE_TARGETS entry '{}': {}", spec, e)))?;
                }
            }
            "RPROBE_PROTOCOL" => {
                value.parse::<RelayProtocol>()?;
            }
            "RPROBE_TEST_TYPE" => {
                value.parse::<TestType>()?;
            }
            "RPROBE_MAX_WORKERS" => {
                check_range(key, value, 1, MAX_WORKERS_LIMIT as u64)?;
            }
            "RPROBE_PING_COUNT" => {
                check_range(key, value, 1, MAX_PING_COUNT as u64)?;
            }
            "RPROBE_TIMEOUT_SECONDS" => {
                check_range(key, value, 1, MAX_TIMEOUT_SECONDS)?;
            }
            "RPROBE_SPEED_DURATION" => {
                check_range(key, value, 1, MAX_SPEED_DURATION_SECONDS)?;
            }
            "RPROBE_SPEED_CHUNK_SIZE" => {
                check_range(key, value, 1, MAX_CHUNK_SIZE as u64)?;
            }
            "RPROBE_SPEED_PORTS" => {
                let ports = parse_port_list(value)?;
                if ports.is_empty() || ports.contains(&0) {
                    return Err(AppError::config(format!("RPROBE_SPEED_PORTS must list non-zero ports, got: '{}'", value)));
                }
            }
            "ENABLE_COLOR" => {
                value
                    .parse::<bool>()
                    .map_err(|e| AppError::config(format!("Invalid ENABLE_COLOR value '{}': {}", value, e)))?;
            }
            _ => {
                // Free-form values (paths, country codes, commands) and unknown keys
            }
        }

        Ok(())
    }

    /// Get list of all supported environment variables with descriptions
    pub fn get_supported_env_vars() -> Vec<(&'static str, &'static str, &'static str)> {
        vec![
            ("RPROBE_TARGETS", "Comma-separated name=address targets", "gw=192.168.1.1,1.1.1.1"),
            ("RPROBE_RELAYS_FILE", "Relay inventory JSON file", "relays.json"),
            ("RPROBE_COUNTRY", "Country code filter for inventory relays", "se"),
            ("RPROBE_PROTOCOL", "Relay protocol filter (wireguard, openvpn, any)", "wireguard"),
            ("RPROBE_TEST_TYPE", "Measurements per target (ping, speed, both)", "both"),
            ("RPROBE_MAX_WORKERS", "Concurrent workers (1-256)", "15"),
            ("RPROBE_PING_COUNT", "Echo requests per target (1-100)", "3"),
            ("RPROBE_TIMEOUT_SECONDS", "Per-target ping timeout in seconds; replies wait half (1-300)", "10"),
            ("RPROBE_PING_COMMAND", "Ping executable name or path", "ping"),
            ("RPROBE_SPEED_DURATION", "Echo session length in seconds (1-120)", "5"),
            ("RPROBE_SPEED_CHUNK_SIZE", "Echo payload block in bytes", "8192"),
            ("RPROBE_SPEED_PORTS", "Candidate echo ports in priority order", "443,80,8080,51820"),
            ("ENABLE_COLOR", "Enable colored output", "true"),
        ]
    }

    /// Check a .env file line by line. `None` when the file does not exist.
    pub fn check_env_file(path: &Path) -> Result<Option<Vec<String>>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::config(format!("Failed to read {}: {}", path.display(), e)))?;

        let mut warnings = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                if let Err(e) = Self::validate_env_var(key.trim(), value.trim()) {
                    warnings.push(format!("Line '{}': {}", line, e));
                }
            }
        }

        Ok(Some(warnings))
    }
}

fn check_range(key: &str, value: &str, min: u64, max: u64) -> Result<()> {
    let parsed: u64 = value
        .trim()
        .parse()
        .map_err(|e| AppError::config(format!("Invalid {} value '{}': {}", key, value, e)))?;
    if parsed < min || parsed > max {
        return Err(AppError::config(format!("{} must be between {} and {}, got: {}", key, min, max, parsed)));
    }
    Ok(())
}
