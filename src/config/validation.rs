//! Configuration validation utilities and rules
//!
//! [`Config::validate`] enforces hard limits. The checks here never reject a
//! configuration; they flag settings that are legal but probably unintended.

use crate::{
    defaults::PROCESS_TIMEOUT_GRACE,
    error::Result,
    inventory::parse_target_spec,
    models::Config,
    types::RelayProtocol,
};
use colored::Colorize;
use std::net::IpAddr;

/// Ports where a general-purpose server is unlikely to echo arbitrary bytes
const NON_ECHO_PORTS: &[u16] = &[22, 25, 53, 110, 143, 3306, 5432];

/// Configuration validator with advanced validation rules
pub struct ConfigValidator;

impl ConfigValidator {
    /// Hard validation followed by the soft checks
    pub fn validate_comprehensive(config: &Config) -> Result<Vec<ValidationWarning>> {
        config.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(Self::validate_targets(config)?);
        warnings.extend(Self::validate_worker_settings(config));
        warnings.extend(Self::validate_ping_settings(config));
        warnings.extend(Self::validate_speed_settings(config));

        Ok(warnings)
    }

    /// Parse every explicit target and look at where it points
    fn validate_targets(config: &Config) -> Result<Vec<ValidationWarning>> {
        let mut warnings = Vec::new();

        for spec in &config.targets {
            let target = parse_target_spec(spec)?;
            if let Ok(ip) = target.address.parse::<IpAddr>() {
                if ip.is_loopback() {
                    warnings.push(ValidationWarning::new(
                        ValidationLevel::Info,
                        format!("Target '{}' is a loopback address", target.id),
                    ));
                } else if is_private(&ip) {
                    warnings.push(ValidationWarning::new(
                        ValidationLevel::Info,
                        format!("Target '{}' is in a private range and may only be reachable locally", target.id),
                    ));
                }
            }
        }

        if config.relays_file.is_none() {
            if config.country.is_some() {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    "Country filter has no effect without a relay inventory file".to_string(),
                ));
            }
            if config.protocol != RelayProtocol::Any {
                warnings.push(ValidationWarning::new(
                    ValidationLevel::Warning,
                    "Protocol filter has no effect without a relay inventory file".to_string(),
                ));
            }
        }

        Ok(warnings)
    }

    fn validate_worker_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        let cpus = num_cpus::get();

        if config.max_workers > cpus * 16 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "{} workers is far above this machine's {} CPUs; ping processes may contend and skew latency",
                    config.max_workers, cpus
                ),
            ));
        } else if config.max_workers == 1 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                "A single worker probes targets one at a time".to_string(),
            ));
        }

        warnings
    }

    fn validate_ping_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        if !config.test_type.includes_latency() {
            return warnings;
        }

        if config.ping_count < 3 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Ping count of {} gives a noisy average (recommended: >= 3)", config.ping_count),
            ));
        }

        if config.timeout_seconds < 2 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Timeout of {}s may be too short for distant relays", config.timeout_seconds),
            ));
        }

        // The child process is killed once the reply wait plus grace runs out.
        let worst_case = (config.ping_reply_timeout() + PROCESS_TIMEOUT_GRACE).as_secs();
        if worst_case > 60 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!("An unreachable target may hold a worker for up to {}s", worst_case),
            ));
        }

        warnings
    }

    fn validate_speed_settings(config: &Config) -> Vec<ValidationWarning> {
        let mut warnings = Vec::new();
        if !config.test_type.includes_speed() {
            return warnings;
        }

        warnings.push(ValidationWarning::new(
            ValidationLevel::Info,
            "Throughput figures need an endpoint that echoes bytes back; other hosts report 0 Mbps".to_string(),
        ));

        for port in config.speed_ports.iter().filter(|p| NON_ECHO_PORTS.contains(*p)) {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!("Port {} belongs to a service that will not echo payload blocks", port),
            ));
        }

        if config.round_timeout() >= config.speed_duration() {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Warning,
                format!(
                    "Round timeout of {}ms leaves room for at most one round in a {}s session",
                    config.speed_round_timeout_ms, config.speed_duration_seconds
                ),
            ));
        }

        if config.speed_chunk_size > 64 * 1024 {
            warnings.push(ValidationWarning::new(
                ValidationLevel::Info,
                format!(
                    "Payload blocks of {} bytes may not come back within one round on slow links",
                    config.speed_chunk_size
                ),
            ));
        }

        warnings
    }
}

fn is_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => ipv4.is_private() || ipv4.is_link_local(),
        // fc00::/7 unique local
        IpAddr::V6(ipv6) => (ipv6.segments()[0] & 0xfe00) == 0xfc00,
    }
}

/// Validation warning levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationLevel {
    Info,
    Warning,
    Error,
}

impl ValidationLevel {
    /// Get display string for level
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

/// Configuration validation warning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationWarning {
    pub level: ValidationLevel,
    pub message: String,
}

impl ValidationWarning {
    /// Create a new validation warning
    pub fn new(level: ValidationLevel, message: String) -> Self {
        Self { level, message }
    }

    /// Format warning for display
    pub fn format(&self, use_color: bool) -> String {
        let tag = format!("[{}]", self.level.as_str());
        if !use_color {
            return format!("{} {}", tag, self.message);
        }

        let tag = match self.level {
            ValidationLevel::Info => tag.blue(),
            ValidationLevel::Warning => tag.yellow(),
            ValidationLevel::Error => tag.red().bold(),
        };
        format!("{} {}", tag, self.message)
    }
}

/// Convenience function for comprehensive configuration validation
pub fn validate_config(config: &Config) -> Result<Vec<ValidationWarning>> {
    ConfigValidator::validate_comprehensive(config)
}
