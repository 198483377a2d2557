//! Command-line interface module with topic help

pub mod help;

pub use help::HelpSystem;

use crate::types::{RelayProtocol, SortKey, TestType};
use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Relay Probe - rank network endpoints by latency and echo throughput
#[derive(Parser, Debug, Clone)]
#[command(name = "rprobe")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Target to probe, `name=address` or a bare address (repeatable)
    #[arg(short = 't', long = "target", value_name = "TARGET", action = ArgAction::Append)]
    pub targets: Vec<String>,

    /// Relay inventory JSON file
    #[arg(long, value_name = "FILE")]
    pub relays_file: Option<PathBuf>,

    /// Only inventory relays of this country code
    #[arg(long, value_name = "CODE")]
    pub country: Option<String>,

    /// Only inventory relays of this protocol (wireguard, openvpn, any)
    #[arg(long, value_name = "PROTOCOL")]
    pub protocol: Option<RelayProtocol>,

    /// Measurements per target (ping, speed, both)
    #[arg(long, value_name = "TYPE")]
    pub test_type: Option<TestType>,

    /// Maximum concurrent workers
    #[arg(short = 'w', long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Echo requests per ping
    #[arg(short, long, value_name = "N")]
    pub count: Option<u32>,

    /// Per-target ping timeout in seconds; each reply waits half of it
    #[arg(long, value_name = "SECONDS", value_parser = parse_duration)]
    pub timeout: Option<u64>,

    /// Ping executable name or path
    #[arg(long, value_name = "COMMAND")]
    pub ping_command: Option<String>,

    /// Echo session length in seconds
    #[arg(long, value_name = "SECONDS")]
    pub speed_duration: Option<u64>,

    /// Echo payload block size in bytes
    #[arg(long, value_name = "BYTES")]
    pub chunk_size: Option<usize>,

    /// Candidate echo port, tried in the given order (repeatable)
    #[arg(short = 'p', long = "port", value_name = "PORT", action = ArgAction::Append)]
    pub ports: Vec<u16>,

    /// Ranking key (latency, download, upload)
    #[arg(long = "sort", value_name = "KEY")]
    pub sort: Option<SortKey>,

    /// Show only the best N results
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Read pause/resume/stop commands from stdin
    #[arg(short, long)]
    pub interactive: bool,

    /// Force colored output
    #[arg(long)]
    pub color: bool,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,

    /// Enable verbose output
    #[arg(long)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(long)]
    pub debug: bool,

    /// Show help for a topic (targets, speed, control, config, output, examples)
    #[arg(long, value_name = "TOPIC")]
    pub help_topic: Option<String>,
}

impl Cli {
    /// Validate CLI arguments for conflicts.
    ///
    /// Whether any target source exists is only known once the environment
    /// has been merged, so that check happens on the final configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.color && self.no_color {
            return Err("Cannot specify both --color and --no-color".to_string());
        }

        if let Some(spec) = self.targets.iter().find(|t| t.trim().is_empty()) {
            return Err(format!("Empty --target value '{}'", spec));
        }

        if self.ports.contains(&0) {
            return Err("--port 0 is not a valid candidate port".to_string());
        }

        if self.limit == Some(0) {
            return Err("--limit must be greater than 0".to_string());
        }

        if self.workers == Some(0) {
            return Err("--workers must be greater than 0".to_string());
        }

        if self.interactive && self.help_topic.is_some() {
            return Err("--interactive has no effect with --help-topic".to_string());
        }

        Ok(())
    }

    pub fn should_show_topic_help(&self) -> bool {
        self.help_topic.is_some()
    }

    /// Check if colors should be enabled
    pub fn use_colors(&self) -> bool {
        if self.color {
            true
        } else if self.no_color {
            false
        } else {
            supports_color()
        }
    }

    /// Display help for the requested topic, or the overview
    pub fn display_help(&self) -> String {
        let help_system = HelpSystem::new();
        let use_colors = self.use_colors();

        match &self.help_topic {
            Some(topic) => help_system.display_topic_help(topic, use_colors).unwrap_or_else(|| {
                format!(
                    "Unknown help topic: '{}'\n\nAvailable topics: {}\n\n{}",
                    topic,
                    help::HELP_TOPICS.join(", "),
                    help_system.display_main_help(use_colors)
                )
            }),
            None => help_system.display_main_help(use_colors),
        }
    }

    /// Get configuration summary for display
    pub fn get_config_summary(&self) -> String {
        let mut summary = String::new();

        summary.push_str("Command Line:\n");
        if !self.targets.is_empty() {
            summary.push_str(&format!("  Targets: {}\n", self.targets.join(", ")));
        }
        if let Some(path) = &self.relays_file {
            summary.push_str(&format!("  Relay file: {}\n", path.display()));
        }
        if let Some(country) = &self.country {
            summary.push_str(&format!("  Country: {}\n", country));
        }
        if let Some(test_type) = self.test_type {
            summary.push_str(&format!("  Test type: {}\n", test_type));
        }
        if let Some(workers) = self.workers {
            summary.push_str(&format!("  Workers: {}\n", workers));
        }
        if !self.ports.is_empty() {
            let ports: Vec<String> = self.ports.iter().map(|p| p.to_string()).collect();
            summary.push_str(&format!("  Ports: {}\n", ports.join(", ")));
        }
        summary.push_str(&format!("  Colored output: {}\n", self.use_colors()));
        summary.push_str(&format!("  Verbose mode: {}\n", self.verbose));
        summary.push_str(&format!("  Debug mode: {}\n", self.debug));

        summary
    }
}

/// Parse a timeout in whole seconds, 1 to 300
fn parse_duration(s: &str) -> Result<u64, String> {
    if s.starts_with('+') || s.starts_with("0x") || s.starts_with("0X") {
        return Err(format!("Invalid duration: {}", s));
    }

    s.parse::<u64>()
        .map_err(|_| format!("Invalid duration: {}", s))
        .and_then(|secs| {
            if secs == 0 {
                Err("Duration must be greater than 0".to_string())
            } else if secs > crate::models::config::MAX_TIMEOUT_SECONDS {
                Err(format!(
                    "Duration cannot exceed {} seconds",
                    crate::models::config::MAX_TIMEOUT_SECONDS
                ))
            } else {
                Ok(secs)
            }
        })
}

/// Check if the terminal supports color output
pub fn supports_color() -> bool {
    if let Ok(term) = std::env::var("TERM") {
        if term == "dumb" {
            return false;
        }
    }

    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }

    if std::env::var("FORCE_COLOR").is_ok() {
        return true;
    }

    #[cfg(target_os = "windows")]
    {
        if std::env::var("ANSICON").is_ok() || std::env::var("ConEmuANSI").is_ok() {
            return true;
        }
    }

    #[cfg(unix)]
    {
        true
    }
    #[cfg(not(unix))]
    {
        false
    }
}
