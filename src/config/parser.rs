//! Configuration parsing from CLI arguments and environment variables

use crate::{
    cli::Cli,
    config::env::EnvManager,
    error::Result,
    models::Config,
};

/// Configuration parser that combines CLI arguments with environment variables
pub struct ConfigParser {
    cli: Cli,
}

impl ConfigParser {
    /// Create a new configuration parser with CLI arguments
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Defaults, then `.env`, then the process environment, then CLI flags
    pub fn parse(&self) -> Result<Config> {
        let mut config = Config::default();

        EnvManager::load_env_file(self.cli.debug)?;
        config.merge_from_env()?;
        self.apply_cli_overrides(&mut config);

        config.validate()?;

        Ok(config)
    }

    /// Apply CLI argument overrides to configuration
    fn apply_cli_overrides(&self, config: &mut Config) {
        let cli = &self.cli;

        // Targets given on the command line replace the environment list.
        if !cli.targets.is_empty() {
            config.targets = cli.targets.clone();
        }
        if let Some(path) = &cli.relays_file {
            config.relays_file = Some(path.clone());
        }
        if let Some(country) = &cli.country {
            config.country = Some(country.clone());
        }
        if let Some(protocol) = cli.protocol {
            config.protocol = protocol;
        }
        if let Some(test_type) = cli.test_type {
            config.test_type = test_type;
        }
        if let Some(workers) = cli.workers {
            config.max_workers = workers;
        }
        if let Some(count) = cli.count {
            config.ping_count = count;
        }
        if let Some(timeout) = cli.timeout {
            config.timeout_seconds = timeout;
        }
        if let Some(command) = &cli.ping_command {
            config.ping_command = command.clone();
        }
        if let Some(duration) = cli.speed_duration {
            config.speed_duration_seconds = duration;
        }
        if let Some(chunk) = cli.chunk_size {
            config.speed_chunk_size = chunk;
        }
        if !cli.ports.is_empty() {
            config.speed_ports = cli.ports.clone();
        }
        if let Some(sort) = cli.sort {
            config.sort_by = sort;
        }
        if cli.limit.is_some() {
            config.limit = cli.limit;
        }

        if cli.color {
            config.enable_color = true;
        } else if cli.no_color {
            config.enable_color = false;
        }

        // CLI-only switches
        config.json_output = cli.json;
        config.interactive = cli.interactive;
        config.verbose = cli.verbose;
        config.debug = cli.debug;

        if config.debug {
            eprintln!(
                "Final config: workers={}, test_type={}, ping_count={}, timeout={}s, ports={:?}",
                config.max_workers, config.test_type, config.ping_count, config.timeout_seconds, config.speed_ports
            );
        }
    }
}

/// Convenience function to load complete configuration from CLI arguments
pub fn load_config(cli: Cli) -> Result<Config> {
    ConfigParser::new(cli).parse()
}

/// Display configuration summary for debug purposes
pub fn display_config_summary(config: &Config) -> String {
    let mut summary = Vec::new();

    if !config.targets.is_empty() {
        summary.push(format!("Targets: {}", config.targets.join(", ")));
    }
    if let Some(path) = &config.relays_file {
        summary.push(format!(
            "Relay file: {} (country: {}, protocol: {})",
            path.display(),
            config.country.as_deref().unwrap_or("any"),
            config.protocol
        ));
    }
    summary.push(format!("Test type: {}", config.test_type));
    summary.push(format!("Workers: {}", config.max_workers));
    if config.test_type.includes_latency() {
        summary.push(format!(
            "Ping: {} x {} (timeout {}s)",
            config.ping_command, config.ping_count, config.timeout_seconds
        ));
    }
    if config.test_type.includes_speed() {
        let ports: Vec<String> = config.speed_ports.iter().map(|p| p.to_string()).collect();
        summary.push(format!(
            "Speed: {}s sessions, {} byte blocks, ports {}",
            config.speed_duration_seconds,
            config.speed_chunk_size,
            ports.join(",")
        ));
    }
    summary.push(format!("Sort: {}", config.sort_by));
    summary.push(format!("Color Output: {}", config.enable_color));
    summary.push(format!("Verbose: {}", config.verbose));
    summary.push(format!("Debug: {}", config.debug));

    summary.join("\n")
}
