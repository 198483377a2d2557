//! Main application orchestration and execution

use crate::{
    cli::Cli,
    config::{display_config_summary, load_config, validate_config, EnvManager},
    error::{AppError, Result},
    executor::{RunCallbacks, RunControl, RunReport, WorkerPool},
    inventory::load_targets,
    logging::LoggerFactory,
    models::Config,
    output::{OutputCoordinator, OutputFormatterFactory},
    probe::{NetworkProber, ProbeParams},
};
use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

/// A command typed on stdin during an interactive run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Pause,
    Resume,
    Stop,
}

/// `p`/`pause`, `r`/`resume`, `s`/`stop`/`q`/`quit`; anything else is ignored
pub fn parse_control_command(line: &str) -> Option<ControlCommand> {
    match line.trim().to_lowercase().as_str() {
        "p" | "pause" => Some(ControlCommand::Pause),
        "r" | "resume" => Some(ControlCommand::Resume),
        "s" | "stop" | "q" | "quit" => Some(ControlCommand::Stop),
        _ => None,
    }
}

/// Apply one command; returns false once the run has been told to stop
pub fn apply_control_command(control: &RunControl, command: ControlCommand) -> bool {
    match command {
        ControlCommand::Pause => control.pause(),
        ControlCommand::Resume => control.resume(),
        ControlCommand::Stop => {
            control.stop();
            return false;
        }
    }
    true
}

/// Main application struct that coordinates all components
pub struct App {
    cli: Cli,
}

impl App {
    /// Create a new application instance with CLI configuration
    pub fn new(cli: Cli) -> Result<Self> {
        cli.validate().map_err(AppError::validation)?;
        Ok(Self { cli })
    }

    /// Run the application
    pub async fn run(self) -> Result<()> {
        if self.cli.should_show_topic_help() {
            println!("{}", self.cli.display_help());
            return Ok(());
        }

        let config = load_config(self.cli.clone())?;
        let use_color = if self.cli.color {
            true
        } else {
            config.enable_color && self.cli.use_colors()
        };
        colored::control::set_override(use_color);

        let console = OutputFormatterFactory::create_formatter(use_color, config.verbose);

        for warning in validate_config(&config)? {
            eprintln!("{}", warning.format(use_color));
        }

        if config.debug {
            if let Some(problems) = EnvManager::check_env_file(Path::new(".env"))? {
                for problem in problems {
                    eprintln!("{}", console.format_warning(&format!(".env {}", problem))?);
                }
            }
            eprintln!("Configuration Summary:\n{}\n", display_config_summary(&config));
        }

        if !config.has_target_source() {
            return Err(AppError::config(
                "No targets given: use --target or --relays-file (or RPROBE_TARGETS / RPROBE_RELAYS_FILE)",
            ));
        }

        let factory = LoggerFactory::new(config.clone());
        let logger = Arc::new(factory.create_probe_logger());
        logger.logger().add_context_field("test_type", config.test_type).await;

        let (targets, target_warnings) = match load_targets(&config) {
            Ok(loaded) => loaded,
            Err(e) => {
                logger.log_error(&e, Some("Loading targets")).await;
                return Err(e);
            }
        };
        for warning in &target_warnings {
            eprintln!("{}", console.format_warning(warning)?);
        }

        let params = ProbeParams::from_config(&config);

        // A missing ping binary is reported here once; the run still goes
        // ahead so throughput figures are not lost with it.
        if config.test_type.includes_latency() {
            if let Err(e) = params.latency_prober().check_available().await {
                eprintln!("{}", console.format_warning(&e.to_string())?);
                crate::log_warn!(logger.logger(), "Preflight failed for '{}': {}", config.ping_command, e);
            }
        }

        let control = Arc::new(RunControl::new());
        let signals = control.signals();
        spawn_interrupt_handler(control.clone());
        if config.interactive {
            spawn_stdin_commands(control.clone());
            eprintln!("Interactive mode: p = pause, r = resume, s = stop");
        }

        if config.verbose && !config.json_output {
            eprintln!(
                "Probing {} target(s) with up to {} worker(s) [{}]",
                targets.len(),
                config.max_workers,
                config.test_type
            );
        }
        crate::log_info!(
            logger.logger(),
            "Starting run: {} target(s), {} worker(s), session {}",
            targets.len(),
            config.max_workers,
            factory.session_id()
        );

        let callbacks = build_callbacks(&config, use_color);
        let prober = Arc::new(NetworkProber::new(params, logger.clone()));
        let pool = WorkerPool::new(prober, config.max_workers)
            .with_sort_key(config.sort_by)
            .with_logger(logger.clone());

        let report = pool.run(targets, callbacks, signals).await;

        if config.verbose && !config.json_output && report.has_measurements() {
            eprintln!(
                "{}",
                console.format_success(&format!(
                    "{} of {} target(s) measured in {:.1}s",
                    report.summary.measured,
                    report.summary.total,
                    report.elapsed.as_secs_f64()
                ))?
            );
        }

        self.print_report(&config, use_color, &report)?;
        check_outcome(&report)
    }

    fn print_report(&self, config: &Config, use_color: bool, report: &RunReport) -> Result<()> {
        if config.json_output {
            println!("{}", OutputCoordinator::display_json(report)?);
            return Ok(());
        }

        let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_formatter(use_color, config.verbose))
            .with_test_type(config.test_type)
            .with_sort_key(config.sort_by)
            .with_limit(config.limit);
        println!("{}", coordinator.display_report(report)?);
        Ok(())
    }
}

/// Live progress on stderr in verbose mode
fn build_callbacks(config: &Config, use_color: bool) -> RunCallbacks {
    if !config.verbose || config.json_output {
        return RunCallbacks::new();
    }

    let live = OutputFormatterFactory::create_formatter(use_color, false);
    RunCallbacks::new()
        .on_result(move |result| {
            eprintln!("{}", live.format_result_line(result)?);
            Ok(())
        })
        .on_progress(|percent| {
            eprintln!("Progress: {:.0}%", percent);
            Ok(())
        })
}

/// Ctrl-C requests a stop; the partial report is still printed
fn spawn_interrupt_handler(control: Arc<RunControl>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Interrupted, stopping...");
            control.stop();
        }
    });
}

/// Read commands on a plain thread so a pending stdin read never holds up exit
fn spawn_stdin_commands(control: Arc<RunControl>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let Some(command) = parse_control_command(&line) else {
                continue;
            };
            eprintln!("{:?}", command);
            if !apply_control_command(&control, command) {
                break;
            }
        }
    });
}

/// Exit status of a finished run
fn check_outcome(report: &RunReport) -> Result<()> {
    if report.has_measurements() {
        return Ok(());
    }

    if report.summary.total == 0 {
        Err(AppError::probe("no targets to probe"))
    } else if report.stopped && report.results.is_empty() {
        Err(AppError::probe("run stopped before any target was measured"))
    } else {
        Err(AppError::probe(format!(
            "none of the {} target(s) produced a measurement",
            report.summary.total
        )))
    }
}
