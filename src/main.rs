//! Relay Probe - Main CLI Application
//!
//! Ranks candidate endpoints by ping latency and echo throughput.

use clap::Parser;
use relay_probe::{
    app::App,
    cli::Cli,
    error::{AppError, ErrorReporter},
    PKG_NAME, VERSION,
};
use std::error::Error;
use std::process;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panic: {}", panic_info);
        eprintln!("Please report this issue with the command line you used.");
    }));

    let cli = Cli::parse();
    let reporter = ErrorReporter::new(cli.use_colors(), cli.verbose);

    if let Err(e) = run_application(cli).await {
        reporter.report_error(&e);

        if let Some(source) = e.source() {
            eprintln!("Caused by: {}", source);
        }

        print_error_suggestions(&e);

        process::exit(e.exit_code());
    }
}

async fn run_application(cli: Cli) -> Result<(), AppError> {
    if cli.debug {
        eprintln!("{} v{} ({})", PKG_NAME, VERSION, env!("GIT_COMMIT"));
        eprintln!("Built {} for {}", env!("BUILD_TIME"), env!("TARGET_TRIPLE"));
        eprintln!("Debug mode enabled");
        eprintln!("{}", cli.get_config_summary());
    }

    App::new(cli)?.run().await
}

/// Print helpful suggestions for common errors
fn print_error_suggestions(error: &AppError) {
    match error {
        AppError::Config(_) | AppError::Validation(_) => {
            eprintln!();
            eprintln!("Configuration help:");
            eprintln!("  - Pass targets with --target name=address or --relays-file FILE");
            eprintln!("  - Check RPROBE_* variables and your .env file");
            eprintln!("  - Run 'rprobe --help-topic config' for every setting");
        }
        AppError::Parse(_) => {
            eprintln!();
            eprintln!("Input help:");
            eprintln!("  - Targets take the form name=address or a bare address");
            eprintln!("  - The relay file must be the JSON relay list (countries > cities > relays)");
        }
        AppError::Io(_) => {
            eprintln!();
            eprintln!("File help:");
            eprintln!("  - Check that the relay file path exists and is readable");
        }
        AppError::Probe(_) => {
            eprintln!();
            eprintln!("Probe troubleshooting:");
            eprintln!("  - Check that the ping utility is installed (or set --ping-command)");
            eprintln!("  - Some hosts drop ICMP; try --test-type speed with an echo port");
            eprintln!("  - Increase --timeout for distant targets");
        }
        _ => {}
    }
}
