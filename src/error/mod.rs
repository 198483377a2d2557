//! Error handling for the relay prober
//!
//! Two layers. [`AppError`] ends the process and maps onto an exit code.
//! [`ProbeError`] describes why a single target produced no figure; it is
//! stored on the result and never ends a run.

pub mod probe;

pub use probe::ProbeError;

use colored::{Color, Colorize};
use std::fmt;
use thiserror::Error;

/// Run-level failures
#[derive(Error, Debug)]
pub enum AppError {
    /// Bad settings from flags, environment or `.env`
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Flag combinations that cannot work together
    #[error("Validation error: {0}")]
    Validation(String),

    /// Relay inventory and terminal I/O
    #[error("I/O error: {0}")]
    Io(String),

    /// Relay inventory JSON, target specs, numbers
    #[error("Parsing error: {0}")]
    Parse(String),

    /// The run finished without a single usable measurement
    #[error("Probe error: {0}")]
    Probe(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// The coarse class of an [`AppError`]; drives exit codes and presentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCategory {
    Config,
    Network,
    Timeout,
    Validation,
    Io,
    Parse,
    Probe,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "CONFIG",
            Self::Network => "NETWORK",
            Self::Timeout => "TIMEOUT",
            Self::Validation => "VALIDATION",
            Self::Io => "IO",
            Self::Parse => "PARSE",
            Self::Probe => "PROBE",
            Self::Internal => "INTERNAL",
        }
    }

    /// Process exit status. Usage-type mistakes share 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config | Self::Validation | Self::Parse => 1,
            Self::Network => 2,
            Self::Timeout => 3,
            Self::Io => 5,
            Self::Probe => 6,
            Self::Internal => 99,
        }
    }

    /// Whether simply running again could give a different outcome
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network | Self::Timeout | Self::Probe)
    }

    fn color(&self) -> Color {
        match self {
            Self::Config | Self::Validation | Self::Parse => Color::Red,
            Self::Network | Self::Probe => Color::Yellow,
            Self::Timeout => Color::Blue,
            Self::Io => Color::Cyan,
            Self::Internal => Color::BrightRed,
        }
    }

    fn headline(&self) -> &'static str {
        match self {
            Self::Config => "Configuration problem",
            Self::Network => "Network connectivity issue",
            Self::Timeout => "Operation timed out",
            Self::Validation => "Invalid input",
            Self::Io => "File operation failed",
            Self::Parse => "Failed to parse data",
            Self::Probe => "No usable measurement",
            Self::Internal => "Internal error",
        }
    }

    fn suggestion(&self) -> &'static str {
        match self {
            Self::Config => "Suggestion: Check the RPROBE_* variables, your .env file and the command line.",
            Self::Network => "Suggestion: Check that the machine has network access and try again.",
            Self::Timeout => "Suggestion: Raise the limit with --timeout.",
            Self::Validation => "Suggestion: Check target addresses, ports and numeric limits.",
            Self::Io => "Suggestion: Check that the relay file exists and is readable.",
            Self::Parse => "Suggestion: Check the relay inventory JSON or the target format (name=address).",
            Self::Probe => "Suggestion: Check that the ping utility is installed and the targets are reachable.",
            Self::Internal => "This is likely a bug. Please report it with the command line you used.",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

macro_rules! constructors {
    ($($name:ident => $variant:ident),* $(,)?) => {
        impl AppError {
            $(
                pub fn $name<S: Into<String>>(message: S) -> Self {
                    Self::$variant(message.into())
                }
            )*
        }
    };
}

constructors! {
    config => Config,
    network => Network,
    timeout => Timeout,
    validation => Validation,
    io => Io,
    parse => Parse,
    probe => Probe,
    internal => Internal,
}

impl AppError {
    pub fn kind(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Config,
            Self::Network(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::Io(_) => ErrorCategory::Io,
            Self::Parse(_) => ErrorCategory::Parse,
            Self::Probe(_) => ErrorCategory::Probe,
            Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// The message without the category prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Config(m)
            | Self::Network(m)
            | Self::Timeout(m)
            | Self::Validation(m)
            | Self::Io(m)
            | Self::Parse(m)
            | Self::Probe(m)
            | Self::Internal(m) => m,
        }
    }

    /// Same category, new message
    fn map_message<F: FnOnce(&str) -> String>(self, f: F) -> Self {
        let message = f(self.message());
        match self.kind() {
            ErrorCategory::Config => Self::Config(message),
            ErrorCategory::Network => Self::Network(message),
            ErrorCategory::Timeout => Self::Timeout(message),
            ErrorCategory::Validation => Self::Validation(message),
            ErrorCategory::Io => Self::Io(message),
            ErrorCategory::Parse => Self::Parse(message),
            ErrorCategory::Probe => Self::Probe(message),
            ErrorCategory::Internal => Self::Internal(message),
        }
    }

    /// Category label for logs and console prefixes
    pub fn category(&self) -> &'static str {
        self.kind().as_str()
    }

    pub fn is_recoverable(&self) -> bool {
        self.kind().is_transient()
    }

    pub fn exit_code(&self) -> i32 {
        self.kind().exit_code()
    }

    /// Headline, message and a hint on what to check
    pub fn user_friendly_message(&self) -> String {
        let kind = self.kind();
        format!("{}: {}\n\n{}", kind.headline(), self.message(), kind.suggestion())
    }

    /// `[CATEGORY] message`, tinted by category when `use_color` is set
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();
        if !use_color {
            return format!("[{}] {}", category, message);
        }

        let color = self.kind().color();
        format!("[{}] {}", category.color(color).bold(), message.color(color))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {}", error))
    }
}

impl From<dotenv::Error> for AppError {
    fn from(error: dotenv::Error) -> Self {
        Self::config(format!("Environment file error: {}", error))
    }
}

impl From<std::num::ParseIntError> for AppError {
    fn from(error: std::num::ParseIntError) -> Self {
        Self::parse(format!("Integer parse error: {}", error))
    }
}

impl From<std::num::ParseFloatError> for AppError {
    fn from(error: std::num::ParseFloatError) -> Self {
        Self::parse(format!("Float parse error: {}", error))
    }
}

impl From<std::str::ParseBoolError> for AppError {
    fn from(error: std::str::ParseBoolError) -> Self {
        Self::parse(format!("Boolean parse error: {}", error))
    }
}

impl From<std::net::AddrParseError> for AppError {
    fn from(error: std::net::AddrParseError) -> Self {
        Self::parse(format!("IP address parse error: {}", error))
    }
}

impl From<regex::Error> for AppError {
    fn from(error: regex::Error) -> Self {
        Self::internal(format!("Pattern compile error: {}", error))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(format!("{:#}", error))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Prefix an error with what was being attempted, keeping its category
pub trait ErrorContext<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;

    fn context(self, message: &'static str) -> Result<T>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<AppError>,
{
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let context = f();
            e.into().map_message(|message| format!("{}: {}", context, message))
        })
    }

    fn context(self, message: &'static str) -> Result<T> {
        self.with_context(|| message.to_string())
    }
}

/// Prints fatal errors for the binary
pub struct ErrorReporter {
    pub use_color: bool,
    pub verbose: bool,
}

impl ErrorReporter {
    pub fn new(use_color: bool, verbose: bool) -> Self {
        Self { use_color, verbose }
    }

    /// One line on stderr; verbose mode adds the hint and a retry note
    pub fn report_error(&self, error: &AppError) {
        eprintln!("{}", error.format_for_console(self.use_color));
        if !self.verbose {
            return;
        }

        eprintln!();
        eprintln!("{}", error.user_friendly_message());
        if error.is_recoverable() {
            let note = "Network conditions change; running again may give a different result.";
            eprintln!();
            if self.use_color {
                eprintln!("{}", note.green());
            } else {
                eprintln!("{}", note);
            }
        }
    }
}

impl Default for ErrorReporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_and_exit_code() {
        let config_error = AppError::config("Invalid configuration");
        assert_eq!(config_error.category(), "CONFIG");
        assert!(!config_error.is_recoverable());
        assert_eq!(config_error.exit_code(), 1);

        let probe_error = AppError::probe("no target answered");
        assert_eq!(probe_error.kind(), ErrorCategory::Probe);
        assert!(probe_error.is_recoverable());
        assert_eq!(probe_error.exit_code(), 6);

        assert_eq!(AppError::network("x").exit_code(), 2);
        assert_eq!(AppError::timeout("x").exit_code(), 3);
        assert_eq!(AppError::io("x").exit_code(), 5);
        assert_eq!(AppError::internal("x").exit_code(), 99);
    }

    #[test]
    fn test_message_strips_prefix() {
        let error = AppError::validation("worker count must be at least 1");
        assert_eq!(error.message(), "worker count must be at least 1");
        assert_eq!(error.to_string(), "Validation error: worker count must be at least 1");
    }

    #[test]
    fn test_user_friendly_messages() {
        let message = AppError::parse("expected name=address").user_friendly_message();
        assert!(message.starts_with("Failed to parse data: expected name=address"));
        assert!(message.contains("Suggestion:"));
    }

    #[test]
    fn test_error_conversions() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "relays.json");
        assert_eq!(AppError::from(io_error).category(), "IO");

        let parse_error = "fifteen".parse::<usize>().unwrap_err();
        assert_eq!(AppError::from(parse_error).category(), "PARSE");

        let json_error = serde_json::from_str::<serde_json::Value>("{countries").unwrap_err();
        assert!(AppError::from(json_error).to_string().contains("JSON parse error"));

        let dotenv_error = dotenv::Error::LineParse(".env".to_string(), 1);
        assert_eq!(AppError::from(dotenv_error).kind(), ErrorCategory::Config);
    }

    #[test]
    fn test_error_context_keeps_category() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "missing"));

        let error = result.context("While reading relay inventory").unwrap_err();
        assert_eq!(error.category(), "IO");
        assert_eq!(error.exit_code(), 5);
        assert_eq!(error.message(), "While reading relay inventory: missing");
    }

    #[test]
    fn test_console_formatting() {
        let error = AppError::validation("bad flags");
        assert_eq!(error.format_for_console(false), "[VALIDATION] Validation error: bad flags");
        assert!(error.format_for_console(true).contains("VALIDATION"));
    }

    #[test]
    fn test_reporter_defaults() {
        let reporter = ErrorReporter::default();
        assert!(reporter.use_color);
        assert!(!reporter.verbose);
    }
}
