//! Structured logging for the relay prober
//!
//! - Leveled entries with structured fields and correlation ids
//! - Console, JSON and compact renderings
//! - Domain helpers for probe, session and run events
//!
//! Every entry goes to stderr so stdout stays reserved for the report.

use crate::aggregator::RunSummary;
use crate::error::{AppError, ProbeError, Result};
use crate::models::{Config, ProbeTarget};
use crate::probe::speed::{SessionEnd, SessionReport};
use chrono::{DateTime, Utc};
use colored::{Color, Colorize};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Fatal => "FATAL",
        }
    }

    fn color(&self) -> Color {
        match self {
            Self::Trace => Color::White,
            Self::Debug => Color::Cyan,
            Self::Info => Color::Green,
            Self::Warn => Color::Yellow,
            Self::Error => Color::Red,
            Self::Fatal => Color::Magenta,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "TRACE" => Ok(Self::Trace),
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "WARN" | "WARNING" => Ok(Self::Warn),
            "ERROR" => Ok(Self::Error),
            "FATAL" => Ok(Self::Fatal),
            _ => Err(AppError::parse(format!("Invalid log level: {}", s))),
        }
    }
}

/// One structured log record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    /// Component that emitted the entry, e.g. `PROBE`
    pub logger: String,
    /// Ties together entries of one run
    pub correlation_id: Option<String>,
    pub fields: HashMap<String, serde_json::Value>,
    pub location: Option<LogLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLocation {
    pub file: String,
    pub line: u32,
    pub module: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogFormat {
    /// Timestamped line with sorted `key=value` fields
    Console,
    /// One JSON object per line
    Json,
    /// `HH:MM:SS L NAME: message`
    Compact,
}

/// Writes entries at or above a minimum level to stderr
pub struct Logger {
    name: String,
    min_level: LogLevel,
    format: LogFormat,
    use_color: bool,
    include_location: bool,
    session_id: Option<String>,
    /// Fields stamped onto every later entry
    context_fields: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl Logger {
    pub fn new(name: String) -> Self {
        Self {
            name,
            min_level: LogLevel::Info,
            format: LogFormat::Console,
            use_color: true,
            include_location: false,
            session_id: None,
            context_fields: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Level and format from the run flags: debug logs JSON from Debug up,
    /// verbose logs compact lines from Info, otherwise only warnings and worse.
    pub fn with_config(name: String, config: &Config) -> Self {
        let mut logger = Self::new(name);
        (logger.min_level, logger.format) = match (config.debug, config.verbose) {
            (true, _) => (LogLevel::Debug, LogFormat::Json),
            (false, true) => (LogLevel::Info, LogFormat::Compact),
            (false, false) => (LogLevel::Warn, LogFormat::Console),
        };
        logger.include_location = config.debug;
        logger.use_color = config.enable_color;
        logger
    }

    /// Drops everything below Fatal
    pub fn silent(name: &str) -> Self {
        let mut logger = Self::new(name.to_string());
        logger.set_level(LogLevel::Fatal);
        logger
    }

    pub fn with_session_id(mut self, session_id: String) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn set_level(&mut self, level: LogLevel) {
        self.min_level = level;
    }

    pub fn set_color(&mut self, use_color: bool) {
        self.use_color = use_color;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub async fn add_context_field<T: Serialize>(&self, key: &str, value: T) {
        if let Ok(value) = serde_json::to_value(value) {
            self.context_fields.write().await.insert(key.to_string(), value);
        }
    }

    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder::new(self, level, message.to_string())
    }

    pub fn trace(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Trace, message)
    }

    pub fn debug(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Debug, message)
    }

    pub fn info(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Info, message)
    }

    pub fn warn(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Warn, message)
    }

    pub fn error(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Error, message)
    }

    pub fn fatal(&self, message: &str) -> LogEntryBuilder<'_> {
        self.log(LogLevel::Fatal, message)
    }

    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    async fn write_entry(&self, mut entry: LogEntry) {
        if !self.would_log(entry.level) {
            return;
        }

        if let Some(session_id) = &self.session_id {
            entry.fields.insert("session_id".to_string(), session_id.clone().into());
        }
        for (key, value) in self.context_fields.read().await.iter() {
            entry.fields.entry(key.clone()).or_insert_with(|| value.clone());
        }

        let line = self.render(&entry);
        // Logging must never fail a probe; a closed stderr is ignored.
        let _ = writeln!(io::stderr().lock(), "{}", line);
    }

    fn render(&self, entry: &LogEntry) -> String {
        match self.format {
            LogFormat::Console => self.format_console(entry),
            LogFormat::Json => self.format_json(entry),
            LogFormat::Compact => self.format_compact(entry),
        }
    }

    fn format_console(&self, entry: &LogEntry) -> String {
        let level = format!("{:>5}", entry.level.as_str());
        let level = if self.use_color {
            level.color(entry.level.color()).to_string()
        } else {
            level
        };

        let mut line = format!(
            "{} {} [{}] {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
            level,
            entry.logger,
            entry.message
        );

        if let Some(id) = &entry.correlation_id {
            line.push_str(&format!(" [{}]", id.chars().take(8).collect::<String>()));
        }

        if !entry.fields.is_empty() {
            let mut pairs: Vec<String> = entry.fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            pairs.sort();
            line.push_str(&format!(" {{{}}}", pairs.join(", ")));
        }

        if let (true, Some(location)) = (self.include_location, &entry.location) {
            line.push_str(&format!(" @ {}:{}", location.file, location.line));
        }

        line
    }

    fn format_json(&self, entry: &LogEntry) -> String {
        serde_json::to_string(entry).unwrap_or_else(|e| {
            serde_json::json!({ "message": entry.message, "serialize_error": e.to_string() }).to_string()
        })
    }

    fn format_compact(&self, entry: &LogEntry) -> String {
        format!(
            "{} {} {}: {}",
            entry.timestamp.format("%H:%M:%S"),
            &entry.level.as_str()[..1],
            entry.logger,
            entry.message
        )
    }
}

/// Collects fields for one entry; nothing is written until [`LogEntryBuilder::log`]
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl<'a> LogEntryBuilder<'a> {
    fn new(logger: &'a Logger, level: LogLevel, message: String) -> Self {
        Self {
            logger,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                message,
                logger: logger.name.clone(),
                correlation_id: None,
                fields: HashMap::new(),
                location: None,
            },
        }
    }

    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.correlation_id = Some(id.to_string());
        self
    }

    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(json_value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), json_value);
        }
        self
    }

    pub fn location(mut self, file: &str, line: u32, module: Option<&str>) -> Self {
        self.entry.location = Some(LogLocation {
            file: file.to_string(),
            line,
            module: module.map(String::from),
        });
        self
    }

    pub fn target(self, target: &ProbeTarget) -> Self {
        self.field("target", &target.id).field("address", &target.address)
    }

    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("error_recoverable", error.is_recoverable())
            .field("error_exit_code", error.exit_code())
    }

    pub fn probe_error(self, error: &ProbeError) -> Self {
        self.field("probe_error", error.label()).field("probe_error_detail", error.to_string())
    }

    pub async fn log(self) {
        self.logger.write_entry(self.entry).await;
    }
}

/// Domain logger for probe, session and run events
pub struct ProbeLogger {
    logger: Logger,
}

impl ProbeLogger {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("PROBE".to_string(), config),
        }
    }

    pub fn from_logger(logger: Logger) -> Self {
        Self { logger }
    }

    /// For library callers and tests that want no log output
    pub fn silent() -> Self {
        Self::from_logger(Logger::silent("PROBE"))
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Outcome of one ping invocation
    pub async fn log_latency(&self, target: &ProbeTarget, outcome: &std::result::Result<f64, ProbeError>) {
        match outcome {
            Ok(latency_ms) => {
                self.logger
                    .debug(&format!("{} answered in {:.1}ms", target.id, latency_ms))
                    .target(target)
                    .field("latency_ms", latency_ms)
                    .log()
                    .await;
            }
            Err(ProbeError::Cancelled) => {
                self.logger
                    .debug(&format!("Ping to {} cancelled", target.id))
                    .target(target)
                    .log()
                    .await;
            }
            Err(error) => {
                self.logger
                    .info(&format!("Ping to {} failed: {}", target.id, error))
                    .target(target)
                    .probe_error(error)
                    .log()
                    .await;
            }
        }
    }

    /// Connection attempt on one candidate port
    pub async fn log_connection(&self, address: &str, port: u16, error: Option<&str>) {
        let (level, message) = match error {
            None => (LogLevel::Debug, format!("Connected to {}:{}", address, port)),
            Some(err) => (LogLevel::Debug, format!("Could not connect to {}:{}: {}", address, port, err)),
        };

        let mut builder = self
            .logger
            .log(level, &message)
            .field("address", address)
            .field("port", port)
            .field("success", error.is_none());
        if let Some(err) = error {
            builder = builder.field("error", err);
        }
        builder.log().await;
    }

    /// Summary of one echo session
    pub async fn log_session(&self, address: &str, report: &SessionReport) {
        let level = match report.end {
            SessionEnd::Fatal(_) => LogLevel::Info,
            _ => LogLevel::Debug,
        };
        let rtt = report
            .avg_rtt_ms
            .map(|ms| format!("{:.1}ms", ms))
            .unwrap_or_else(|| "n/a".to_string());

        self.logger
            .log(
                level,
                &format!(
                    "Echo session {}:{} ended ({}): {} rounds, {} exchanges, avg rtt {}",
                    address,
                    report.port,
                    report.end.label(),
                    report.rounds,
                    report.successful_exchanges,
                    rtt
                ),
            )
            .field("address", address)
            .field("port", report.port)
            .field("bytes_sent", report.bytes_sent)
            .field("bytes_received", report.bytes_received)
            .field("elapsed_ms", report.elapsed.as_secs_f64() * 1000.0)
            .field("download_mbps", report.download_mbps)
            .field("upload_mbps", report.upload_mbps)
            .log()
            .await;
    }

    /// A progress or result callback returned an error or panicked
    pub async fn log_callback_failure(&self, callback: &str, detail: &str) {
        self.logger
            .warn(&format!("{} callback failed: {}", callback, detail))
            .field("callback", callback)
            .log()
            .await;
    }

    pub async fn log_run_summary(&self, run_id: &str, summary: &RunSummary, stopped: bool) {
        self.logger
            .info(&format!(
                "Run finished: {}/{} measured, {} failed, {} skipped{}",
                summary.measured,
                summary.total,
                summary.failed,
                summary.skipped,
                if stopped { " (stopped)" } else { "" }
            ))
            .correlation_id(run_id)
            .field("total", summary.total)
            .field("measured", summary.measured)
            .field("failed", summary.failed)
            .field("skipped", summary.skipped)
            .field("stopped", stopped)
            .log()
            .await;
    }

    pub async fn log_error(&self, error: &AppError, context: Option<&str>) {
        let message = match context {
            Some(ctx) => format!("{}: {}", ctx, error),
            None => error.to_string(),
        };
        self.logger.error(&message).error_info(error).log().await;
    }
}

/// Hands out named loggers sharing one session id
pub struct LoggerFactory {
    config: Config,
    session_id: String,
}

impl LoggerFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            session_id: Uuid::new_v4().to_string(),
        }
    }

    pub fn create_logger(&self, name: &str) -> Logger {
        Logger::with_config(name.to_string(), &self.config).with_session_id(self.session_id.clone())
    }

    pub fn create_probe_logger(&self) -> ProbeLogger {
        ProbeLogger::from_logger(self.create_logger("PROBE"))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

/// Level macros that stamp the call site onto the entry
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[macro_export]
macro_rules! log_info {
    ($logger:expr, $($arg:tt)*) => {
        $logger.info(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[macro_export]
macro_rules! log_warn {
    ($logger:expr, $($arg:tt)*) => {
        $logger.warn(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}

#[macro_export]
macro_rules! log_error {
    ($logger:expr, $($arg:tt)*) => {
        $logger.error(&format!($($arg)*))
            .location(file!(), line!(), Some(module_path!()))
            .log()
            .await
    };
}
