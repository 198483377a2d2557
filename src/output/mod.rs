//! Output formatting and display system
//!
//! Reports render either as tables (plain or colored) or as JSON. Table
//! output goes to stdout; live per-result lines are written by the caller
//! to stderr.

mod colored;
mod formatter;

pub use self::colored::{ColorScheme, ColoredFormatter};
pub use self::formatter::{Alignment, Column, FormattingOptions, OutputFormatter, PlainFormatter, RowData, TableFormat};

use crate::{
    error::{AppError, Result},
    executor::RunReport,
    types::{SortKey, TestType},
};

/// Output formatting factory for creating appropriate formatters
pub struct OutputFormatterFactory;

impl OutputFormatterFactory {
    /// Create a formatter based on color support and preferences
    pub fn create_formatter(enable_color: bool, verbose: bool) -> Box<dyn OutputFormatter> {
        let options = FormattingOptions {
            enable_color,
            verbose_mode: verbose,
            ..Default::default()
        };

        if enable_color {
            Box::new(ColoredFormatter::new(options))
        } else {
            Box::new(PlainFormatter::new(options))
        }
    }

    /// Create a plain text formatter for scripts/logs
    pub fn create_plain_formatter() -> Box<dyn OutputFormatter> {
        Self::create_formatter(false, false)
    }
}

/// Main output coordinator that handles all result display
pub struct OutputCoordinator {
    formatter: Box<dyn OutputFormatter>,
    test_type: TestType,
    sort_key: SortKey,
    limit: Option<usize>,
}

impl OutputCoordinator {
    /// Create a new output coordinator with the specified formatter
    pub fn new(formatter: Box<dyn OutputFormatter>) -> Self {
        Self {
            formatter,
            test_type: TestType::default(),
            sort_key: SortKey::default(),
            limit: None,
        }
    }

    pub fn with_test_type(mut self, test_type: TestType) -> Self {
        self.test_type = test_type;
        self
    }

    pub fn with_sort_key(mut self, sort_key: SortKey) -> Self {
        self.sort_key = sort_key;
        self
    }

    /// Show only the best `limit` rows; `None` shows all
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Display a complete run report
    pub fn display_report(&self, report: &RunReport) -> Result<String> {
        let mut output = String::new();

        output.push_str(&self.formatter.format_header("Relay Probe Results")?);
        output.push_str("\n\n");

        output.push_str(&self.formatter.format_run_summary(report)?);
        output.push_str("\n\n");

        let shown = match self.limit {
            Some(limit) => &report.results[..limit.min(report.results.len())],
            None => &report.results[..],
        };
        output.push_str(&self.formatter.format_results_table(shown, self.test_type)?);
        if shown.len() < report.results.len() {
            output.push_str(&format!(
                "\n({} more result(s) not shown)",
                report.results.len() - shown.len()
            ));
        }
        output.push_str("\n\n");

        let skipped = self.formatter.format_skipped(&report.skipped)?;
        if !skipped.is_empty() {
            output.push_str(&skipped);
            output.push_str("\n\n");
        }

        output.push_str(&self.formatter.format_recommendation(report, self.sort_key)?);

        Ok(output)
    }

    /// Pretty-printed JSON of the whole report. `--limit` does not apply.
    pub fn display_json(report: &RunReport) -> Result<String> {
        serde_json::to_string_pretty(report)
            .map_err(|e| AppError::internal(format!("Failed to serialize run report: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::RunSummary;
    use crate::models::{ProbeResult, ProbeTarget};
    use std::time::Duration;

    fn report(count: usize) -> RunReport {
        let results: Vec<ProbeResult> = (0..count)
            .map(|i| ProbeResult::latency(ProbeTarget::new(format!("t{}", i), format!("10.0.0.{}", i)), 10.0 + i as f64))
            .collect();
        let summary = RunSummary::from_results(&results, 0, SortKey::Latency);
        RunReport {
            run_id: "run".into(),
            results,
            skipped: vec![],
            stopped: false,
            elapsed: Duration::from_secs(2),
            summary,
            notices: vec!["ping utility 'ping' not found".into()],
        }
    }

    #[test]
    fn test_display_report_sections() {
        let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_plain_formatter());
        let output = coordinator.display_report(&report(3)).unwrap();

        assert!(output.contains("Relay Probe Results"));
        assert!(output.contains("Run Summary:"));
        assert!(output.contains("t2"));
        assert!(output.contains("Notice:"));
        assert!(output.contains("Best by latency: t0"));
    }

    #[test]
    fn test_limit_trims_rows() {
        let coordinator =
            OutputCoordinator::new(OutputFormatterFactory::create_plain_formatter()).with_limit(Some(2));
        let output = coordinator.display_report(&report(5)).unwrap();

        assert!(output.contains("| t1"));
        assert!(!output.contains("| t2"));
        assert!(output.contains("(3 more result(s) not shown)"));
    }

    #[test]
    fn test_json_report() {
        let json = OutputCoordinator::display_json(&report(2)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["results"].as_array().unwrap().len(), 2);
        assert_eq!(value["summary"]["measured"], 2);
        assert_eq!(value["results"][0]["target"]["id"], "t0");
        assert_eq!(value["stopped"], false);
    }

    #[test]
    fn test_result_line() {
        let line = OutputFormatterFactory::create_plain_formatter()
            .format_result_line(&ProbeResult::latency(ProbeTarget::new("x", "10.0.0.1"), 42.0))
            .unwrap();
        assert!(line.starts_with("x"));
        assert!(line.contains("42.0ms"));
    }
}
