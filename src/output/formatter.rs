//! Core formatting traits and implementations
//!
//! This module defines the output formatting interface and provides
//! a plain text implementation with table formatting capabilities.

use crate::{
    error::{AppError, Result},
    executor::RunReport,
    models::{ProbeResult, ProbeStatus, ProbeTarget},
    types::{SortKey, TestType},
};
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter: Send + Sync {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// Counts, elapsed time and latency spread of a run
    fn format_run_summary(&self, report: &RunReport) -> Result<String>;

    /// Ranked results as a table; columns follow the test type
    fn format_results_table(&self, results: &[ProbeResult], test_type: TestType) -> Result<String>;

    /// Targets a stop request left unmeasured
    fn format_skipped(&self, skipped: &[ProbeTarget]) -> Result<String>;

    /// The best target under the run's sort key
    fn format_recommendation(&self, report: &RunReport, sort_key: SortKey) -> Result<String>;

    /// One line per published result, for live progress
    fn format_result_line(&self, result: &ProbeResult) -> Result<String>;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> Result<String>;

    /// Format success messages
    fn format_success(&self, message: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    /// Enable colored output
    pub enable_color: bool,
    /// Show the error column and run notices
    pub verbose_mode: bool,
    /// Show table borders
    pub table_borders: bool,
    /// Widest a single cell may grow
    pub max_cell_width: usize,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
            max_cell_width: 40,
        }
    }
}

/// Table formatting configuration
#[derive(Debug, Clone)]
pub struct TableFormat {
    pub columns: Vec<Column>,
    pub show_borders: bool,
    pub show_header: bool,
}

/// Column definition for table formatting
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub alignment: Alignment,
    pub max_width: usize,
}

impl Column {
    pub fn new(header: &str, alignment: Alignment, max_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment,
            max_width,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Right,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

/// Column set for a results table under one test type
pub(crate) fn results_columns(test_type: TestType, verbose: bool, max_width: usize) -> Vec<Column> {
    let mut columns = vec![
        Column::new("#", Alignment::Right, 4),
        Column::new("Target", Alignment::Left, max_width),
        Column::new("Address", Alignment::Left, max_width),
        Column::new("Location", Alignment::Left, max_width),
    ];
    if test_type.includes_latency() {
        columns.push(Column::new("Latency", Alignment::Right, 12));
    }
    if test_type.includes_speed() {
        columns.push(Column::new("Down Mbps", Alignment::Right, 12));
        columns.push(Column::new("Up Mbps", Alignment::Right, 12));
    }
    columns.push(Column::new("Status", Alignment::Left, 16));
    if verbose {
        columns.push(Column::new("Error", Alignment::Left, max_width));
    }
    columns
}

/// Plain cell text for one result, matching [`results_columns`]
pub(crate) fn result_row(rank: usize, result: &ProbeResult, test_type: TestType, verbose: bool) -> RowData {
    let mut row = vec![
        rank.to_string(),
        result.target.id.clone(),
        result.target.address.clone(),
        result
            .target
            .location
            .as_ref()
            .map(|l| l.display_name())
            .unwrap_or_else(|| "-".to_string()),
    ];
    if test_type.includes_latency() {
        row.push(format_latency(result.latency_ms));
    }
    if test_type.includes_speed() {
        row.push(format_mbps(result.download_mbps()));
        row.push(format_mbps(result.upload_mbps()));
    }
    row.push(status_label(result));
    if verbose {
        row.push(result.error.as_ref().map(|e| e.to_string()).unwrap_or_default());
    }
    row
}

pub(crate) fn format_latency(latency_ms: Option<f64>) -> String {
    match latency_ms {
        Some(ms) => format!("{:.1}ms", ms),
        None => "-".to_string(),
    }
}

pub(crate) fn format_mbps(mbps: Option<f64>) -> String {
    match mbps {
        Some(value) => format!("{:.2}", value),
        None => "-".to_string(),
    }
}

/// `ok`, `skipped`, or the error label of a failed target
pub(crate) fn status_label(result: &ProbeResult) -> String {
    match result.status {
        ProbeStatus::Measured => match &result.error {
            // Partially measured, e.g. latency but no echo port
            Some(error) => format!("partial ({})", error.label()),
            None => "ok".to_string(),
        },
        ProbeStatus::Skipped => "skipped".to_string(),
        ProbeStatus::Failed => result
            .error
            .as_ref()
            .map(|e| e.label().to_string())
            .unwrap_or_else(|| "failed".to_string()),
    }
}

pub(crate) fn format_duration(duration_ms: f64) -> String {
    if duration_ms < 1000.0 {
        format!("{:.0}ms", duration_ms)
    } else if duration_ms < 60000.0 {
        format!("{:.2}s", duration_ms / 1000.0)
    } else {
        let minutes = (duration_ms / 60000.0) as u32;
        let seconds = (duration_ms % 60000.0) / 1000.0;
        format!("{}m{:.1}s", minutes, seconds)
    }
}

pub(crate) fn fmt_err(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format output: {}", e))
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    /// Create a new plain formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FormattingOptions {
        &self.options
    }

    /// Lay out a table. `paint` receives the row index (`None` for the
    /// header), the column index and the padded cell, and returns what to print.
    pub(crate) fn create_table_with<F>(&self, format: &TableFormat, rows: &[RowData], paint: F) -> String
    where
        F: Fn(Option<usize>, usize, String) -> String,
    {
        let widths = self.calculate_column_widths(format, rows);
        let border = self.create_horizontal_border(&widths);
        let mut output = String::new();

        if format.show_header && !format.columns.is_empty() {
            if format.show_borders {
                output.push_str(&border);
                output.push('\n');
            }
            let headers: Vec<String> = format.columns.iter().map(|c| c.header.clone()).collect();
            output.push_str(&self.create_row(None, &headers, &widths, format, &paint));
            output.push('\n');
            if format.show_borders {
                output.push_str(&border);
                output.push('\n');
            }
        }

        for (idx, row) in rows.iter().enumerate() {
            output.push_str(&self.create_row(Some(idx), row, &widths, format, &paint));
            output.push('\n');
        }

        if format.show_borders {
            output.push_str(&border);
        }

        output
    }

    /// Create a table with the given format and data
    pub fn create_table(&self, format: &TableFormat, rows: &[RowData]) -> String {
        self.create_table_with(format, rows, |_, _, cell| cell)
    }

    fn calculate_column_widths(&self, format: &TableFormat, rows: &[RowData]) -> Vec<usize> {
        format
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let content = rows
                    .iter()
                    .filter_map(|row| row.get(idx))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0);
                content.max(column.header.chars().count()).min(column.max_width)
            })
            .collect()
    }

    fn create_row<F>(
        &self,
        row_idx: Option<usize>,
        data: &[String],
        widths: &[usize],
        format: &TableFormat,
        paint: &F,
    ) -> String
    where
        F: Fn(Option<usize>, usize, String) -> String,
    {
        let mut row = String::new();
        if format.show_borders {
            row.push('|');
        }

        for (idx, width) in widths.iter().enumerate() {
            let cell = data.get(idx).map(String::as_str).unwrap_or("");
            let alignment = format.columns[idx].alignment;
            let padded = paint(row_idx, idx, align_text(cell, *width, alignment));

            if format.show_borders {
                row.push(' ');
                row.push_str(&padded);
                row.push_str(" |");
            } else {
                row.push_str(&padded);
                row.push_str("  ");
            }
        }

        row.trim_end().to_string()
    }

    fn create_horizontal_border(&self, widths: &[usize]) -> String {
        let mut border = String::from("+");
        for width in widths {
            border.push_str(&"-".repeat(width + 2));
            border.push('+');
        }
        border
    }

    fn table_format(&self, test_type: TestType) -> TableFormat {
        TableFormat {
            columns: results_columns(test_type, self.options.verbose_mode, self.options.max_cell_width),
            show_borders: self.options.table_borders,
            show_header: true,
        }
    }
}

/// Pad or truncate to exactly `width` characters
pub(crate) fn align_text(text: &str, width: usize, alignment: Alignment) -> String {
    let len = text.chars().count();
    if len > width {
        if width <= 3 {
            return text.chars().take(width).collect();
        }
        let mut cut: String = text.chars().take(width - 3).collect();
        cut.push_str("...");
        return cut;
    }

    let padding = " ".repeat(width - len);
    match alignment {
        Alignment::Left => format!("{}{}", text, padding),
        Alignment::Right => format!("{}{}", padding, text),
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.len() + 4);

        writeln!(output, "{}", border).map_err(fmt_err)?;
        writeln!(output, "  {}  ", title).map_err(fmt_err)?;
        write!(output, "{}", border).map_err(fmt_err)?;

        Ok(output)
    }

    fn format_run_summary(&self, report: &RunReport) -> Result<String> {
        let summary = &report.summary;
        let mut output = String::new();

        writeln!(output, "Run Summary:").map_err(fmt_err)?;
        writeln!(output, "------------").map_err(fmt_err)?;
        writeln!(
            output,
            "Duration:    {}",
            format_duration(report.elapsed.as_secs_f64() * 1000.0)
        )
        .map_err(fmt_err)?;
        writeln!(output, "Targets:     {}", summary.total).map_err(fmt_err)?;
        writeln!(
            output,
            "Measured:    {} ({:.1}%)",
            summary.measured,
            summary.success_rate()
        )
        .map_err(fmt_err)?;
        if summary.failed > 0 {
            writeln!(output, "Failed:      {}", summary.failed).map_err(fmt_err)?;
        }
        if summary.skipped > 0 {
            writeln!(output, "Skipped:     {}", summary.skipped).map_err(fmt_err)?;
        }
        if let Some(latency) = &summary.latency {
            writeln!(
                output,
                "Latency:     min {:.1}ms / median {:.1}ms / max {:.1}ms",
                latency.min_ms, latency.median_ms, latency.max_ms
            )
            .map_err(fmt_err)?;
        }
        if summary.mean_download_mbps.is_some() || summary.mean_upload_mbps.is_some() {
            writeln!(
                output,
                "Throughput:  mean down {} / up {} Mbps",
                format_mbps(summary.mean_download_mbps),
                format_mbps(summary.mean_upload_mbps)
            )
            .map_err(fmt_err)?;
        }
        if report.stopped {
            writeln!(output, "Run was stopped before every target was measured").map_err(fmt_err)?;
        }
        for notice in &report.notices {
            writeln!(output, "Notice:      {}", notice).map_err(fmt_err)?;
        }

        Ok(output.trim_end().to_string())
    }

    fn format_results_table(&self, results: &[ProbeResult], test_type: TestType) -> Result<String> {
        if results.is_empty() {
            return Ok("No results available.".to_string());
        }

        let rows: Vec<RowData> = results
            .iter()
            .enumerate()
            .map(|(idx, result)| result_row(idx + 1, result, test_type, self.options.verbose_mode))
            .collect();

        Ok(self.create_table(&self.table_format(test_type), &rows))
    }

    fn format_skipped(&self, skipped: &[ProbeTarget]) -> Result<String> {
        if skipped.is_empty() {
            return Ok(String::new());
        }

        let mut output = String::new();
        writeln!(output, "Skipped ({}):", skipped.len()).map_err(fmt_err)?;
        for target in skipped {
            writeln!(output, "  - {}", target).map_err(fmt_err)?;
        }
        Ok(output.trim_end().to_string())
    }

    fn format_recommendation(&self, report: &RunReport, sort_key: SortKey) -> Result<String> {
        match &report.summary.best {
            Some(best) => {
                let mut figures = Vec::new();
                if let Some(ms) = best.latency_ms {
                    figures.push(format!("{:.1}ms", ms));
                }
                if let Some(down) = best.download_mbps {
                    figures.push(format!("{:.2} Mbps down", down));
                }
                if let Some(up) = best.upload_mbps {
                    figures.push(format!("{:.2} Mbps up", up));
                }
                Ok(format!(
                    "Best by {}: {} ({}) {}",
                    sort_key,
                    best.id,
                    best.address,
                    figures.join(", ")
                )
                .trim_end()
                .to_string())
            }
            None => Ok("No target produced a usable measurement.".to_string()),
        }
    }

    fn format_result_line(&self, result: &ProbeResult) -> Result<String> {
        let mut line = format!("{:<24} {}", result.target.id, status_label(result));
        if let Some(ms) = result.latency_ms {
            line.push_str(&format!("  {:.1}ms", ms));
        }
        if let Some(speed) = result.speed.filter(|s| s.is_measured()) {
            line.push_str(&format!(
                "  down {} / up {} Mbps",
                format_mbps(speed.download_mbps),
                format_mbps(speed.upload_mbps)
            ));
        }
        Ok(line)
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("SUCCESS: {}", message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::RunSummary;
    use crate::error::ProbeError;
    use crate::models::{SpeedResult, TargetLocation};
    use std::time::Duration;

    fn plain(verbose: bool) -> PlainFormatter {
        PlainFormatter::new(FormattingOptions {
            enable_color: false,
            verbose_mode: verbose,
            ..Default::default()
        })
    }

    fn sample_results() -> Vec<ProbeResult> {
        let relay = ProbeTarget::new("se-got-wg-001", "185.213.154.66").with_location(TargetLocation {
            country: "Sweden".into(),
            country_code: "se".into(),
            city: "Gothenburg".into(),
            city_code: "got".into(),
        });
        vec![
            ProbeResult::latency(relay, 18.25),
            ProbeResult::failed(ProbeTarget::new("nowhere", "nowhere.invalid"), ProbeError::UnknownHost),
        ]
    }

    fn report(results: Vec<ProbeResult>, skipped: Vec<ProbeTarget>) -> RunReport {
        let summary = RunSummary::from_results(&results, skipped.len(), SortKey::Latency);
        RunReport {
            run_id: "run-1".into(),
            results,
            skipped,
            stopped: false,
            elapsed: Duration::from_millis(1500),
            summary,
            notices: vec![],
        }
    }

    #[test]
    fn test_header() {
        let header = plain(false).format_header("Relay Probe Results").unwrap();
        assert!(header.starts_with("======"));
        assert!(header.contains("  Relay Probe Results  "));
    }

    #[test]
    fn test_results_table_columns_follow_test_type() {
        let formatter = plain(false);
        let table = formatter.format_results_table(&sample_results(), TestType::Ping).unwrap();
        assert!(table.contains("Latency"));
        assert!(!table.contains("Down Mbps"));
        assert!(table.contains("18.2ms") || table.contains("18.3ms"));
        assert!(table.contains("Gothenburg, Sweden"));
        assert!(table.contains("unknown-host"));

        let table = formatter.format_results_table(&sample_results(), TestType::Speed).unwrap();
        assert!(!table.contains("Latency"));
        assert!(table.contains("Up Mbps"));
    }

    #[test]
    fn test_table_rows_have_equal_width() {
        let table = plain(true).format_results_table(&sample_results(), TestType::Both).unwrap();
        let widths: Vec<usize> = table.lines().map(|l| l.chars().count()).collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]), "ragged table:\n{}", table);
        assert!(table.contains("Error"));
    }

    #[test]
    fn test_status_labels() {
        let results = sample_results();
        assert_eq!(status_label(&results[0]), "ok");
        assert_eq!(status_label(&results[1]), "unknown-host");
        assert_eq!(status_label(&ProbeResult::skipped(ProbeTarget::new("a", "a"))), "skipped");

        let partial = ProbeResult::new(
            ProbeTarget::new("a", "a"),
            Some(20.0),
            Some(SpeedResult::none()),
            Some(ProbeError::ConnectFailed("refused".into())),
        );
        assert_eq!(status_label(&partial), "partial (connect-failed)");
    }

    #[test]
    fn test_align_text_truncates() {
        assert_eq!(align_text("abcdefgh", 6, Alignment::Left), "abc...");
        assert_eq!(align_text("ab", 4, Alignment::Right), "  ab");
    }

    #[test]
    fn test_summary_and_recommendation() {
        let report = report(sample_results(), vec![ProbeTarget::new("late", "10.0.0.9")]);
        let formatter = plain(false);

        let summary = formatter.format_run_summary(&report).unwrap();
        assert!(summary.contains("Targets:     3"));
        assert!(summary.contains("Measured:    1"));
        assert!(summary.contains("Skipped:     1"));
        assert!(summary.contains("1.50s"));

        let best = formatter.format_recommendation(&report, SortKey::Latency).unwrap();
        assert!(best.starts_with("Best by latency: se-got-wg-001"));

        let skipped = formatter.format_skipped(&report.skipped).unwrap();
        assert!(skipped.contains("late (10.0.0.9)"));
    }

    #[test]
    fn test_empty_inputs() {
        let formatter = plain(false);
        assert_eq!(
            formatter.format_results_table(&[], TestType::Ping).unwrap(),
            "No results available."
        );
        assert!(formatter.format_skipped(&[]).unwrap().is_empty());
        let empty = report(vec![], vec![]);
        assert!(formatter
            .format_recommendation(&empty, SortKey::Download)
            .unwrap()
            .contains("No target"));
    }

    #[test]
    fn test_duration_format() {
        assert_eq!(format_duration(250.0), "250ms");
        assert_eq!(format_duration(1500.0), "1.50s");
        assert_eq!(format_duration(90000.0), "1m30.0s");
    }
}
