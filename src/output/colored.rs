//! Colored formatter implementation with terminal color support
//!
//! Layout is shared with [`PlainFormatter`]; cells are padded first and
//! colored afterwards so escape codes never skew column widths.

use super::formatter::{
    fmt_err, format_duration, format_mbps, result_row, results_columns, status_label, FormattingOptions,
    OutputFormatter, PlainFormatter, RowData, TableFormat,
};
use crate::{
    error::Result,
    executor::RunReport,
    models::{ProbeResult, ProbeStatus, ProbeTarget},
    types::{LatencyLevel, SortKey, TestType},
};
use colored::*;
use std::fmt::Write as _;

impl LatencyLevel {
    /// Terminal color for this latency band
    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Red,
            Self::Unknown => Color::BrightBlack,
        }
    }
}

/// Color scheme configuration
#[derive(Debug, Clone)]
pub struct ColorScheme {
    pub header: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
    pub muted: Color,
    pub border: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            header: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            info: Color::Cyan,
            muted: Color::BrightBlack,
            border: Color::BrightBlack,
        }
    }
}

/// Colored formatter implementation
pub struct ColoredFormatter {
    plain_formatter: PlainFormatter,
    options: FormattingOptions,
    color_scheme: ColorScheme,
}

impl ColoredFormatter {
    /// Create a new colored formatter with options
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

    /// Create a colored formatter with custom color scheme
    pub fn with_color_scheme(options: FormattingOptions, color_scheme: ColorScheme) -> Self {
        Self {
            plain_formatter: PlainFormatter::new(options.clone()),
            options,
            color_scheme,
        }
    }

    /// Apply color to text if colors are enabled
    fn colorize(&self, text: &str, color: Color) -> ColoredString {
        if self.options.enable_color {
            text.color(color)
        } else {
            text.normal()
        }
    }

    fn bold(&self, text: &str) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text.normal()
        }
    }

    fn status_color(&self, result: &ProbeResult) -> Color {
        match result.status {
            ProbeStatus::Measured if result.error.is_some() => self.color_scheme.warning,
            ProbeStatus::Measured => self.color_scheme.success,
            ProbeStatus::Failed => self.color_scheme.error,
            ProbeStatus::Skipped => self.color_scheme.muted,
        }
    }

    fn create_section_header(&self, title: &str) -> String {
        self.bold(title).color(self.color_scheme.header).to_string()
    }

    fn table_format(&self, test_type: TestType) -> TableFormat {
        TableFormat {
            columns: results_columns(test_type, self.options.verbose_mode, self.options.max_cell_width),
            show_borders: self.options.table_borders,
            show_header: true,
        }
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "═".repeat(title.chars().count() + 4);

        writeln!(output, "{}", self.colorize(&border, self.color_scheme.border)).map_err(fmt_err)?;
        writeln!(output, "  {}  ", self.bold(title).color(self.color_scheme.header)).map_err(fmt_err)?;
        write!(output, "{}", self.colorize(&border, self.color_scheme.border)).map_err(fmt_err)?;

        Ok(output)
    }

    fn format_run_summary(&self, report: &RunReport) -> Result<String> {
        let summary = &report.summary;
        let mut output = String::new();

        writeln!(output, "{}", self.create_section_header("Run Summary")).map_err(fmt_err)?;
        writeln!(
            output,
            "Duration:    {}",
            self.colorize(
                &format_duration(report.elapsed.as_secs_f64() * 1000.0),
                self.color_scheme.info
            )
        )
        .map_err(fmt_err)?;
        writeln!(output, "Targets:     {}", summary.total).map_err(fmt_err)?;

        let rate = summary.success_rate();
        let rate_color = if rate >= 80.0 {
            self.color_scheme.success
        } else if rate >= 50.0 {
            self.color_scheme.warning
        } else {
            self.color_scheme.error
        };
        writeln!(
            output,
            "Measured:    {} ({})",
            self.colorize(&summary.measured.to_string(), self.color_scheme.success),
            self.colorize(&format!("{:.1}%", rate), rate_color)
        )
        .map_err(fmt_err)?;
        if summary.failed > 0 {
            writeln!(
                output,
                "Failed:      {}",
                self.colorize(&summary.failed.to_string(), self.color_scheme.error)
            )
            .map_err(fmt_err)?;
        }
        if summary.skipped > 0 {
            writeln!(
                output,
                "Skipped:     {}",
                self.colorize(&summary.skipped.to_string(), self.color_scheme.muted)
            )
            .map_err(fmt_err)?;
        }
        if let Some(latency) = &summary.latency {
            let median = LatencyLevel::from_latency(Some(latency.median_ms));
            writeln!(
                output,
                "Latency:     min {:.1}ms / median {} / max {:.1}ms",
                latency.min_ms,
                self.colorize(&format!("{:.1}ms", latency.median_ms), median.color()),
                latency.max_ms
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
            writeln!(
                output,
                "{}",
                self.colorize("Run was stopped before every target was measured", self.color_scheme.warning)
            )
            .map_err(fmt_err)?;
        }
        for notice in &report.notices {
            writeln!(output, "{} {}", self.colorize("Notice:", self.color_scheme.warning), notice)
                .map_err(fmt_err)?;
        }

        Ok(output.trim_end().to_string())
    }

    fn format_results_table(&self, results: &[ProbeResult], test_type: TestType) -> Result<String> {
        if results.is_empty() {
            return Ok(self
                .colorize("No results available.", self.color_scheme.muted)
                .to_string());
        }

        let verbose = self.options.verbose_mode;
        let format = self.table_format(test_type);
        let rows: Vec<RowData> = results
            .iter()
            .enumerate()
            .map(|(idx, result)| result_row(idx + 1, result, test_type, verbose))
            .collect();

        let latency_col = format.columns.iter().position(|c| c.header == "Latency");
        let status_col = format.columns.iter().position(|c| c.header == "Status");

        let table = self.plain_formatter.create_table_with(&format, &rows, |row, col, cell| {
            let Some(row) = row else {
                return self.bold(&cell).to_string();
            };
            let result = &results[row];
            if Some(col) == latency_col {
                self.colorize(&cell, LatencyLevel::from_latency(result.latency_ms).color())
                    .to_string()
            } else if Some(col) == status_col {
                self.colorize(&cell, self.status_color(result)).to_string()
            } else if col == 0 && row == 0 && result.status == ProbeStatus::Measured {
                self.bold(&cell).to_string()
            } else {
                cell
            }
        });

        Ok(table)
    }

    fn format_skipped(&self, skipped: &[ProbeTarget]) -> Result<String> {
        if skipped.is_empty() {
            return Ok(String::new());
        }

        let mut output = String::new();
        writeln!(
            output,
            "{}",
            self.create_section_header(&format!("Skipped ({})", skipped.len()))
        )
        .map_err(fmt_err)?;
        for target in skipped {
            writeln!(output, "  {}", self.colorize(&target.to_string(), self.color_scheme.muted))
                .map_err(fmt_err)?;
        }
        Ok(output.trim_end().to_string())
    }

    fn format_recommendation(&self, report: &RunReport, sort_key: SortKey) -> Result<String> {
        let text = self.plain_formatter.format_recommendation(report, sort_key)?;
        let color = if report.summary.best.is_some() {
            self.color_scheme.success
        } else {
            self.color_scheme.error
        };
        Ok(self.bold(&text).color(color).to_string())
    }

    fn format_result_line(&self, result: &ProbeResult) -> Result<String> {
        let mut line = format!(
            "{:<24} {}",
            result.target.id,
            self.colorize(&status_label(result), self.status_color(result))
        );
        if let Some(ms) = result.latency_ms {
            let level = LatencyLevel::from_latency(Some(ms));
            line.push_str(&format!("  {}", self.colorize(&format!("{:.1}ms", ms), level.color())));
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
        Ok(format!("{} {}", self.bold("WARNING:").color(self.color_scheme.warning), warning))
    }

    fn format_success(&self, message: &str) -> Result<String> {
        Ok(format!("{} {}", self.bold("OK:").color(self.color_scheme.success), message))
    }
}
