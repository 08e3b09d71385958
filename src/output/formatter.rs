//! Core formatting traits and the plain text implementation

use crate::{
    error::{AppError, Result},
    models::{LatencyStats, ScanReport, SpeedFigures, TestResult},
    stats,
    types::TestPhase,
};
use std::fmt::Write as _;

/// Main trait for output formatting
pub trait OutputFormatter {
    /// Format a header section
    fn format_header(&self, title: &str) -> Result<String>;

    /// One line describing an in-flight snapshot
    fn format_progress(&self, snapshot: &TestResult) -> Result<String>;

    /// Final report for a finished session
    fn format_summary(&self, snapshot: &TestResult) -> Result<String>;

    /// Host table plus the advisory note, if any
    fn format_scan(&self, report: &ScanReport) -> Result<String>;

    /// Format warning messages
    fn format_warning(&self, warning: &str) -> Result<String>;
}

/// Configuration options for formatting
#[derive(Debug, Clone)]
pub struct FormattingOptions {
    pub enable_color: bool,
    /// Show secondary figures (average RTT, session id)
    pub verbose_mode: bool,
    pub table_borders: bool,
    pub max_width: usize,
}

impl Default for FormattingOptions {
    fn default() -> Self {
        Self {
            enable_color: true,
            verbose_mode: false,
            table_borders: true,
            max_width: 120,
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
    pub min_width: usize,
    pub max_width: usize,
}

impl Column {
    pub fn new(header: &str, alignment: Alignment, min_width: usize, max_width: usize) -> Self {
        Self {
            header: header.to_string(),
            alignment,
            min_width,
            max_width,
        }
    }
}

/// Text alignment options
#[derive(Debug, Clone)]
pub enum Alignment {
    Left,
    Right,
    Center,
}

/// Row data for table formatting
pub type RowData = Vec<String>;

pub(crate) fn write_err(e: std::fmt::Error) -> AppError {
    AppError::io(format!("Failed to format output: {}", e))
}

/// Columns of the discovered host table
pub(crate) fn host_table_format(show_borders: bool, max_width: usize) -> TableFormat {
    TableFormat {
        columns: vec![
            Column::new("IP Address", Alignment::Left, 10, 15),
            Column::new("Name", Alignment::Left, 12, max_width.saturating_sub(30).max(12)),
            Column::new("Role", Alignment::Center, 4, 7),
        ],
        show_borders,
        show_header: true,
    }
}

pub(crate) fn host_rows(report: &ScanReport) -> Vec<RowData> {
    report
        .hosts
        .iter()
        .map(|host| {
            vec![
                host.ip_address.clone(),
                host.display_name.clone(),
                if host.is_gateway { "gateway".to_string() } else { String::new() },
            ]
        })
        .collect()
}

/// Plain text formatter implementation
pub struct PlainFormatter {
    options: FormattingOptions,
}

impl PlainFormatter {
    pub fn new(options: FormattingOptions) -> Self {
        Self { options }
    }

    /// Create a table with the given format and data
    pub fn create_table(&self, format: &TableFormat, rows: &[RowData]) -> String {
        if rows.is_empty() {
            return String::new();
        }

        let widths = self.calculate_column_widths(format, rows);
        let mut output = String::new();

        if format.show_header && !format.columns.is_empty() {
            if format.show_borders {
                output.push_str(&self.create_horizontal_border(&widths));
                output.push('\n');
            }
            let headers: Vec<String> = format.columns.iter().map(|c| c.header.clone()).collect();
            output.push_str(&self.create_row(&headers, &widths, format));
            output.push('\n');
            if format.show_borders {
                output.push_str(&self.create_horizontal_border(&widths));
                output.push('\n');
            }
        }

        for row in rows {
            output.push_str(&self.create_row(row, &widths, format));
            output.push('\n');
        }

        if format.show_borders {
            output.push_str(&self.create_horizontal_border(&widths));
        }

        output
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
                content
                    .max(column.min_width)
                    .max(column.header.chars().count())
                    .min(column.max_width)
            })
            .collect()
    }

    fn create_row(&self, data: &[String], widths: &[usize], format: &TableFormat) -> String {
        let mut row = String::new();
        if format.show_borders {
            row.push('|');
        }

        for (idx, (cell, &width)) in data.iter().zip(widths.iter()).enumerate() {
            let alignment = format.columns.get(idx).map_or(&Alignment::Left, |c| &c.alignment);
            let padded = align_text(cell, width, alignment);

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
        for &width in widths {
            border.push_str(&"-".repeat(width + 2));
            border.push('+');
        }
        border
    }

    fn speed_line(&self, figures: &SpeedFigures) -> String {
        format!(
            "{} (peak {})",
            stats::format_speed(figures.average_mbps),
            stats::format_speed(figures.peak_mbps)
        )
    }

    fn latency_line(&self, latency: &LatencyStats) -> String {
        if latency.is_offline() {
            return "unreachable (100% loss)".to_string();
        }
        let mut line = format!(
            "{} ms   Jitter: {:.1} ms   Loss: {}",
            latency.ping_ms(),
            latency.jitter_ms,
            format_percentage(latency.loss_percent)
        );
        if self.options.verbose_mode {
            let _ = write!(line, "   Avg RTT: {:.1} ms", latency.avg_rtt_ms);
        }
        line
    }
}

/// Pad or truncate `text` to exactly `width` characters
pub(crate) fn align_text(text: &str, width: usize, alignment: &Alignment) -> String {
    let len = text.chars().count();
    if len >= width {
        return text.chars().take(width).collect();
    }

    let padding = width - len;
    match alignment {
        Alignment::Left => format!("{}{}", text, " ".repeat(padding)),
        Alignment::Right => format!("{}{}", " ".repeat(padding), text),
        Alignment::Center => {
            let left = padding / 2;
            format!("{}{}{}", " ".repeat(left), text, " ".repeat(padding - left))
        }
    }
}

/// Loss percentage with one decimal
pub(crate) fn format_percentage(percentage: f64) -> String {
    if percentage >= 99.95 {
        "100.0%".to_string()
    } else if percentage < 0.05 {
        "0.0%".to_string()
    } else {
        format!("{:.1}%", percentage)
    }
}

impl OutputFormatter for PlainFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let mut output = String::new();
        let border = "=".repeat(title.len() + 4);
        writeln!(output, "{}", border).map_err(write_err)?;
        writeln!(output, "  {}  ", title).map_err(write_err)?;
        write!(output, "{}", border).map_err(write_err)?;
        Ok(output)
    }

    fn format_progress(&self, snapshot: &TestResult) -> Result<String> {
        let line = match snapshot.phase {
            TestPhase::Download => format!(
                "[download] {} (peak {})",
                stats::format_speed(snapshot.download.current_mbps),
                stats::format_speed(snapshot.download.peak_mbps)
            ),
            TestPhase::Upload => format!(
                "[upload] {} (peak {})",
                stats::format_speed(snapshot.upload.current_mbps),
                stats::format_speed(snapshot.upload.peak_mbps)
            ),
            phase => format!("[{}] {}", phase.as_str(), snapshot.status),
        };
        Ok(line)
    }

    fn format_summary(&self, snapshot: &TestResult) -> Result<String> {
        let mut output = self.format_header("Speed Test Results")?;
        output.push('\n');

        if let Some(identity) = &snapshot.identity {
            writeln!(output, "Network:   {} ({})", identity.ip, identity.isp).map_err(write_err)?;
        }
        if let Some(latency) = &snapshot.latency {
            writeln!(output, "Ping:      {}", self.latency_line(latency)).map_err(write_err)?;
        }
        writeln!(output, "Download:  {}", self.speed_line(&snapshot.download)).map_err(write_err)?;
        writeln!(output, "Upload:    {}", self.speed_line(&snapshot.upload)).map_err(write_err)?;
        if self.options.verbose_mode {
            writeln!(output, "Session:   {}", snapshot.session_id).map_err(write_err)?;
        }
        write!(output, "{}", snapshot.status).map_err(write_err)?;

        Ok(output)
    }

    fn format_scan(&self, report: &ScanReport) -> Result<String> {
        let mut output = self.format_header("Local Network Devices")?;
        output.push('\n');

        if report.is_empty() {
            writeln!(output, "No devices found.").map_err(write_err)?;
        } else {
            let format = host_table_format(self.options.table_borders, self.options.max_width);
            writeln!(output, "{}", self.create_table(&format, &host_rows(report))).map_err(write_err)?;
            writeln!(output, "{} device(s)", report.len()).map_err(write_err)?;
        }

        if let Some(note) = &report.note {
            write!(output, "Note: {}", note).map_err(write_err)?;
        }

        Ok(output.trim_end().to_string())
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("WARNING: {}", warning))
    }
}
