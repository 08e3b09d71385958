//! Colored formatter with terminal color support

use super::formatter::{
    format_percentage, host_rows, host_table_format, write_err, FormattingOptions, OutputFormatter, PlainFormatter,
};
use crate::{
    error::Result,
    models::{LatencyStats, ScanReport, SpeedFigures, TestResult},
    stats,
    types::TestPhase,
};
use colored::*;
use std::fmt::Write as _;

/// Quality classification used for color coding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformanceLevel {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

impl PerformanceLevel {
    /// Classify a ping in milliseconds
    pub fn from_latency(ping_ms: f64) -> Self {
        if ping_ms < 20.0 {
            Self::Excellent
        } else if ping_ms < 50.0 {
            Self::Good
        } else if ping_ms < 100.0 {
            Self::Fair
        } else if ping_ms < 300.0 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    /// Classify a throughput in Mbps
    pub fn from_speed(mbps: f64) -> Self {
        if mbps >= 100.0 {
            Self::Excellent
        } else if mbps >= 25.0 {
            Self::Good
        } else if mbps >= 10.0 {
            Self::Fair
        } else if mbps >= 1.0 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    pub fn color(&self) -> Color {
        match self {
            Self::Excellent => Color::Green,
            Self::Good => Color::Cyan,
            Self::Fair => Color::Yellow,
            Self::Poor => Color::Magenta,
            Self::VeryPoor => Color::Red,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::Poor => "Poor",
            Self::VeryPoor => "Very Poor",
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
    pub fn new(options: FormattingOptions) -> Self {
        Self::with_color_scheme(options, ColorScheme::default())
    }

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

    fn emphasize(&self, text: ColoredString) -> ColoredString {
        if self.options.enable_color {
            text.bold()
        } else {
            text
        }
    }

    fn speed_colored(&self, mbps: f64) -> ColoredString {
        self.colorize(&stats::format_speed(mbps), PerformanceLevel::from_speed(mbps).color())
    }

    fn speed_line(&self, figures: &SpeedFigures) -> String {
        format!(
            "{} {}",
            self.emphasize(self.speed_colored(figures.average_mbps)),
            self.colorize(&format!("(peak {})", stats::format_speed(figures.peak_mbps)), self.color_scheme.muted)
        )
    }

    fn latency_line(&self, latency: &LatencyStats) -> String {
        if latency.is_offline() {
            return self.colorize("unreachable (100% loss)", self.color_scheme.error).to_string();
        }

        let level = PerformanceLevel::from_latency(latency.min_rtt_ms);
        let loss_color = if latency.loss_percent == 0.0 {
            self.color_scheme.success
        } else if latency.loss_percent < 5.0 {
            self.color_scheme.warning
        } else {
            self.color_scheme.error
        };

        let mut line = format!(
            "{}   Jitter: {:.1} ms   Loss: {}",
            self.emphasize(self.colorize(&format!("{} ms", latency.ping_ms()), level.color())),
            latency.jitter_ms,
            self.colorize(&format_percentage(latency.loss_percent), loss_color)
        );
        if self.options.verbose_mode {
            let _ = write!(
                line,
                "   Avg RTT: {:.1} ms   {}",
                latency.avg_rtt_ms,
                self.colorize(level.description(), level.color())
            );
        }
        line
    }

    fn create_section_header(&self, title: &str) -> String {
        if self.options.enable_color {
            format!("{}", title.bold().color(self.color_scheme.header))
        } else {
            title.to_string()
        }
    }
}

impl OutputFormatter for ColoredFormatter {
    fn format_header(&self, title: &str) -> Result<String> {
        let border = "═".repeat(title.chars().count() + 4);
        let mut output = String::new();
        writeln!(output, "{}", self.colorize(&border, self.color_scheme.header)).map_err(write_err)?;
        writeln!(output, "  {}  ", self.create_section_header(title)).map_err(write_err)?;
        write!(output, "{}", self.colorize(&border, self.color_scheme.header)).map_err(write_err)?;
        Ok(output)
    }

    fn format_progress(&self, snapshot: &TestResult) -> Result<String> {
        let (label, figures) = match snapshot.phase {
            TestPhase::Download => ("download", &snapshot.download),
            TestPhase::Upload => ("upload", &snapshot.upload),
            phase => {
                return Ok(format!(
                    "{} {}",
                    self.colorize(&format!("[{}]", phase.as_str()), self.color_scheme.info),
                    snapshot.status
                ));
            }
        };

        Ok(format!(
            "{} {} {}",
            self.colorize(&format!("[{}]", label), self.color_scheme.info),
            self.speed_colored(figures.current_mbps),
            self.colorize(&format!("(peak {})", stats::format_speed(figures.peak_mbps)), self.color_scheme.muted)
        ))
    }

    fn format_summary(&self, snapshot: &TestResult) -> Result<String> {
        let mut output = self.format_header("Speed Test Results")?;
        output.push('\n');

        if let Some(identity) = &snapshot.identity {
            let ip = if identity.is_offline() {
                self.colorize(&identity.ip, self.color_scheme.error)
            } else {
                self.bold(&identity.ip)
            };
            writeln!(output, "Network:   {} ({})", ip, identity.isp).map_err(write_err)?;
        }
        if let Some(latency) = &snapshot.latency {
            writeln!(output, "Ping:      {}", self.latency_line(latency)).map_err(write_err)?;
        }
        writeln!(output, "Download:  {}", self.speed_line(&snapshot.download)).map_err(write_err)?;
        writeln!(output, "Upload:    {}", self.speed_line(&snapshot.upload)).map_err(write_err)?;
        if self.options.verbose_mode {
            writeln!(output, "Session:   {}", self.colorize(&snapshot.session_id, self.color_scheme.muted))
                .map_err(write_err)?;
        }
        write!(output, "{}", self.colorize(&snapshot.status, self.color_scheme.success)).map_err(write_err)?;

        Ok(output)
    }

    fn format_scan(&self, report: &ScanReport) -> Result<String> {
        let mut output = self.format_header("Local Network Devices")?;
        output.push('\n');

        if report.is_empty() {
            writeln!(output, "{}", self.colorize("No devices found.", self.color_scheme.muted)).map_err(write_err)?;
        } else {
            // Pad first, then color, so escape codes do not skew column widths
            let format = host_table_format(self.options.table_borders, self.options.max_width);
            let table = self.plain_formatter.create_table(&format, &host_rows(report));
            for line in table.lines() {
                let line = if line.ends_with("gateway |") || line.ends_with("gateway") {
                    self.colorize(line, self.color_scheme.success).to_string()
                } else if line.starts_with('+') {
                    self.colorize(line, self.color_scheme.muted).to_string()
                } else {
                    line.to_string()
                };
                writeln!(output, "{}", line).map_err(write_err)?;
            }
            writeln!(output, "{} device(s)", self.bold(&report.len().to_string())).map_err(write_err)?;
        }

        if let Some(note) = &report.note {
            write!(output, "{} {}", self.emphasize(self.colorize("Note:", self.color_scheme.warning)), note).map_err(write_err)?;
        }

        Ok(output.trim_end().to_string())
    }

    fn format_warning(&self, warning: &str) -> Result<String> {
        Ok(format!("{} {}", self.emphasize(self.colorize("WARNING:", self.color_scheme.warning)), warning))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DiscoveredHost;

    fn formatter(enable_color: bool) -> ColoredFormatter {
        ColoredFormatter::new(FormattingOptions { enable_color, ..FormattingOptions::default() })
    }

    #[test]
    fn test_performance_levels() {
        assert_eq!(PerformanceLevel::from_latency(8.0), PerformanceLevel::Excellent);
        assert_eq!(PerformanceLevel::from_latency(45.0), PerformanceLevel::Good);
        assert_eq!(PerformanceLevel::from_latency(999.0), PerformanceLevel::VeryPoor);
        assert_eq!(PerformanceLevel::from_speed(250.0), PerformanceLevel::Excellent);
        assert_eq!(PerformanceLevel::from_speed(12.0), PerformanceLevel::Fair);
        assert_eq!(PerformanceLevel::from_speed(0.2), PerformanceLevel::VeryPoor);
        assert_eq!(PerformanceLevel::Poor.description(), "Poor");
    }

    #[test]
    fn test_colorless_output_has_no_escape_codes() {
        let mut snapshot = TestResult::new("s".to_string()).advance(TestPhase::Complete, "Test complete");
        snapshot.latency = Some(LatencyStats { min_rtt_ms: 30.0, avg_rtt_ms: 32.0, jitter_ms: 2.0, loss_percent: 0.0 });

        let summary = formatter(false).format_summary(&snapshot).unwrap();
        assert!(!summary.contains('\u{1b}'));
        assert!(summary.contains("30 ms"));
    }

    #[test]
    fn test_scan_output() {
        let report = ScanReport {
            hosts: vec![DiscoveredHost {
                ip_address: "192.168.1.1".to_string(),
                display_name: "Router".to_string(),
                is_gateway: true,
            }],
            note: Some("Client isolation may be enabled".to_string()),
        };
        let output = formatter(false).format_scan(&report).unwrap();
        assert!(output.contains("192.168.1.1"));
        assert!(output.contains("Router"));
        assert!(output.contains("1 device(s)"));
        assert!(output.contains("Note: Client isolation"));
    }

    #[test]
    fn test_progress_line() {
        let snapshot = TestResult::new("s".to_string()).advance(TestPhase::Identity, "Resolving network identity...");
        let line = formatter(false).format_progress(&snapshot).unwrap();
        assert_eq!(line, "[identity] Resolving network identity...");
    }
}
