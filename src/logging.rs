//! Structured logging for netgauge
//!
//! Every entry carries a component name, a level, free-form structured
//! fields and, when one is active, the session and operation ids it
//! belongs to. Entries are rendered as console text, JSON or a compact
//! single line, and always written to stderr so stdout stays reserved
//! for results.

use crate::error::AppError;
use crate::models::{Config, LatencyStats, SpeedSample};
use crate::types::TestPhase;
use chrono::{DateTime, Utc};
use colored::{Color, Colorize};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Severity of a log entry, ordered from most to least verbose
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Per-probe chatter during discovery
    Trace,
    /// Per-attempt detail and swallowed worker errors
    Debug,
    /// Phase completion
    Info,
    /// Degraded results
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    /// Console color for the level tag
    pub fn color(&self) -> Color {
        match self {
            LogLevel::Trace => Color::BrightBlack,
            LogLevel::Debug => Color::Cyan,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }

    /// Minimum level for a configuration: debug, verbose or quiet
    pub fn for_config(config: &Config) -> Self {
        if config.debug {
            LogLevel::Debug
        } else if config.verbose {
            LogLevel::Info
        } else {
            LogLevel::Warn
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How entries are rendered; JSON in debug mode, console text otherwise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Console,
    Json,
}

/// One structured log record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub component: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Sorted so console output is stable
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
    /// `file:line` of the call site, when captured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl LogFormat {
    fn render(&self, entry: &LogEntry, use_color: bool, with_source: bool) -> String {
        match self {
            LogFormat::Console => render_console(entry, use_color, with_source),
            LogFormat::Json => serde_json::to_string(entry)
                .unwrap_or_else(|e| format!("{{\"level\":\"ERROR\",\"message\":\"unserializable log entry: {}\"}}", e)),
        }
    }
}

fn render_console(entry: &LogEntry, use_color: bool, with_source: bool) -> String {
    let level = format!("{:>5}", entry.level.as_str());
    let level = if use_color {
        level.color(entry.level.color()).to_string()
    } else {
        level
    };

    let mut line = format!(
        "{} {} [{}] {}",
        entry.timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
        level,
        entry.component,
        entry.message
    );

    if let Some(operation) = &entry.operation_id {
        let short: String = operation.chars().take(8).collect();
        line.push_str(&format!(" [{}]", short));
    }

    if !entry.fields.is_empty() {
        let fields: Vec<String> = entry.fields.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        line.push_str(&format!(" {{{}}}", fields.join(", ")));
    }

    if with_source {
        if let Some(source) = &entry.source {
            line.push_str(&format!(" @ {}", source));
        }
    }

    line
}

/// Ids shared by every clone of one logger
#[derive(Debug, Default)]
struct SessionContext {
    session_id: Option<String>,
    operation_id: Option<String>,
}

/// Component logger; cheap to clone, clones share session context
#[derive(Debug, Clone)]
pub struct Logger {
    component: String,
    min_level: LogLevel,
    format: LogFormat,
    use_color: bool,
    with_source: bool,
    context: Arc<RwLock<SessionContext>>,
}

impl Logger {
    /// Logger whose level, format and coloring follow `config`
    pub fn with_config(component: String, config: &Config) -> Self {
        Self {
            component,
            min_level: LogLevel::for_config(config),
            format: if config.debug { LogFormat::Json } else { LogFormat::Console },
            use_color: config.enable_color,
            with_source: config.debug,
            context: Arc::default(),
        }
    }

    pub fn would_log(&self, level: LogLevel) -> bool {
        level >= self.min_level
    }

    pub async fn set_session_id(&self, session_id: String) {
        self.context.write().await.session_id = Some(session_id);
    }

    #[cfg(test)]
    pub(crate) async fn session_id(&self) -> Option<String> {
        self.context.read().await.session_id.clone()
    }

    /// Open an operation; entries logged until it ends carry its id
    pub async fn start_operation(&self, operation: &str) -> String {
        let operation_id = Uuid::new_v4().to_string();
        self.context.write().await.operation_id = Some(operation_id.clone());

        self.debug(&format!("{} started", operation))
            .correlation_id(&operation_id)
            .field("operation", operation)
            .log()
            .await;

        operation_id
    }

    pub async fn end_operation(&self, operation_id: &str, operation: &str, success: bool) {
        self.debug(&format!("{} finished", operation))
            .correlation_id(operation_id)
            .field("operation", operation)
            .field("success", success)
            .log()
            .await;

        let mut context = self.context.write().await;
        if context.operation_id.as_deref() == Some(operation_id) {
            context.operation_id = None;
        }
    }

    pub fn log(&self, level: LogLevel, message: &str) -> LogEntryBuilder<'_> {
        LogEntryBuilder {
            logger: self,
            entry: LogEntry {
                timestamp: Utc::now(),
                level,
                component: self.component.clone(),
                message: message.to_string(),
                session_id: None,
                operation_id: None,
                fields: BTreeMap::new(),
                source: None,
            },
        }
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

    async fn emit(&self, mut entry: LogEntry) {
        if !self.would_log(entry.level) {
            return;
        }

        {
            let context = self.context.read().await;
            entry.session_id = context.session_id.clone();
            if entry.operation_id.is_none() {
                entry.operation_id = context.operation_id.clone();
            }
        }

        let line = self.format.render(&entry, self.use_color, self.with_source);
        let _ = writeln!(io::stderr().lock(), "{}", line);
    }
}

/// Accumulates fields for one entry; nothing is written until `log()`
pub struct LogEntryBuilder<'a> {
    logger: &'a Logger,
    entry: LogEntry,
}

impl LogEntryBuilder<'_> {
    pub fn correlation_id(mut self, id: &str) -> Self {
        self.entry.operation_id = Some(id.to_string());
        self
    }

    pub fn field<T: Serialize>(mut self, key: &str, value: T) -> Self {
        if let Ok(value) = serde_json::to_value(value) {
            self.entry.fields.insert(key.to_string(), value);
        }
        self
    }

    pub fn location(mut self, file: &str, line: u32) -> Self {
        self.entry.source = Some(format!("{}:{}", file, line));
        self
    }

    pub fn latency(self, stats: &LatencyStats) -> Self {
        self.field("min_rtt_ms", stats.min_rtt_ms)
            .field("avg_rtt_ms", stats.avg_rtt_ms)
            .field("jitter_ms", stats.jitter_ms)
            .field("loss_percent", stats.loss_percent)
    }

    pub fn sample(self, sample: &SpeedSample) -> Self {
        self.field("instantaneous_mbps", sample.instantaneous_mbps)
            .field("peak_mbps", sample.peak_mbps)
            .field("average_mbps", sample.average_mbps)
    }

    pub fn error_info(self, error: &AppError) -> Self {
        self.field("error_category", error.category())
            .field("recoverable", error.is_recoverable())
    }

    pub async fn log(self) {
        self.logger.emit(self.entry).await;
    }
}

/// Times the phases of a speed test session
pub struct PhaseLogger {
    logger: Logger,
    open: HashMap<TestPhase, (DateTime<Utc>, String)>,
}

impl PhaseLogger {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("PHASE".to_string(), config),
            open: HashMap::new(),
        }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// Mark the start of a phase and return its operation id
    pub async fn start_phase(&mut self, phase: TestPhase) -> String {
        let operation_id = self.logger.start_operation(phase.as_str()).await;
        self.open.insert(phase, (Utc::now(), operation_id.clone()));
        operation_id
    }

    /// Close a phase and log its duration; `None` if it was never started
    pub async fn end_phase(&mut self, phase: TestPhase, success: bool) -> Option<chrono::Duration> {
        let Some((started, operation_id)) = self.open.remove(&phase) else {
            self.logger
                .warn(&format!("Phase {} ended without being started", phase.as_str()))
                .log()
                .await;
            return None;
        };

        let elapsed = Utc::now() - started;
        self.logger
            .info(&format!("Phase {} took {}ms", phase.as_str(), elapsed.num_milliseconds()))
            .correlation_id(&operation_id)
            .field("phase", phase)
            .field("duration_ms", elapsed.num_milliseconds())
            .field("success", success)
            .log()
            .await;
        self.logger.end_operation(&operation_id, phase.as_str(), success).await;

        Some(elapsed)
    }
}

/// Outcomes of individual network exchanges
#[derive(Debug, Clone)]
pub struct NetworkLogger {
    logger: Logger,
}

impl NetworkLogger {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("NET".to_string(), config),
        }
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    /// One HTTP request; `status` is `None` when no response arrived
    pub async fn http_exchange(&self, method: &str, url: &str, status: Option<u16>, elapsed_ms: f64) {
        let ok = status.is_some_and(|code| (200..300).contains(&code));
        let outcome = status.map_or_else(|| "no response".to_string(), |code| code.to_string());

        self.logger
            .log(
                if ok { LogLevel::Debug } else { LogLevel::Warn },
                &format!("{} {} -> {} ({:.1}ms)", method, url, outcome, elapsed_ms),
            )
            .field("method", method)
            .field("status", status)
            .field("elapsed_ms", elapsed_ms)
            .log()
            .await;
    }

    /// One discovery probe; failures are the normal case
    pub async fn probe_outcome(&self, protocol: &str, target: Ipv4Addr, port: u16, reached: bool) {
        self.logger
            .trace(&format!("{} {}:{} {}", protocol, target, port, if reached { "reached" } else { "silent" }))
            .field("reached", reached)
            .log()
            .await;
    }

    pub async fn reverse_lookup(&self, ip: Ipv4Addr, name: Option<&str>, elapsed_ms: f64) {
        self.logger
            .debug(&format!("PTR {} -> {}", ip, name.unwrap_or("-")))
            .field("elapsed_ms", elapsed_ms)
            .log()
            .await;
    }
}

/// Records errors a session absorbed instead of propagating
pub struct ErrorEventLogger {
    logger: Logger,
}

impl ErrorEventLogger {
    pub fn new(config: &Config) -> Self {
        Self {
            logger: Logger::with_config("ERR".to_string(), config),
        }
    }

    pub async fn record(&self, error: &AppError, context: &str) {
        self.logger
            .error(&format!("{}: {}", context, error))
            .error_info(error)
            .field("context", context)
            .log()
            .await;
    }
}

/// Hands out loggers that share one session id
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

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn create_phase_logger(&self) -> PhaseLogger {
        let phases = PhaseLogger::new(&self.config);
        phases.logger.set_session_id(self.session_id.clone()).await;
        phases
    }

    pub async fn create_network_logger(&self) -> NetworkLogger {
        let network = NetworkLogger::new(&self.config);
        network.logger.set_session_id(self.session_id.clone()).await;
        network
    }

    pub async fn create_error_logger(&self) -> ErrorEventLogger {
        let errors = ErrorEventLogger::new(&self.config);
        errors.logger.set_session_id(self.session_id.clone()).await;
        errors
    }
}

/// Debug entry tagged with the call site
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $($arg:tt)*) => {
        $logger.debug(&format!($($arg)*))
            .location(file!(), line!())
            .log()
            .await
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> LogEntry {
        LogEntry {
            timestamp: Utc::now(),
            level: LogLevel::Info,
            component: "TEST".to_string(),
            message: "download finished".to_string(),
            session_id: Some("session-1".to_string()),
            operation_id: Some("0123456789abcdef".to_string()),
            fields: BTreeMap::from([
                ("total_bytes".to_string(), serde_json::json!(1024)),
                ("direction".to_string(), serde_json::json!("download")),
            ]),
            source: Some("src/transfer/mod.rs:42".to_string()),
        }
    }

    #[test]
    fn test_level_order() {
        assert!(LogLevel::Trace < LogLevel::Debug);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert_eq!(LogLevel::Info.to_string(), "INFO");
    }

    #[test]
    fn test_level_follows_config() {
        let debug = Logger::with_config("T".to_string(), &Config { debug: true, enable_color: false, ..Config::default() });
        assert!(debug.would_log(LogLevel::Debug));
        assert_eq!(debug.format, LogFormat::Json);
        assert!(debug.with_source);

        let verbose = Logger::with_config("T".to_string(), &Config { verbose: true, ..Config::default() });
        assert!(verbose.would_log(LogLevel::Info));
        assert!(!verbose.would_log(LogLevel::Debug));

        let quiet = Logger::with_config("T".to_string(), &Config::default());
        assert!(!quiet.would_log(LogLevel::Info));
        assert!(quiet.would_log(LogLevel::Warn));
    }

    #[test]
    fn test_console_rendering() {
        let line = LogFormat::Console.render(&entry(), false, true);
        assert!(line.contains(" INFO [TEST] download finished"));
        assert!(line.contains("[01234567]"));
        // BTreeMap keeps fields in key order
        assert!(line.contains("{direction=\"download\", total_bytes=1024}"));
        assert!(line.ends_with("@ src/transfer/mod.rs:42"));

        let without_source = LogFormat::Console.render(&entry(), false, false);
        assert!(!without_source.contains('@'));
    }

    #[test]
    fn test_json_rendering() {
        let json: serde_json::Value = serde_json::from_str(&LogFormat::Json.render(&entry(), false, false)).unwrap();
        assert_eq!(json["level"], "INFO");
        assert_eq!(json["component"], "TEST");
        assert_eq!(json["fields"]["total_bytes"], 1024);
        assert_eq!(json["session_id"], "session-1");
        assert!(json.get("source").is_some());
    }

    #[tokio::test]
    async fn test_clones_share_session_context() {
        let logger = Logger::with_config("TEST".to_string(), &Config::default());
        let clone = logger.clone();
        logger.set_session_id("abc".to_string()).await;
        assert_eq!(clone.context.read().await.session_id.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_operation_lifecycle() {
        let logger = Logger::with_config("TEST".to_string(), &Config::default());
        let id = logger.start_operation("lan_scan").await;
        assert_eq!(logger.context.read().await.operation_id.as_deref(), Some(id.as_str()));

        // Ending some other operation leaves the active one alone
        logger.end_operation("other", "other", true).await;
        assert!(logger.context.read().await.operation_id.is_some());

        logger.end_operation(&id, "lan_scan", true).await;
        assert!(logger.context.read().await.operation_id.is_none());
    }

    #[tokio::test]
    async fn test_phase_timing() {
        let mut phases = PhaseLogger::new(&Config::default());
        phases.start_phase(TestPhase::Latency).await;
        assert_eq!(phases.open.len(), 1);

        assert!(phases.end_phase(TestPhase::Latency, true).await.is_some());
        assert!(phases.open.is_empty());
        assert!(phases.end_phase(TestPhase::Upload, true).await.is_none());
    }

    #[tokio::test]
    async fn test_factory_loggers_share_session() {
        let factory = LoggerFactory::new(Config::default());
        let network = factory.create_network_logger().await;
        let phases = factory.create_phase_logger().await;

        assert_eq!(network.logger().component, "NET");
        assert_eq!(phases.logger().component, "PHASE");
        assert_eq!(
            phases.logger().context.read().await.session_id.as_deref(),
            Some(factory.session_id())
        );
    }

    #[tokio::test]
    async fn test_specialised_loggers_accept_events() {
        let config = Config::default();
        let network = NetworkLogger::new(&config);
        network.http_exchange("HEAD", "https://speed.cloudflare.com/__down", Some(200), 12.5).await;
        network.http_exchange("GET", "https://ipapi.co/json/", None, 10_000.0).await;
        network.probe_outcome("tcp", Ipv4Addr::new(192, 168, 1, 20), 80, false).await;
        network.reverse_lookup(Ipv4Addr::new(192, 168, 1, 20), Some("nas.lan"), 3.0).await;

        let mut builder_logger = Logger::with_config("TEST".to_string(), &config);
        builder_logger.min_level = LogLevel::Error;
        builder_logger
            .info("suppressed")
            .latency(&LatencyStats::offline())
            .sample(&SpeedSample { instantaneous_mbps: 1.0, peak_mbps: 2.0, average_mbps: 1.5 })
            .log()
            .await;

        ErrorEventLogger::new(&config).record(&AppError::timeout("slow"), "Latency phase").await;
    }
}
