//! Error handling for netgauge
//!
//! Only precondition and configuration problems surface as `AppError`
//! values to callers. Transient network failures inside a measurement
//! phase are absorbed by the phase and turned into sentinel results;
//! the remaining variants exist for logging and for the conversions a
//! worker performs before it discards an error.

use colored::{Color, Colorize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid settings from the CLI, environment or `.env` file
    #[error("Configuration error: {0}")]
    Config(String),

    /// Could not connect or the connection dropped
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered, but not usefully
    #[error("HTTP request error: {0}")]
    HttpRequest(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    /// Caller bugs such as a malformed subnet or zero attempts
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(String),

    /// URLs, JSON, addresses and numeric settings
    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

macro_rules! constructors {
    ($($name:ident => $variant:ident),* $(,)?) => {
        $(
            pub fn $name<S: Into<String>>(message: S) -> Self {
                Self::$variant(message.into())
            }
        )*
    };
}

impl AppError {
    constructors! {
        config => Config,
        network => Network,
        http_request => HttpRequest,
        timeout => Timeout,
        validation => Validation,
        io => Io,
        parse => Parse,
        discovery => Discovery,
        internal => Internal,
    }

    /// Short tag used in log fields and console output
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Network(_) => "NETWORK",
            Self::HttpRequest(_) => "HTTP",
            Self::Timeout(_) => "TIMEOUT",
            Self::Validation(_) => "VALIDATION",
            Self::Io(_) => "IO",
            Self::Parse(_) => "PARSE",
            Self::Discovery(_) => "DISCOVERY",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Transient failures that a retry could get past; logged with absorbed errors
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::HttpRequest(_) | Self::Timeout(_) | Self::Io(_)
        )
    }

    /// Process exit code; 1 covers every usage or configuration mistake
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => 1,
            Self::Network(_) | Self::HttpRequest(_) => 2,
            Self::Timeout(_) => 3,
            Self::Io(_) => 5,
            Self::Discovery(_) => 6,
            Self::Internal(_) => 99,
        }
    }

    fn message_mut(&mut self) -> &mut String {
        match self {
            Self::Config(m)
            | Self::Network(m)
            | Self::HttpRequest(m)
            | Self::Timeout(m)
            | Self::Validation(m)
            | Self::Io(m)
            | Self::Parse(m)
            | Self::Discovery(m)
            | Self::Internal(m) => m,
        }
    }

    fn console_color(&self) -> Color {
        match self {
            Self::Config(_) | Self::Validation(_) | Self::Parse(_) => Color::Red,
            Self::Network(_) | Self::HttpRequest(_) => Color::Yellow,
            Self::Timeout(_) => Color::Blue,
            Self::Io(_) | Self::Discovery(_) => Color::Cyan,
            Self::Internal(_) => Color::BrightRed,
        }
    }

    /// `[CATEGORY] message`, colored by category when `use_color` is set
    pub fn format_for_console(&self, use_color: bool) -> String {
        let category = self.category();
        let message = self.to_string();
        if !use_color {
            return format!("[{}] {}", category, message);
        }

        let color = self.console_color();
        format!("[{}] {}", category.color(color).bold(), message.color(color))
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::io(error.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(error: url::ParseError) -> Self {
        Self::parse(format!("URL parse error: {}", error))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::parse(format!("JSON parse error: {}", error))
    }
}

impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::timeout(error.to_string())
        } else if error.is_connect() || error.is_request() {
            Self::network(error.to_string())
        } else {
            Self::http_request(error.to_string())
        }
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

impl From<tokio::time::error::Elapsed> for AppError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        Self::timeout(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

/// Prefix an error message with what was being attempted
pub trait ErrorContext<T> {
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
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
            let mut error = e.into();
            let message = error.message_mut();
            *message = format!("{}: {}", f(), message);
            error
        })
    }
}
