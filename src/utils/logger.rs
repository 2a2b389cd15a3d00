//! Logging setup
//!
//! Diagnostics go to stderr so stdout stays reserved for report output.

use std::fmt;
use tracing::Level;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    /// Level for a `-v` count layered over a configured base level
    pub fn from_verbosity(base: LogLevel, verbose: u8) -> Self {
        match verbose {
            0 => base,
            1 => LogLevel::Info.max_verbosity(base),
            2 => LogLevel::Debug.max_verbosity(base),
            _ => LogLevel::Trace,
        }
    }

    fn max_verbosity(self, other: LogLevel) -> Self {
        if self.to_tracing_level() > other.to_tracing_level() {
            self
        } else {
            other
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_tracing_level().as_str().to_lowercase())
    }
}

pub fn init_logger(level: LogLevel) {
    let filter = EnvFilter::new(format!("bdd_report={}", level.to_tracing_level()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
