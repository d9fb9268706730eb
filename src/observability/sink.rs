//! Diagnostic log sink and typed log records.
//!
//! # Responsibilities
//! - `LogSink`: the capability set the lifecycle core logs through
//! - `TracingSink`: default sink, forwards to `tracing`
//! - `LogRecord`: typed severity + message + fields, mapped totally onto a sink
//!
//! # Design Decisions
//! - Severity is an enum, so emitting a record cannot fail
//! - Textual levels are only parsed at the edge (`LogRecord::from_level`),
//!   where an unknown level degrades to a warning naming it

use std::fmt;
use std::str::FromStr;

/// Where the lifecycle core writes diagnostics.
pub trait LogSink: Send + Sync {
    fn debug(&self, msg: &str);
    fn info(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);

    /// Log and terminate the process.
    fn fatal(&self, msg: &str) -> !;
}

/// Forwards to the global `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn debug(&self, msg: &str) {
        tracing::debug!("{}", msg);
    }

    fn info(&self, msg: &str) {
        tracing::info!("{}", msg);
    }

    fn warn(&self, msg: &str) {
        tracing::warn!("{}", msg);
    }

    fn error(&self, msg: &str) {
        tracing::error!("{}", msg);
    }

    fn fatal(&self, msg: &str) -> ! {
        tracing::error!(fatal = true, "{}", msg);
        std::process::exit(1)
    }
}

/// Non-fatal severities a record can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Severity::Debug),
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            _ => Err(UnknownSeverity(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSeverity(pub String);

/// A structured log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub severity: Severity,
    pub message: String,
    pub fields: Vec<(&'static str, String)>,
}

impl LogRecord {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(Severity::Warn, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Build a record from a textual level.
    ///
    /// Unknown levels become a warning that names both the message and the
    /// level that failed to match.
    pub fn from_level(level: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        match level.parse::<Severity>() {
            Ok(severity) => Self::new(severity, message),
            Err(UnknownSeverity(level)) => Self::warn(format!(
                "Unmatched log level: '{}' for message {:?}",
                level, message
            )),
        }
    }

    pub fn field(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.fields.push((key, value.to_string()));
        self
    }

    pub fn emit(&self, sink: &dyn LogSink) {
        let line = self.to_string();
        match self.severity {
            Severity::Debug => sink.debug(&line),
            Severity::Info => sink.info(&line),
            Severity::Warn => sink.warn(&line),
            Severity::Error => sink.error(&line),
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)?;
        for (key, value) in &self.fields {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}
