//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global `tracing` subscriber
//! - Choose pretty or JSON console output
//! - Attach the diagnostics file when redirection is enabled
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - A diagnostics file that cannot be opened is reported, not fatal

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::{LogFormat, ObservabilityConfig};
use crate::observability::diagnostics::{DiagnosticError, DiagnosticRedirect};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    #[error("a global subscriber is already installed: {0}")]
    Install(#[from] TryInitError),
}

/// Keeps the diagnostics redirection alive for the life of the process.
#[derive(Debug)]
pub struct LoggingGuard {
    diagnostics: Option<DiagnosticRedirect>,
}

impl LoggingGuard {
    pub fn diagnostics(&self) -> Option<&DiagnosticRedirect> {
        self.diagnostics.as_ref()
    }

    /// Flush the diagnostics file and restore the previous panic hook.
    pub fn teardown(self) {
        if let Some(diagnostics) = self.diagnostics {
            diagnostics.teardown();
        }
    }
}

pub fn init(config: &ObservabilityConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)?,
    };

    let console = match config.log_format {
        LogFormat::Pretty => fmt::layer().boxed(),
        LogFormat::Json => fmt::layer().json().boxed(),
    };

    let (diagnostics, diagnostics_error): (Option<DiagnosticRedirect>, Option<DiagnosticError>) =
        if config.diagnostics.enabled {
            match DiagnosticRedirect::install(&config.diagnostics) {
                Ok(redirect) => (Some(redirect), None),
                Err(e) => (None, Some(e)),
            }
        } else {
            (None, None)
        };

    let file_layer = diagnostics
        .as_ref()
        .map(|redirect| fmt::layer().with_ansi(false).with_writer(redirect.writer()));

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file_layer)
        .try_init()?;

    if let Some(redirect) = &diagnostics {
        tracing::info!(path = %redirect.path().display(), "Logging diagnostics to file");
    }
    if let Some(e) = diagnostics_error {
        tracing::error!(error = %e, "Diagnostics redirection unavailable, logging to console only");
    }

    Ok(LoggingGuard { diagnostics })
}
