//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every section has defaults, so an empty file is a valid configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::lifecycle::shutdown::{
    ShutdownErrorPolicy, DEFAULT_SHUTDOWN_DEADLINE, DEFAULT_SHUTDOWN_ERROR_POLICY,
};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ShellConfig {
    /// Service registration and shutdown behaviour.
    pub service: ServiceConfig,

    /// HTTP listener settings.
    pub listener: ListenerConfig,

    /// Logging, metrics and diagnostics.
    pub observability: ObservabilityConfig,
}

/// Service registration and shutdown behaviour.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Name the service is registered under with the service manager.
    pub name: String,

    /// Upper bound on graceful drain, in milliseconds.
    pub shutdown_deadline_ms: u64,

    /// What to do when the drain fails or times out.
    pub on_shutdown_error: ShutdownErrorPolicy,
}

impl ServiceConfig {
    pub fn shutdown_deadline(&self) -> Duration {
        Duration::from_millis(self.shutdown_deadline_ms)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "service-shell".to_string(),
            shutdown_deadline_ms: DEFAULT_SHUTDOWN_DEADLINE.as_millis() as u64,
            on_shutdown_error: DEFAULT_SHUTDOWN_ERROR_POLICY,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:9586").
    pub bind_address: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:9586".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Console log format.
    pub log_format: LogFormat,

    /// Serve Prometheus metrics at `/metrics`.
    pub metrics_enabled: bool,

    /// Diagnostic file redirection.
    pub diagnostics: DiagnosticsConfig,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            diagnostics: DiagnosticsConfig::default(),
        }
    }
}

/// Where diagnostics go when the process has no console.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub enabled: bool,

    /// Fixed file to append to. When unset, a temp file is created.
    pub path: Option<PathBuf>,

    /// Temp file name prefix.
    pub prefix: String,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: None,
            prefix: "service-shell-log-".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config: ShellConfig = toml::from_str("").unwrap();
        assert_eq!(config.service.name, "service-shell");
        assert_eq!(config.service.shutdown_deadline(), DEFAULT_SHUTDOWN_DEADLINE);
        assert_eq!(config.service.on_shutdown_error, ShutdownErrorPolicy::Log);
        assert_eq!(config.listener.bind_address, "0.0.0.0:9586");
        assert!(!config.observability.diagnostics.enabled);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: ShellConfig = toml::from_str(
            r#"
            [service]
            shutdown_deadline_ms = 100
            on_shutdown_error = "exit"

            [observability]
            log_format = "json"

            [observability.diagnostics]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.service.name, "service-shell");
        assert_eq!(config.service.shutdown_deadline(), Duration::from_millis(100));
        assert_eq!(config.service.on_shutdown_error, ShutdownErrorPolicy::Exit);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert!(config.observability.diagnostics.enabled);
        assert_eq!(config.observability.diagnostics.prefix, "service-shell-log-");
    }
}
