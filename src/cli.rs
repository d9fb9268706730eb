//! Command-line interface.

use std::path::PathBuf;

use clap::Parser;

use crate::config::validation::validate_config;
use crate::config::{load_config, ConfigError, LogFormat, ShellConfig};
use crate::host::HostMode;

#[derive(Debug, Parser)]
#[command(name = "service-shell")]
#[command(version, about = "Run an HTTP server under the OS service manager", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Name registered with the service manager.
    #[arg(long)]
    pub service_name: Option<String>,

    /// Listener address, e.g. 127.0.0.1:9586.
    #[arg(long)]
    pub bind: Option<String>,

    /// Do not look for a service manager; stop on Ctrl-C / SIGTERM.
    #[arg(long)]
    pub console: bool,

    /// Log level or filter directive.
    #[arg(long)]
    pub log_level: Option<String>,

    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,
}

impl Cli {
    pub fn host_mode(&self) -> HostMode {
        if self.console {
            HostMode::Console
        } else {
            HostMode::Auto
        }
    }

    /// Load the config file (or defaults), apply flag overrides, validate.
    pub fn load(&self) -> Result<ShellConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ShellConfig::default(),
        };
        self.apply_overrides(&mut config);
        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }

    fn apply_overrides(&self, config: &mut ShellConfig) {
        if let Some(name) = &self.service_name {
            config.service.name = name.clone();
        }
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
    }
}
