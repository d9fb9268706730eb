//! service-shell binary.
//!
//! Loads configuration, initializes logging and metrics, then hands control
//! to the service lifecycle until the service manager (or the console) stops it.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use service_shell::cli::Cli;
use service_shell::lifecycle::{startup, ControllerOutcome};
use service_shell::observability::sink::{LogSink, TracingSink};
use service_shell::observability::{logging, metrics};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("service-shell: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let log_guard = match logging::init(&config.observability) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("service-shell: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "service-shell starting");
    tracing::info!(
        service = %config.service.name,
        bind_address = %config.listener.bind_address,
        shutdown_deadline_ms = config.service.shutdown_deadline_ms,
        on_shutdown_error = ?config.service.on_shutdown_error,
        "Configuration loaded"
    );

    let prometheus = if config.observability.metrics_enabled {
        match metrics::init_metrics() {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(error = %e, "Failed to install metrics recorder");
                None
            }
        }
    } else {
        None
    };

    let sink: Arc<dyn LogSink> = Arc::new(TracingSink);
    let outcome = match startup::run(config, cli.host_mode(), prometheus, Arc::clone(&sink)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            log_guard.teardown();
            return ExitCode::FAILURE;
        }
    };

    match outcome {
        ControllerOutcome::Clean => tracing::info!("Shutdown complete"),
        ControllerOutcome::Degraded { error } => {
            tracing::warn!(error = %error, "Shutdown complete, server did not drain cleanly")
        }
        ControllerOutcome::Failed { error } => {
            log_guard.teardown();
            sink.fatal(&format!("server shutdown failed: {}", error));
        }
    }

    log_guard.teardown();
    ExitCode::SUCCESS
}
