//! Startup orchestration and main-flow teardown.
//!
//! # Responsibilities
//! - Bind the listener and spawn the HTTP server
//! - Create the shutdown and completion signals
//! - Launch the service host with the controller's context
//! - Wait for the stop request, then for the control loop to finish
//!
//! # Design Decisions
//! - Listener binds before the host launches, so a bind failure never
//!   reaches the service manager as Running
//! - A server still draining after the loop has exited is aborted

use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::runtime::Handle;

use crate::config::ShellConfig;
use crate::host::{self, HostError, HostMode, ServiceContext};
use crate::http::HttpServer;
use crate::lifecycle::controller::ControllerOutcome;
use crate::lifecycle::shutdown::ServerShutdownCoordinator;
use crate::lifecycle::signal::{completion_signal, shutdown_signal};
use crate::observability::sink::LogSink;

const SERVER_SETTLE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Host(#[from] HostError),
}

/// Run the service until the control loop exits.
pub async fn run(
    config: ShellConfig,
    mode: HostMode,
    metrics: Option<PrometheusHandle>,
    sink: Arc<dyn LogSink>,
) -> Result<ControllerOutcome, StartupError> {
    run_with_host(config, metrics, sink, move |ctx| host::launch(ctx, mode)).await
}

/// [`run`] with the host supplied by the caller.
pub async fn run_with_host<F>(
    config: ShellConfig,
    metrics: Option<PrometheusHandle>,
    sink: Arc<dyn LogSink>,
    launch: F,
) -> Result<ControllerOutcome, StartupError>
where
    F: FnOnce(ServiceContext) -> Result<(), HostError>,
{
    let address = config.listener.bind_address.clone();
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| StartupError::Bind { address, source })?;

    let (server, handle) = HttpServer::new(&config.listener, metrics);
    let mut server_task = tokio::spawn(server.run(listener));

    let (trigger, shutdown_listener) = shutdown_signal();
    let (completion, mut completion_watcher) = completion_signal();
    let coordinator = ServerShutdownCoordinator::new(
        Arc::new(handle),
        Handle::current(),
        config.service.shutdown_deadline(),
    );

    let ctx = ServiceContext {
        name: config.service.name.clone(),
        trigger,
        coordinator,
        completion,
        policy: config.service.on_shutdown_error,
        sink,
        runtime: Handle::current(),
    };
    if let Err(e) = launch(ctx) {
        server_task.abort();
        return Err(e.into());
    }

    match shutdown_listener.wait().await {
        Some(reason) => tracing::info!(reason = %reason, "Shutdown requested, tearing down"),
        None => tracing::warn!("Service controller went away without requesting shutdown"),
    }

    let outcome = completion_watcher
        .wait()
        .await
        .unwrap_or_else(|| ControllerOutcome::Failed {
            error: "control loop ended without reporting an outcome".to_string(),
        });

    // A drained server sets Stopped just before its task returns.
    let settled = tokio::time::timeout(SERVER_SETTLE, &mut server_task).await.is_ok();
    if !settled {
        tracing::warn!("HTTP server still draining after the deadline, aborting it");
        server_task.abort();
    }

    Ok(outcome)
}
