//! Console host: OS signals stand in for service manager requests.
//!
//! # Signals
//! - Ctrl-C → `Stop`
//! - SIGTERM (unix) / console shutdown (windows) → `Shutdown`
//! - SIGHUP (unix) → `Interrogate`

use std::sync::mpsc::{self, Sender};

use futures_util::future::BoxFuture;

use crate::host::{HostError, ServiceContext};
use crate::lifecycle::controller::{ReportError, StatusReporter};
use crate::lifecycle::status::{ControlRequest, StatusReport};

/// Writes every status report to the log.
#[derive(Debug, Clone)]
pub struct LoggingReporter {
    service: String,
}

impl LoggingReporter {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl StatusReporter for LoggingReporter {
    fn report(&mut self, report: StatusReport) -> Result<(), ReportError> {
        tracing::info!(
            service = %self.service,
            status = %report.status,
            accepts_stop = report.accepts.stop,
            exit_code = report.exit_code,
            wait_hint_ms = report.wait_hint.as_millis() as u64,
            "Service status"
        );
        Ok(())
    }
}

pub fn launch(ctx: ServiceContext) -> Result<(), HostError> {
    let (tx, rx) = mpsc::channel();
    let runtime = ctx.runtime.clone();
    let reporter = LoggingReporter::new(ctx.name.clone());
    let controller = ctx.into_controller(reporter, rx);

    std::thread::Builder::new()
        .name("service-control".into())
        .spawn(move || {
            controller.execute();
        })
        .map_err(|source| HostError::Spawn {
            thread: "service-control",
            source,
        })?;

    runtime.spawn(forward_signals(tx, ConsoleSignals::install()));
    Ok(())
}

/// Something that produces control requests, one at a time.
trait RequestSource: Send {
    fn recv(&mut self) -> BoxFuture<'_, ControlRequest>;
}

async fn forward_signals<S: RequestSource>(
    tx: Sender<ControlRequest>,
    signals: std::io::Result<S>,
) {
    let mut signals = match signals {
        Ok(signals) => signals,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install console signal handlers");
            // Dropping `tx` would read as a stop; keep the service running.
            let _tx = tx;
            std::future::pending::<()>().await;
            return;
        }
    };

    loop {
        let request = signals.recv().await;
        tracing::info!(request = request.kind(), "Console signal received");
        if tx.send(request).is_err() {
            tracing::debug!("Control loop has exited, no longer forwarding signals");
            return;
        }
    }
}

#[cfg(unix)]
struct ConsoleSignals {
    terminate: tokio::signal::unix::Signal,
    hangup: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl RequestSource for ConsoleSignals {
    fn recv(&mut self) -> BoxFuture<'_, ControlRequest> {
        Box::pin(self.next())
    }
}

#[cfg(unix)]
impl ConsoleSignals {
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    async fn next(&mut self) -> ControlRequest {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => ControlRequest::Stop,
                Err(e) => {
                    tracing::warn!(error = %e, "Ctrl-C listener failed, treating as stop");
                    ControlRequest::Stop
                }
            },
            _ = self.terminate.recv() => ControlRequest::Shutdown,
            _ = self.hangup.recv() => ControlRequest::Interrogate,
        }
    }
}

#[cfg(windows)]
struct ConsoleSignals {
    shutdown: tokio::signal::windows::CtrlShutdown,
    close: tokio::signal::windows::CtrlClose,
}

#[cfg(windows)]
impl RequestSource for ConsoleSignals {
    fn recv(&mut self) -> BoxFuture<'_, ControlRequest> {
        Box::pin(self.next())
    }
}

#[cfg(windows)]
impl ConsoleSignals {
    fn install() -> std::io::Result<Self> {
        Ok(Self {
            shutdown: tokio::signal::windows::ctrl_shutdown()?,
            close: tokio::signal::windows::ctrl_close()?,
        })
    }

    async fn next(&mut self) -> ControlRequest {
        tokio::select! {
            result = tokio::signal::ctrl_c() => match result {
                Ok(()) => ControlRequest::Stop,
                Err(e) => {
                    tracing::warn!(error = %e, "Ctrl-C listener failed, treating as stop");
                    ControlRequest::Stop
                }
            },
            _ = self.shutdown.recv() => ControlRequest::Shutdown,
            _ = self.close.recv() => ControlRequest::Shutdown,
        }
    }
}
