//! Service control loop.
//!
//! # Responsibilities
//! - Report `StartPending` then `Running` to the service manager
//! - Read control requests one at a time and act on them
//! - On stop: signal the main flow, report `StopPending`, drain the server
//!   within the deadline, report `Stopped`
//!
//! # Design Decisions
//! - Runs on a thread owned by the service manager and blocks it freely
//! - Strictly sequential: a stop is fully handled before anything else is read
//! - Errors never escape; the loop returns a `ControllerOutcome`

use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;

use crate::lifecycle::shutdown::{ServerShutdownCoordinator, ShutdownErrorPolicy};
use crate::lifecycle::signal::{CompletionSignal, ListenerGone, ShutdownTrigger};
use crate::lifecycle::status::{ControlRequest, ServiceStatus, StatusReport, StopReason};
use crate::observability::metrics;
use crate::observability::sink::{LogRecord, LogSink, TracingSink};

/// Failure to deliver a status report to the service manager.
#[derive(Debug, Error)]
#[error("failed to report {status} status: {reason}")]
pub struct ReportError {
    pub status: ServiceStatus,
    pub reason: String,
}

/// Delivers status reports to the service manager.
pub trait StatusReporter: Send {
    fn report(&mut self, report: StatusReport) -> Result<(), ReportError>;
}

/// How the control loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerOutcome {
    /// The server drained within the deadline.
    Clean,
    /// Shutdown failed and the policy says to carry on.
    Degraded { error: String },
    /// Shutdown failed and the policy says to exit non-zero.
    Failed { error: String },
}

impl ControllerOutcome {
    pub fn exit_code(&self) -> u32 {
        match self {
            ControllerOutcome::Failed { .. } => 1,
            _ => 0,
        }
    }
}

/// The state machine invoked on the service manager's thread.
pub struct ServiceController<R> {
    reporter: R,
    requests: Receiver<ControlRequest>,
    trigger: Option<ShutdownTrigger>,
    coordinator: ServerShutdownCoordinator,
    completion: Option<CompletionSignal>,
    policy: ShutdownErrorPolicy,
    sink: Arc<dyn LogSink>,
    last_report: StatusReport,
}

impl<R: StatusReporter> ServiceController<R> {
    pub fn new(
        reporter: R,
        requests: Receiver<ControlRequest>,
        trigger: ShutdownTrigger,
        coordinator: ServerShutdownCoordinator,
    ) -> Self {
        Self {
            reporter,
            requests,
            trigger: Some(trigger),
            coordinator,
            completion: None,
            policy: ShutdownErrorPolicy::default(),
            sink: Arc::new(TracingSink),
            last_report: StatusReport::start_pending(),
        }
    }

    /// Close `completion` when the loop exits.
    pub fn with_completion(mut self, completion: CompletionSignal) -> Self {
        self.completion = Some(completion);
        self
    }

    pub fn with_policy(mut self, policy: ShutdownErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run the control loop to completion.
    ///
    /// Does not return before `Stopped` has been reported.
    pub fn execute(mut self) -> ControllerOutcome {
        self.report(StatusReport::start_pending());
        self.report(StatusReport::running());

        let reason = loop {
            let request = match self.requests.recv() {
                Ok(request) => request,
                Err(_) => {
                    LogRecord::warn("Control request channel closed, stopping").emit(&*self.sink);
                    break StopReason::Disconnected;
                }
            };
            metrics::record_control_request(request.kind());

            match request {
                ControlRequest::Interrogate => {
                    let current = self.last_report;
                    self.report(current);
                }
                ControlRequest::Stop => break StopReason::Stop,
                ControlRequest::Shutdown => break StopReason::Shutdown,
                ControlRequest::Other(code) => {
                    self.sink.warn(&format!("unexpected control request #{}", code));
                }
            }
        };

        let outcome = self.stop(reason);

        self.report(StatusReport::stopped(outcome.exit_code()));
        if let Some(completion) = self.completion.take() {
            completion.complete(outcome.clone());
        }
        outcome
    }

    fn stop(&mut self, reason: StopReason) -> ControllerOutcome {
        LogRecord::info("Stop or Shutdown signal received")
            .field("reason", reason)
            .emit(&*self.sink);

        if let Some(trigger) = self.trigger.take() {
            if let Err(ListenerGone(reason)) = trigger.fire(reason) {
                LogRecord::warn("Shutdown listener already gone")
                    .field("reason", reason)
                    .emit(&*self.sink);
            }
        }

        let deadline = self.coordinator.deadline();
        self.report(StatusReport::stop_pending(deadline));

        let started = Instant::now();
        let result = self.coordinator.shutdown();
        metrics::record_shutdown(started.elapsed(), result.is_ok());

        let outcome = match result {
            Ok(()) => ControllerOutcome::Clean,
            Err(e) => {
                LogRecord::error("server shutdown error")
                    .field("error", &e)
                    .emit(&*self.sink);
                let error = e.to_string();
                match self.policy {
                    ShutdownErrorPolicy::Log => ControllerOutcome::Degraded { error },
                    ShutdownErrorPolicy::Exit => ControllerOutcome::Failed { error },
                }
            }
        };

        LogRecord::info("Exiting service control loop")
            .field("elapsed_ms", started.elapsed().as_millis())
            .emit(&*self.sink);
        outcome
    }

    fn report(&mut self, report: StatusReport) {
        if report.status < self.last_report.status {
            LogRecord::error("Refusing to regress service status")
                .field("from", self.last_report.status)
                .field("to", report.status)
                .emit(&*self.sink);
            return;
        }

        self.last_report = report;
        metrics::record_status(report.status);
        if let Err(e) = self.reporter.report(report) {
            LogRecord::error("Status report failed")
                .field("error", e)
                .emit(&*self.sink);
        }
    }
}
