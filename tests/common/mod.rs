//! Shared fixtures for lifecycle integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use service_shell::lifecycle::controller::{ReportError, StatusReporter};
use service_shell::lifecycle::signal::{
    completion_signal, shutdown_signal, CompletionWatcher, ShutdownListener,
};
use service_shell::lifecycle::status::ServiceStatus;
use service_shell::lifecycle::{
    ControlRequest, GracefulServer, ServerShutdownCoordinator, ServiceController, ShutdownError,
    StatusReport, StopReason,
};
use service_shell::observability::sink::{LogSink, Severity};
use tokio::runtime::Runtime;

/// Captures every line written to the sink.
#[derive(Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<(Severity, String)>>,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<(Severity, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn at(&self, severity: Severity) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(s, _)| *s == severity)
            .map(|(_, line)| line)
            .collect()
    }

    pub fn containing(&self, needle: &str) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|(_, line)| line.contains(needle))
            .map(|(_, line)| line)
            .collect()
    }

    fn push(&self, severity: Severity, msg: &str) {
        self.lines.lock().unwrap().push((severity, msg.to_string()));
    }
}

impl LogSink for RecordingSink {
    fn debug(&self, msg: &str) {
        self.push(Severity::Debug, msg);
    }
    fn info(&self, msg: &str) {
        self.push(Severity::Info, msg);
    }
    fn warn(&self, msg: &str) {
        self.push(Severity::Warn, msg);
    }
    fn error(&self, msg: &str) {
        self.push(Severity::Error, msg);
    }
    fn fatal(&self, msg: &str) -> ! {
        panic!("fatal log in test: {}", msg)
    }
}

/// Collects status reports in order.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    reports: Arc<Mutex<Vec<StatusReport>>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<StatusReport> {
        self.reports.lock().unwrap().clone()
    }
}

impl StatusReporter for RecordingReporter {
    fn report(&mut self, report: StatusReport) -> Result<(), ReportError> {
        self.reports.lock().unwrap().push(report);
        Ok(())
    }
}

/// Rejects every report, remembering what it was asked to deliver.
#[derive(Clone, Default)]
pub struct FailingReporter {
    attempted: Arc<Mutex<Vec<ServiceStatus>>>,
}

impl FailingReporter {
    pub fn attempted(&self) -> Vec<ServiceStatus> {
        self.attempted.lock().unwrap().clone()
    }
}

impl StatusReporter for FailingReporter {
    fn report(&mut self, report: StatusReport) -> Result<(), ReportError> {
        self.attempted.lock().unwrap().push(report.status);
        Err(ReportError {
            status: report.status,
            reason: "service manager unreachable".into(),
        })
    }
}

/// Looks at the shutdown listener at the moment it is told to stop.
pub struct ListenerCheckingServer {
    listener: Mutex<ShutdownListener>,
    seen: Arc<Mutex<Option<Option<StopReason>>>>,
}

impl ListenerCheckingServer {
    pub fn new(listener: ShutdownListener) -> Self {
        Self {
            listener: Mutex::new(listener),
            seen: Arc::default(),
        }
    }

    /// `None` until shutdown is called, then what the listener held at that moment.
    pub fn seen(&self) -> Arc<Mutex<Option<Option<StopReason>>>> {
        Arc::clone(&self.seen)
    }
}

impl GracefulServer for ListenerCheckingServer {
    fn shutdown(&self) -> BoxFuture<'static, Result<(), ShutdownError>> {
        let reason = self.listener.lock().unwrap().check();
        *self.seen.lock().unwrap() = Some(reason);
        Box::pin(async { Ok(()) })
    }
}

/// A server whose drain takes a fixed time, or never finishes.
pub struct ScriptedServer {
    drain_for: Option<Duration>,
    instructed: Arc<AtomicUsize>,
}

impl ScriptedServer {
    pub fn draining_in(d: Duration) -> Self {
        Self {
            drain_for: Some(d),
            instructed: Arc::default(),
        }
    }

    pub fn never_draining() -> Self {
        Self {
            drain_for: None,
            instructed: Arc::default(),
        }
    }

    pub fn instructed(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.instructed)
    }
}

impl GracefulServer for ScriptedServer {
    fn shutdown(&self) -> BoxFuture<'static, Result<(), ShutdownError>> {
        self.instructed.fetch_add(1, Ordering::SeqCst);
        let drain_for = self.drain_for;
        Box::pin(async move {
            match drain_for {
                Some(d) => {
                    tokio::time::sleep(d).await;
                    Ok(())
                }
                None => std::future::pending().await,
            }
        })
    }
}

pub fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

/// A controller wired to recording fixtures.
pub struct Harness {
    pub controller: ServiceController<RecordingReporter>,
    pub requests: Sender<ControlRequest>,
    pub listener: ShutdownListener,
    pub completion: CompletionWatcher,
    pub reporter: RecordingReporter,
    pub sink: Arc<RecordingSink>,
    pub instructed: Arc<AtomicUsize>,
}

pub fn harness(runtime: &Runtime, server: ScriptedServer, deadline: Duration) -> Harness {
    let (requests, rx) = mpsc::channel();
    let (trigger, listener) = shutdown_signal();
    let (completion_tx, completion) = completion_signal();
    let reporter = RecordingReporter::default();
    let sink = Arc::new(RecordingSink::default());
    let instructed = server.instructed();

    let coordinator =
        ServerShutdownCoordinator::new(Arc::new(server), runtime.handle().clone(), deadline);
    let controller = ServiceController::new(reporter.clone(), rx, trigger, coordinator)
        .with_completion(completion_tx)
        .with_log_sink(sink.clone());

    Harness {
        controller,
        requests,
        listener,
        completion,
        reporter,
        sink,
        instructed,
    }
}
