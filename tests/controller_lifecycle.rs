//! Control loop behaviour against scripted servers.

use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use service_shell::lifecycle::status::ServiceStatus;
use service_shell::lifecycle::signal::shutdown_signal;
use service_shell::lifecycle::{
    ControlRequest, ControllerOutcome, ServerShutdownCoordinator, ServiceController,
    ShutdownErrorPolicy, StatusReport, StopReason,
};
use service_shell::observability::sink::Severity;

mod common;

use common::{
    harness, runtime, FailingReporter, ListenerCheckingServer, RecordingReporter, RecordingSink,
    ScriptedServer,
};

fn statuses(reports: &[StatusReport]) -> Vec<ServiceStatus> {
    reports.iter().map(|r| r.status).collect()
}

fn wait_for_reports(reporter: &RecordingReporter, count: usize) {
    let started = Instant::now();
    while reporter.reports().len() < count {
        assert!(
            started.elapsed() < Duration::from_secs(5),
            "timed out waiting for {} reports",
            count
        );
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn interrogate_keeps_running_without_signalling() {
    let rt = runtime();
    let mut h = harness(
        &rt,
        ScriptedServer::draining_in(Duration::from_millis(10)),
        Duration::from_millis(1000),
    );
    let reporter = h.reporter.clone();
    let sink = h.sink.clone();

    let controller = h.controller;
    let join = thread::spawn(move || controller.execute());

    h.requests.send(ControlRequest::Interrogate).unwrap();
    h.requests.send(ControlRequest::Interrogate).unwrap();
    wait_for_reports(&reporter, 4);

    assert_eq!(
        statuses(&reporter.reports()),
        vec![
            ServiceStatus::StartPending,
            ServiceStatus::Running,
            ServiceStatus::Running,
            ServiceStatus::Running,
        ]
    );
    assert_eq!(h.listener.check(), None);
    assert_eq!(h.instructed.load(Ordering::SeqCst), 0);
    assert!(sink.containing("Stop or Shutdown").is_empty());
    assert!(h.completion.outcome().is_none());

    h.requests.send(ControlRequest::Stop).unwrap();
    assert_eq!(join.join().unwrap(), ControllerOutcome::Clean);
}

#[test]
fn interrogate_echoes_last_report() {
    let rt = runtime();
    let h = harness(
        &rt,
        ScriptedServer::draining_in(Duration::from_millis(10)),
        Duration::from_millis(1000),
    );
    h.requests.send(ControlRequest::Interrogate).unwrap();
    h.requests.send(ControlRequest::Stop).unwrap();

    h.controller.execute();

    let reports = h.reporter.reports();
    assert_eq!(reports[2], reports[1]);
    assert_eq!(reports[1], StatusReport::running());
}

#[test]
fn stop_with_fast_drain_exits_cleanly() {
    let rt = runtime();
    let mut h = harness(
        &rt,
        ScriptedServer::draining_in(Duration::from_millis(10)),
        Duration::from_millis(1000),
    );
    h.requests.send(ControlRequest::Stop).unwrap();

    let outcome = h.controller.execute();

    assert_eq!(outcome, ControllerOutcome::Clean);
    assert_eq!(h.listener.check(), Some(StopReason::Stop));
    assert_eq!(h.instructed.load(Ordering::SeqCst), 1);
    assert!(h.sink.at(Severity::Error).is_empty());

    let reports = h.reporter.reports();
    assert_eq!(
        statuses(&reports),
        vec![
            ServiceStatus::StartPending,
            ServiceStatus::Running,
            ServiceStatus::StopPending,
            ServiceStatus::Stopped,
        ]
    );
    assert_eq!(reports[2].wait_hint, Duration::from_millis(1000));
    assert_eq!(reports[3].exit_code, 0);
}

#[test]
fn shutdown_with_stuck_drain_still_exits_at_deadline() {
    let rt = runtime();
    let mut h = harness(
        &rt,
        ScriptedServer::never_draining(),
        Duration::from_millis(100),
    );
    h.requests.send(ControlRequest::Shutdown).unwrap();

    let started = Instant::now();
    let outcome = h.controller.execute();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(100), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(1000), "hung for {:?}", elapsed);

    assert!(matches!(outcome, ControllerOutcome::Degraded { .. }));
    assert_eq!(h.listener.check(), Some(StopReason::Shutdown));

    let errors = h.sink.at(Severity::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("deadline"), "unexpected error line: {}", errors[0]);

    let reports = h.reporter.reports();
    assert_eq!(reports.last().map(|r| r.status), Some(ServiceStatus::Stopped));
    assert_eq!(reports.last().map(|r| r.exit_code), Some(0));
}

#[test]
fn unknown_code_is_logged_once_then_stop_proceeds() {
    let rt = runtime();
    let mut h = harness(
        &rt,
        ScriptedServer::draining_in(Duration::from_millis(10)),
        Duration::from_millis(1000),
    );
    h.requests.send(ControlRequest::Other(7)).unwrap();
    h.requests.send(ControlRequest::Stop).unwrap();

    let outcome = h.controller.execute();

    let mentions = h.sink.containing("#7");
    assert_eq!(mentions, vec!["unexpected control request #7".to_string()]);
    assert_eq!(outcome, ControllerOutcome::Clean);
    assert_eq!(h.listener.check(), Some(StopReason::Stop));
    assert_eq!(
        statuses(&h.reporter.reports()),
        vec![
            ServiceStatus::StartPending,
            ServiceStatus::Running,
            ServiceStatus::StopPending,
            ServiceStatus::Stopped,
        ]
    );
}

#[test]
fn only_the_first_stop_is_handled() {
    let rt = runtime();
    let mut h = harness(
        &rt,
        ScriptedServer::draining_in(Duration::from_millis(10)),
        Duration::from_millis(1000),
    );
    h.requests.send(ControlRequest::Stop).unwrap();
    h.requests.send(ControlRequest::Shutdown).unwrap();
    h.requests.send(ControlRequest::Stop).unwrap();

    h.controller.execute();

    assert_eq!(h.instructed.load(Ordering::SeqCst), 1);
    assert_eq!(h.listener.check(), Some(StopReason::Stop));
    let stop_pending = h
        .reporter
        .reports()
        .iter()
        .filter(|r| r.status == ServiceStatus::StopPending)
        .count();
    assert_eq!(stop_pending, 1);
}

#[test]
fn exit_policy_turns_timeout_into_failure() {
    let rt = runtime();
    let h = harness(
        &rt,
        ScriptedServer::never_draining(),
        Duration::from_millis(50),
    );
    h.requests.send(ControlRequest::Stop).unwrap();

    let outcome = h.controller.with_policy(ShutdownErrorPolicy::Exit).execute();

    assert!(matches!(outcome, ControllerOutcome::Failed { .. }));
    let last = h.reporter.reports().pop().unwrap();
    assert_eq!(last.status, ServiceStatus::Stopped);
    assert_eq!(last.exit_code, 1);
}

#[test]
fn closed_request_channel_stops_the_service() {
    let rt = runtime();
    let mut h = harness(
        &rt,
        ScriptedServer::draining_in(Duration::from_millis(10)),
        Duration::from_millis(1000),
    );
    drop(h.requests);

    let outcome = h.controller.execute();

    assert_eq!(outcome, ControllerOutcome::Clean);
    assert_eq!(h.listener.check(), Some(StopReason::Disconnected));
    assert_eq!(h.sink.containing("channel closed").len(), 1);
}

#[test]
fn completion_signal_carries_the_outcome() {
    let rt = runtime();
    let mut h = harness(
        &rt,
        ScriptedServer::never_draining(),
        Duration::from_millis(20),
    );
    h.requests.send(ControlRequest::Stop).unwrap();

    let outcome = h.controller.execute();

    let observed = rt.block_on(h.completion.wait());
    assert_eq!(observed, Some(outcome));
}

#[test]
fn missing_listener_does_not_block_the_loop() {
    let rt = runtime();
    let h = harness(
        &rt,
        ScriptedServer::draining_in(Duration::from_millis(10)),
        Duration::from_millis(1000),
    );
    drop(h.listener);
    h.requests.send(ControlRequest::Stop).unwrap();

    let outcome = h.controller.execute();

    assert_eq!(outcome, ControllerOutcome::Clean);
    assert_eq!(h.sink.containing("listener already gone").len(), 1);
}

#[test]
fn main_flow_is_signalled_before_the_drain_starts() {
    let rt = runtime();
    let (requests, rx) = mpsc::channel();
    let (trigger, listener) = shutdown_signal();
    let server = ListenerCheckingServer::new(listener);
    let seen = server.seen();

    let coordinator = ServerShutdownCoordinator::new(
        Arc::new(server),
        rt.handle().clone(),
        Duration::from_secs(1),
    );
    let controller = ServiceController::new(RecordingReporter::default(), rx, trigger, coordinator)
        .with_log_sink(Arc::new(RecordingSink::default()));

    requests.send(ControlRequest::Stop).unwrap();
    assert_eq!(controller.execute(), ControllerOutcome::Clean);

    assert_eq!(*seen.lock().unwrap(), Some(Some(StopReason::Stop)));
}

#[test]
fn failing_status_reports_do_not_stop_the_loop() {
    let rt = runtime();
    let (requests, rx) = mpsc::channel();
    let (trigger, mut listener) = shutdown_signal();
    let reporter = FailingReporter::default();
    let sink = Arc::new(RecordingSink::default());

    let coordinator = ServerShutdownCoordinator::new(
        Arc::new(ScriptedServer::draining_in(Duration::from_millis(10))),
        rt.handle().clone(),
        Duration::from_secs(1),
    );
    let controller = ServiceController::new(reporter.clone(), rx, trigger, coordinator)
        .with_log_sink(sink.clone());

    requests.send(ControlRequest::Interrogate).unwrap();
    requests.send(ControlRequest::Stop).unwrap();
    let outcome = controller.execute();

    assert_eq!(outcome, ControllerOutcome::Clean);
    assert_eq!(listener.check(), Some(StopReason::Stop));
    assert_eq!(
        reporter.attempted(),
        vec![
            ServiceStatus::StartPending,
            ServiceStatus::Running,
            ServiceStatus::Running,
            ServiceStatus::StopPending,
            ServiceStatus::Stopped,
        ]
    );
    assert_eq!(sink.containing("Status report failed").len(), 5);
}
