//! Windows Service Control Manager host.
//!
//! # Responsibilities
//! - Hand the process to the SCM dispatcher
//! - Translate SCM controls into `ControlRequest`s
//! - Translate `StatusReport`s into `SetServiceStatus` calls
//!
//! # Design Decisions
//! - The dispatcher entry point is a plain `extern "system"` function, so the
//!   context crosses into it through a single take-once slot
//! - Error 1063 from the dispatcher means "not started by the SCM" and
//!   selects the console host without logging an error

use std::ffi::OsString;
use std::sync::mpsc;
use std::sync::{Mutex, MutexGuard};

use windows_service::service::{
    ServiceControl, ServiceControlAccept, ServiceExitCode, ServiceState,
    ServiceStatus as ScmStatus, ServiceType,
};
use windows_service::service_control_handler::{
    self, ServiceControlHandlerResult, ServiceStatusHandle,
};
use windows_service::{define_windows_service, service_dispatcher};

use crate::host::{console, HostError, ServiceContext};
use crate::lifecycle::controller::{ReportError, StatusReporter};
use crate::lifecycle::status::{AcceptedControls, ControlRequest, ServiceStatus, StatusReport};

/// ERROR_FAILED_SERVICE_CONTROLLER_CONNECT
const NOT_STARTED_BY_SCM: i32 = 1063;

static PENDING_CONTEXT: Mutex<Option<ServiceContext>> = Mutex::new(None);

fn pending_context() -> MutexGuard<'static, Option<ServiceContext>> {
    PENDING_CONTEXT
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

define_windows_service!(ffi_service_main, service_main);

pub(crate) fn launch(ctx: ServiceContext) -> Result<(), HostError> {
    let name = ctx.name.clone();
    *pending_context() = Some(ctx);

    std::thread::Builder::new()
        .name("service-dispatcher".into())
        .spawn(move || {
            match service_dispatcher::start(&name, ffi_service_main) {
                Ok(()) => tracing::info!(service = %name, "Service dispatcher returned"),
                Err(e) => {
                    if is_not_started_by_scm(&e) {
                        tracing::info!(
                            "Not started by the service manager, running interactively"
                        );
                    } else {
                        tracing::error!(
                            error = %e,
                            "Failed to start service, running interactively"
                        );
                    }
                    // service_main never ran, so the context is still parked.
                    if let Some(ctx) = pending_context().take() {
                        if let Err(e) = console::launch(ctx) {
                            tracing::error!(error = %e, "Failed to start console host");
                        }
                    }
                }
            }
        })
        .map_err(|source| HostError::Spawn {
            thread: "service-dispatcher",
            source,
        })?;
    Ok(())
}

fn is_not_started_by_scm(error: &windows_service::Error) -> bool {
    match error {
        windows_service::Error::Winapi(io) => io.raw_os_error() == Some(NOT_STARTED_BY_SCM),
        _ => false,
    }
}

fn service_main(_arguments: Vec<OsString>) {
    let Some(ctx) = pending_context().take() else {
        tracing::error!("Service started without a pending context");
        return;
    };
    tracing::info!(service = %ctx.name, "Running as a Windows service");

    let (tx, rx) = mpsc::channel();
    let handler = move |control: ServiceControl| -> ServiceControlHandlerResult {
        let (request, result) = match control {
            ServiceControl::Interrogate => {
                (ControlRequest::Interrogate, ServiceControlHandlerResult::NoError)
            }
            ServiceControl::Stop => (ControlRequest::Stop, ServiceControlHandlerResult::NoError),
            ServiceControl::Shutdown => {
                (ControlRequest::Shutdown, ServiceControlHandlerResult::NoError)
            }
            other => (
                ControlRequest::Other(other.raw_service_control_type()),
                ServiceControlHandlerResult::NotImplemented,
            ),
        };
        let _ = tx.send(request);
        result
    };

    let status_handle = match service_control_handler::register(&ctx.name, handler) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(
                error = %e,
                "Failed to register control handler, running interactively"
            );
            if let Err(e) = console::launch(ctx) {
                tracing::error!(error = %e, "Failed to start console host");
            }
            return;
        }
    };

    let reporter = ScmReporter {
        handle: status_handle,
        checkpoint: 0,
    };
    ctx.into_controller(reporter, rx).execute();
}

/// Reports status to the SCM.
struct ScmReporter {
    handle: ServiceStatusHandle,
    checkpoint: u32,
}

impl StatusReporter for ScmReporter {
    fn report(&mut self, report: StatusReport) -> Result<(), ReportError> {
        let pending = matches!(
            report.status,
            ServiceStatus::StartPending | ServiceStatus::StopPending
        );
        self.checkpoint = if pending { self.checkpoint + 1 } else { 0 };

        let exit_code = if report.exit_code == 0 {
            ServiceExitCode::Win32(0)
        } else {
            ServiceExitCode::ServiceSpecific(report.exit_code)
        };

        self.handle
            .set_service_status(ScmStatus {
                service_type: ServiceType::OWN_PROCESS,
                current_state: scm_state(report.status),
                controls_accepted: scm_accepts(report.accepts),
                exit_code,
                checkpoint: self.checkpoint,
                wait_hint: report.wait_hint,
                process_id: None,
            })
            .map_err(|e| ReportError {
                status: report.status,
                reason: e.to_string(),
            })
    }
}

fn scm_state(status: ServiceStatus) -> ServiceState {
    match status {
        ServiceStatus::StartPending => ServiceState::StartPending,
        ServiceStatus::Running => ServiceState::Running,
        ServiceStatus::StopPending => ServiceState::StopPending,
        ServiceStatus::Stopped => ServiceState::Stopped,
    }
}

fn scm_accepts(accepts: AcceptedControls) -> ServiceControlAccept {
    let mut flags = ServiceControlAccept::empty();
    if accepts.stop {
        flags |= ServiceControlAccept::STOP;
    }
    if accepts.shutdown {
        flags |= ServiceControlAccept::SHUTDOWN;
    }
    flags
}
