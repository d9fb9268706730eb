//! Service host: connects the control loop to whatever manages the process.
//!
//! # Data Flow
//! ```text
//! Windows, started by the SCM (windows.rs):
//!     service_dispatcher → service_main → control handler
//!     → ControlRequest channel → ServiceController
//!     → StatusReport → SetServiceStatus
//!
//! Anywhere else, or when SCM registration fails (console.rs):
//!     Ctrl-C / SIGTERM / SIGHUP → ControlRequest channel → ServiceController
//!     → StatusReport → log line
//! ```
//!
//! # Design Decisions
//! - The controller always runs on its own thread, never on a runtime worker
//! - Failing to register with the service manager is logged, then the
//!   process continues interactively

pub mod console;
#[cfg(windows)]
pub mod windows;

use std::sync::mpsc::Receiver;
use std::sync::Arc;

use thiserror::Error;
use tokio::runtime::Handle;

use crate::lifecycle::controller::{ServiceController, StatusReporter};
use crate::lifecycle::shutdown::{ServerShutdownCoordinator, ShutdownErrorPolicy};
use crate::lifecycle::signal::{CompletionSignal, ShutdownTrigger};
use crate::lifecycle::status::ControlRequest;
use crate::observability::sink::LogSink;

/// How to look for a service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HostMode {
    /// Register with the platform service manager if we were started by one.
    #[default]
    Auto,
    /// Skip the service manager; stop on console signals.
    Console,
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to spawn {thread} thread: {source}")]
    Spawn {
        thread: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Everything a host needs to build and run the controller.
pub struct ServiceContext {
    pub name: String,
    pub trigger: ShutdownTrigger,
    pub coordinator: ServerShutdownCoordinator,
    pub completion: CompletionSignal,
    pub policy: ShutdownErrorPolicy,
    pub sink: Arc<dyn LogSink>,
    /// Runtime used for console signal handling.
    pub runtime: Handle,
}

impl ServiceContext {
    pub fn into_controller<R: StatusReporter>(
        self,
        reporter: R,
        requests: Receiver<ControlRequest>,
    ) -> ServiceController<R> {
        ServiceController::new(reporter, requests, self.trigger, self.coordinator)
            .with_completion(self.completion)
            .with_policy(self.policy)
            .with_log_sink(self.sink)
    }
}

/// Start the controller under the selected host. Returns once it is running.
pub fn launch(ctx: ServiceContext, mode: HostMode) -> Result<(), HostError> {
    match mode {
        HostMode::Console => console::launch(ctx),
        HostMode::Auto => launch_platform(ctx),
    }
}

#[cfg(windows)]
fn launch_platform(ctx: ServiceContext) -> Result<(), HostError> {
    windows::launch(ctx)
}

#[cfg(not(windows))]
fn launch_platform(ctx: ServiceContext) -> Result<(), HostError> {
    ctx.sink
        .info("No service manager integration on this platform, running interactively");
    console::launch(ctx)
}
