//! Service lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! Service manager thread (controller.rs):
//!     report StartPending → Running
//!     → ControlRequest loop
//!     → Stop/Shutdown: fire ShutdownSignal (signal.rs)
//!                      report StopPending
//!                      drain server within deadline (shutdown.rs)
//!                      report Stopped, complete CompletionSignal
//!
//! Main thread (startup.rs):
//!     bind listener → spawn server → launch host
//!     → wait on ShutdownSignal → wait on CompletionSignal → tear down
//! ```
//!
//! # Design Decisions
//! - All cross-thread coordination is channel-based
//! - Status only moves forward: StartPending → Running → StopPending → Stopped
//! - Shutdown has a deadline: the loop reaches Stopped even if drain stalls

pub mod controller;
pub mod shutdown;
pub mod signal;
pub mod startup;
pub mod status;

pub use controller::{ControllerOutcome, ServiceController, StatusReporter};
pub use shutdown::{GracefulServer, ServerShutdownCoordinator, ShutdownError, ShutdownErrorPolicy};
pub use signal::{completion_signal, shutdown_signal};
pub use status::{ControlRequest, ServiceStatus, StatusReport, StopReason};
