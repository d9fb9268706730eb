//! Service status and control request types.
//!
//! These are the values exchanged with the OS service manager: the manager
//! sends `ControlRequest`s, the controller answers with `StatusReport`s.

use std::fmt;
use std::time::Duration;

/// Lifecycle status reported to the service manager.
///
/// Variants are declared in lifecycle order so `Ord` expresses the
/// "never regresses" rule directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ServiceStatus {
    StartPending,
    Running,
    StopPending,
    Stopped,
}

impl ServiceStatus {
    /// Stable lowercase name, used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::StartPending => "start_pending",
            ServiceStatus::Running => "running",
            ServiceStatus::StopPending => "stop_pending",
            ServiceStatus::Stopped => "stopped",
        }
    }

    /// Numeric value for the `service_status` gauge.
    pub fn as_gauge(&self) -> f64 {
        match self {
            ServiceStatus::StartPending => 1.0,
            ServiceStatus::Running => 2.0,
            ServiceStatus::StopPending => 3.0,
            ServiceStatus::Stopped => 4.0,
        }
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controls the service advertises as meaningful to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AcceptedControls {
    pub stop: bool,
    pub shutdown: bool,
}

impl AcceptedControls {
    /// Nothing accepted (pending and terminal states).
    pub const NONE: Self = Self {
        stop: false,
        shutdown: false,
    };

    /// Stop and system shutdown.
    pub const STOP_AND_SHUTDOWN: Self = Self {
        stop: true,
        shutdown: true,
    };
}

/// A status update handed to the service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub status: ServiceStatus,
    pub accepts: AcceptedControls,
    /// Process exit code; only meaningful with `Stopped`.
    pub exit_code: u32,
    /// How long the manager should wait before considering a pending state hung.
    pub wait_hint: Duration,
}

impl StatusReport {
    pub fn start_pending() -> Self {
        Self {
            status: ServiceStatus::StartPending,
            accepts: AcceptedControls::NONE,
            exit_code: 0,
            wait_hint: Duration::ZERO,
        }
    }

    pub fn running() -> Self {
        Self {
            status: ServiceStatus::Running,
            accepts: AcceptedControls::STOP_AND_SHUTDOWN,
            exit_code: 0,
            wait_hint: Duration::ZERO,
        }
    }

    /// `StopPending`, asking the manager to wait at least `wait_hint`.
    pub fn stop_pending(wait_hint: Duration) -> Self {
        Self {
            status: ServiceStatus::StopPending,
            accepts: AcceptedControls::NONE,
            exit_code: 0,
            wait_hint,
        }
    }

    pub fn stopped(exit_code: u32) -> Self {
        Self {
            status: ServiceStatus::Stopped,
            accepts: AcceptedControls::NONE,
            exit_code,
            wait_hint: Duration::ZERO,
        }
    }
}

/// A request delivered by the service manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRequest {
    /// Report the current status again.
    Interrogate,
    /// Stop requested by an operator.
    Stop,
    /// The system is shutting down.
    Shutdown,
    /// Any control code the controller does not act on.
    Other(u32),
}

impl ControlRequest {
    /// Metric label for this request.
    pub fn kind(&self) -> &'static str {
        match self {
            ControlRequest::Interrogate => "interrogate",
            ControlRequest::Stop => "stop",
            ControlRequest::Shutdown => "shutdown",
            ControlRequest::Other(_) => "other",
        }
    }
}

/// Why the controller left its receive loop.
///
/// This is the value carried by the shutdown signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Stop,
    Shutdown,
    /// The manager dropped its end of the request channel.
    Disconnected,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Stop => write!(f, "stop"),
            StopReason::Shutdown => write!(f, "shutdown"),
            StopReason::Disconnected => write!(f, "manager disconnected"),
        }
    }
}
