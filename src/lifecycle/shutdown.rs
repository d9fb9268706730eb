//! Bounded graceful shutdown of the network server.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::runtime::Handle;

/// How long orderly shutdown may take before it is abandoned.
pub const DEFAULT_SHUTDOWN_DEADLINE: Duration = Duration::from_millis(1000);

/// What happens to the process when shutdown fails or times out.
pub const DEFAULT_SHUTDOWN_ERROR_POLICY: ShutdownErrorPolicy = ShutdownErrorPolicy::Log;

/// Policy applied when the server does not shut down cleanly.
///
/// The error is logged either way; `Exit` additionally makes the process
/// exit non-zero once the service manager has seen `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownErrorPolicy {
    #[default]
    Log,
    Exit,
}

/// Errors reported by a graceful shutdown attempt.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// Drain did not finish in time.
    #[error("shutdown deadline of {deadline:?} exceeded{}", in_flight_suffix(.in_flight))]
    DeadlineExceeded {
        deadline: Duration,
        in_flight: Option<u64>,
    },

    /// The server task is gone without reporting a result.
    #[error("server exited without reporting shutdown")]
    ServerGone,

    /// The server failed while draining.
    #[error("server failed while draining: {0}")]
    Server(String),
}

fn in_flight_suffix(in_flight: &Option<u64>) -> String {
    match in_flight {
        Some(n) => format!(" with {} request(s) in flight", n),
        None => String::new(),
    }
}

/// A network server that can be told to stop.
pub trait GracefulServer: Send + Sync {
    /// Stop accepting new connections.
    ///
    /// The instruction takes effect when this is called; the returned future
    /// resolves once in-flight work has drained.
    fn shutdown(&self) -> BoxFuture<'static, Result<(), ShutdownError>>;

    /// Number of requests currently being served, if tracked.
    fn in_flight(&self) -> Option<u64> {
        None
    }
}

/// Drives a [`GracefulServer`] through shutdown, bounded by a deadline.
#[derive(Clone)]
pub struct ServerShutdownCoordinator {
    server: Arc<dyn GracefulServer>,
    runtime: Handle,
    deadline: Duration,
}

impl std::fmt::Debug for ServerShutdownCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerShutdownCoordinator")
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl ServerShutdownCoordinator {
    /// `runtime` must be the runtime the server's drain future needs (timers, IO).
    pub fn new(server: Arc<dyn GracefulServer>, runtime: Handle, deadline: Duration) -> Self {
        Self {
            server,
            runtime,
            deadline,
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Instruct the server to stop and block until it drains or the deadline passes.
    ///
    /// Must be called from a thread that is not driving an async runtime,
    /// such as the service manager's callback thread.
    pub fn shutdown(&self) -> Result<(), ShutdownError> {
        self.runtime.block_on(self.drain())
    }

    /// Async form of [`shutdown`](Self::shutdown).
    pub async fn drain(&self) -> Result<(), ShutdownError> {
        let drained = self.server.shutdown();
        tracing::debug!(deadline = ?self.deadline, "Server instructed to stop, draining");

        match tokio::time::timeout(self.deadline, drained).await {
            Ok(result) => result,
            Err(_) => Err(ShutdownError::DeadlineExceeded {
                deadline: self.deadline,
                in_flight: self.server.in_flight(),
            }),
        }
    }
}
