//! HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace + timeout layers)
//!     → inflight.rs (count the request while it is served)
//!     → handler (/, /health, /metrics)
//!
//! Shutdown:
//!     ServerHandle::shutdown → state Draining → stop accepting
//!     → in-flight requests finish → state Stopped
//! ```

pub mod inflight;
pub mod server;

pub use inflight::InFlightTracker;
pub use server::{HttpServer, ServerHandle, ServerState};
