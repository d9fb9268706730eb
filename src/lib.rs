//! Run an HTTP server as an OS-managed service.
//!
//! ```text
//!   Service manager thread                    Main thread (tokio runtime)
//!   ──────────────────────                    ───────────────────────────
//!   host (SCM or console signals)             startup::run
//!     │ ControlRequest                          │ bind listener, spawn HttpServer
//!     ▼                                         │
//!   ServiceController ──── ShutdownSignal ────▶ │ wait for stop request
//!     │ StatusReport                            │
//!     │ ServerShutdownCoordinator ── drain ───▶ HttpServer (ServerHandle)
//!     │                                         │
//!     └──────────── CompletionSignal ─────────▶ │ wait for loop exit, tear down
//! ```

pub mod cli;
pub mod config;
pub mod host;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::ShellConfig;
pub use http::HttpServer;
pub use lifecycle::{ServiceController, ServerShutdownCoordinator};
