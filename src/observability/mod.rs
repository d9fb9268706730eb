//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (tracing subscriber: console + optional diagnostics file)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! The lifecycle core logs through:
//!     → sink.rs (LogSink capability, typed LogRecord)
//!
//! Services without a console:
//!     → diagnostics.rs (file writer + panic hook)
//! ```
//!
//! # Design Decisions
//! - Structured logging via `tracing`, JSON optional
//! - Metrics are no-ops until a recorder is installed

pub mod diagnostics;
pub mod logging;
pub mod metrics;
pub mod sink;
