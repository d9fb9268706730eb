//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (deadline > 0, address parses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ShellConfig → Result<(), Vec<ValidationError>>

use std::net::SocketAddr;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::ShellConfig;

/// Longest drain we allow; the Windows SCM gives up on a stopping
/// service well before this.
pub const MAX_SHUTDOWN_DEADLINE_MS: u64 = 120_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("service.name must not be empty")]
    EmptyServiceName,

    #[error("service.shutdown_deadline_ms must be between 1 and {max}, got {value}")]
    DeadlineOutOfRange { value: u64, max: u64 },

    #[error("listener.bind_address '{0}' is not a socket address")]
    BadBindAddress(String),

    #[error("listener.request_timeout_secs must be greater than 0")]
    ZeroRequestTimeout,

    #[error("observability.log_level '{0}' is not a valid filter")]
    BadLogLevel(String),
}

pub fn validate_config(config: &ShellConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::EmptyServiceName);
    }

    let deadline = config.service.shutdown_deadline_ms;
    if deadline == 0 || deadline > MAX_SHUTDOWN_DEADLINE_MS {
        errors.push(ValidationError::DeadlineOutOfRange {
            value: deadline,
            max: MAX_SHUTDOWN_DEADLINE_MS,
        });
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BadBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    if EnvFilter::try_new(&config.observability.log_level).is_err() {
        errors.push(ValidationError::BadLogLevel(
            config.observability.log_level.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
