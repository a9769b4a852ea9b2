//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (backlog > 0, buffer sizes ordered)
//! - Check that addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ServerConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("listener.bind_address `{0}` is not a socket address")]
    InvalidBindAddress(String),
    #[error("listener.backlog must be greater than zero")]
    ZeroBacklog,
    #[error("buffer.initial_size must be greater than zero")]
    ZeroInitialBufferSize,
    #[error("buffer.max_size ({max}) is smaller than buffer.initial_size ({initial})")]
    MaxBufferBelowInitial { initial: usize, max: usize },
    #[error("shutdown.drain_poll_interval_ms must be greater than zero")]
    ZeroDrainInterval,
    #[error("observability.log_level `{0}` is not a log level")]
    InvalidLogLevel(String),
    #[error("observability.metrics_address `{0}` is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Check a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.backlog == 0 {
        errors.push(ValidationError::ZeroBacklog);
    }

    if config.buffer.initial_size == 0 {
        errors.push(ValidationError::ZeroInitialBufferSize);
    }
    if config.buffer.max_size < config.buffer.initial_size {
        errors.push(ValidationError::MaxBufferBelowInitial {
            initial: config.buffer.initial_size,
            max: config.buffer.max_size,
        });
    }

    if config.shutdown.drain_poll_interval_ms == 0 {
        errors.push(ValidationError::ZeroDrainInterval);
    }

    if config.observability.log_level.parse::<tracing::Level>().is_err() {
        errors.push(ValidationError::InvalidLogLevel(
            config.observability.log_level.clone(),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
