//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, pool floor under ceiling)
//! - Check that addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Validate a configuration, collecting every error found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be at least 1"));
    }

    let pool = &config.pool;
    if pool.max_workers == 0 {
        errors.push(ValidationError::new("pool.max_workers", "must be at least 1"));
    }
    if let Some(min) = pool.min_workers {
        if min == 0 || min > pool.max_workers {
            errors.push(ValidationError::new(
                "pool.min_workers",
                format!("must be between 1 and max_workers ({})", pool.max_workers),
            ));
        }
    }
    if pool.extra_allocation_percent > 100 {
        errors.push(ValidationError::new("pool.extra_allocation_percent", "must not exceed 100"));
    }
    if pool.over_allocation_streak_threshold == 0 {
        errors.push(ValidationError::new(
            "pool.over_allocation_streak_threshold",
            "must be at least 1",
        ));
    }
    if pool.autoscale_interval_ms == 0 {
        errors.push(ValidationError::new("pool.autoscale_interval_ms", "must be greater than 0"));
    }
    if pool.drain_timeout_secs == 0 {
        errors.push(ValidationError::new("pool.drain_timeout_secs", "must be greater than 0"));
    }

    let bans = &config.bans;
    if bans.requests_per_source_per_second == 0 {
        errors.push(ValidationError::new(
            "bans.requests_per_source_per_second",
            "must be at least 1",
        ));
    }
    if bans.ban_duration_secs == 0 {
        errors.push(ValidationError::new("bans.ban_duration_secs", "must be greater than 0"));
    }
    if bans.propagation_interval_ms == 0 {
        errors.push(ValidationError::new("bans.propagation_interval_ms", "must be greater than 0"));
    }
    if bans.expiry_interval_secs == 0 {
        errors.push(ValidationError::new("bans.expiry_interval_secs", "must be greater than 0"));
    }

    let fetch = &config.fetch;
    if fetch.timeout_secs == 0 {
        errors.push(ValidationError::new("fetch.timeout_secs", "must be greater than 0"));
    }
    if fetch.connect_timeout_secs == 0 {
        errors.push(ValidationError::new("fetch.connect_timeout_secs", "must be greater than 0"));
    }
    if fetch.max_body_bytes == 0 {
        errors.push(ValidationError::new("fetch.max_body_bytes", "must be greater than 0"));
    }

    let session = &config.session;
    if session.deadline_secs <= fetch.timeout_secs {
        errors.push(ValidationError::new(
            "session.deadline_secs",
            format!("must exceed fetch.timeout_secs ({})", fetch.timeout_secs),
        ));
    }
    if session.max_request_body_bytes == 0 {
        errors.push(ValidationError::new(
            "session.max_request_body_bytes",
            "must be greater than 0",
        ));
    }

    let observability = &config.observability;
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
