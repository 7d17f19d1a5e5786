//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, status codes valid)
//! - Check addresses parse before any process is forked
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClusterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{ClusterConfig, RespawnPolicy};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
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

/// Check a configuration for semantic errors.
pub fn validate_config(config: &ClusterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new(
            "listener.max_connections",
            "must be greater than zero",
        ));
    }

    if config.listener.max_body_size == 0 {
        errors.push(ValidationError::new(
            "listener.max_body_size",
            "must be greater than zero",
        ));
    }

    if let Some(host) = &config.listener.hostname {
        if host.trim().is_empty() {
            errors.push(ValidationError::new("listener.hostname", "must not be empty"));
        }
    }

    if config.workers.count == Some(0) {
        errors.push(ValidationError::new("workers.count", "must be at least 1"));
    }

    if let RespawnPolicy::Backoff { base_ms, max_ms, .. } = config.workers.respawn {
        if base_ms == 0 {
            errors.push(ValidationError::new(
                "workers.respawn.base_ms",
                "must be greater than zero",
            ));
        }
        if max_ms < base_ms {
            errors.push(ValidationError::new(
                "workers.respawn.max_ms",
                format!("must be at least base_ms ({base_ms})"),
            ));
        }
    }

    let status = config.pipeline.decode_error_status;
    if !(400..=599).contains(&status) {
        errors.push(ValidationError::new(
            "pipeline.decode_error_status",
            format!("{status} is not an error status"),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "'{}' is not a socket address",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&ClusterConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = ClusterConfig::default();
        config.listener.max_connections = 0;
        config.workers.count = Some(0);
        config.pipeline.decode_error_status = 200;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.max_connections",
                "workers.count",
                "pipeline.decode_error_status"
            ]
        );
    }

    #[test]
    fn backoff_bounds_are_checked() {
        let mut config = ClusterConfig::default();
        config.workers.respawn = RespawnPolicy::Backoff {
            base_ms: 500,
            max_ms: 100,
            stable_secs: 10,
        };
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "workers.respawn.max_ms");
    }
}
