//! Configuration validation.
//!
//! # Design Decisions
//! - Serde handles syntax; this module checks semantics
//! - Returns all validation errors, not just the first

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ToolkitConfig;

/// One semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

/// Check a deserialized configuration.
pub fn validate_config(config: &ToolkitConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.listener.bind_address.parse::<SocketAddr>() {
        errors.push(ValidationError {
            field: "listener.bind_address",
            message: format!("invalid socket address '{}': {}", config.listener.bind_address, e),
        });
    }

    for (field, value) in [
        ("timeouts.request_ms", config.timeouts.request_ms),
        ("timeouts.query_ms", config.timeouts.query_ms),
        ("timeouts.server_secs", config.timeouts.server_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError {
                field,
                message: "must be greater than zero".to_string(),
            });
        }
    }

    if config.logging.level.trim().is_empty() {
        errors.push(ValidationError {
            field: "logging.level",
            message: "must not be empty".to_string(),
        });
    }

    if config.metrics.enabled {
        if let Err(e) = config.metrics.address.parse::<SocketAddr>() {
            errors.push(ValidationError {
                field: "metrics.address",
                message: format!("invalid socket address '{}': {}", config.metrics.address, e),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
