//! Configuration validation.
//!
//! Serde handles syntax; this checks value ranges and cross-field
//! requirements. All errors are collected, not just the first.

use std::net::SocketAddr;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.trim().is_empty() {
        errors.push(ValidationError::new("listener.bind_address", "must not be empty"));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be greater than 0"));
    }
    // Anything smaller cannot hold a request line.
    if config.listener.max_request_bytes < 16 {
        errors.push(ValidationError::new("listener.max_request_bytes", "must be at least 16"));
    }

    let timeouts = &config.timeouts;
    for (field, value) in [
        ("timeouts.connect_secs", timeouts.connect_secs),
        ("timeouts.read_secs", timeouts.read_secs),
        ("timeouts.client_read_secs", timeouts.client_read_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than 0"));
        }
    }

    if config.storage.database_url.trim().is_empty() {
        errors.push(ValidationError::new("storage.database_url", "must not be empty"));
    }
    if config.storage.recent_log_capacity == 0 {
        errors.push(ValidationError::new("storage.recent_log_capacity", "must be greater than 0"));
    }

    for domain in &config.blocklist.domains {
        if domain.trim().is_empty() {
            errors.push(ValidationError::new("blocklist.domains", "contains an empty entry"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.admin.control_enabled && config.admin.control_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "admin.control_address",
            format!("'{}' is not a socket address", config.admin.control_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
