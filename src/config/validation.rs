//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (addresses parse)
//! - Check that paths and specifiers are non-empty
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SsrConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::SsrConfig;

/// A single semantic problem in the configuration.
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

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check the configuration for semantic errors.
pub fn validate_config(config: &SsrConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !is_bind_address(&config.server.bind_address) {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a host:port address", config.server.bind_address),
        ));
    }

    if config.app.index.as_os_str().is_empty() {
        errors.push(ValidationError::new("app.index", "must not be empty"));
    }

    if config.app.mode.is_dev() {
        if config.app.dev_entry.trim().is_empty() {
            errors.push(ValidationError::new("app.dev_entry", "must not be empty"));
        }
        if !config.dev.client_path.starts_with('/') {
            errors.push(ValidationError::new(
                "dev.client_path",
                "must start with '/'",
            ));
        }
    } else {
        if config.app.dist.as_os_str().is_empty() {
            errors.push(ValidationError::new("app.dist", "must not be empty"));
        }
        if config.app.prod_entry.trim().is_empty() {
            errors.push(ValidationError::new("app.prod_entry", "must not be empty"));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
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

/// `ip:port` or `host:port`; host names are resolved at bind time.
fn is_bind_address(address: &str) -> bool {
    if address.parse::<SocketAddr>().is_ok() {
        return true;
    }
    match address.rsplit_once(':') {
        Some((host, port)) => {
            !host.is_empty()
                && !host.contains(|c: char| c.is_whitespace() || c == '/')
                && port.parse::<u16>().is_ok()
        }
        None => false,
    }
}
