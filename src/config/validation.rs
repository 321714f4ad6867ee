//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the default render is registered
//! - Validate value ranges (sizes and timeouts > 0, address parses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is a pure function of the config and the render registry

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::ServerConfig;
use crate::render::RenderRegistry;

/// One semantic problem in a configuration.
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

/// Check `config` against value ranges and the available renders.
pub fn validate_config(
    config: &ServerConfig,
    renders: &RenderRegistry,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if renders.get(&config.render.default).is_none() {
        errors.push(ValidationError::new(
            "render.default",
            format!(
                "unknown render '{}' (available: {})",
                config.render.default,
                renders.names().join(", ")
            ),
        ));
    }

    if config.response.chunk_size == 0 {
        errors.push(ValidationError::new("response.chunk_size", "must be greater than 0"));
    }

    if config.response.channel_capacity == 0 {
        errors.push(ValidationError::new("response.channel_capacity", "must be greater than 0"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
