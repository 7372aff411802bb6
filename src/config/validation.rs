//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check that per-site commands actually receive the file name
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ManagerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::apache::control::FILE_PLACEHOLDER;
use crate::config::schema::ManagerConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// One semantic problem in a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending key, e.g. `apache.enable_command`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &ManagerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);

    if config.store.sites_dir.as_os_str().is_empty() {
        errors.push(ValidationError::new("store.sites_dir", "must not be empty"));
    }

    let apache = &config.apache;
    if apache.sites_available_dir.as_os_str().is_empty() {
        errors.push(ValidationError::new("apache.sites_available_dir", "must not be empty"));
    }
    if apache.sites_enabled_dir.as_os_str().is_empty() {
        errors.push(ValidationError::new("apache.sites_enabled_dir", "must not be empty"));
    }
    if apache.command_timeout_secs == 0 {
        errors.push(ValidationError::new("apache.command_timeout_secs", "must be greater than 0"));
    }
    for (field, command, needs_file) in [
        ("apache.enable_command", &apache.enable_command, true),
        ("apache.disable_command", &apache.disable_command, true),
        ("apache.reload_command", &apache.reload_command, false),
        ("apache.test_command", &apache.test_command, false),
    ] {
        if command.first().map_or(true, |program| program.trim().is_empty()) {
            errors.push(ValidationError::new(field, "must name a program"));
        } else if needs_file && !command.iter().any(|arg| arg.contains(FILE_PLACEHOLDER)) {
            errors.push(ValidationError::new(
                field,
                format!("must contain the {} placeholder", FILE_PLACEHOLDER),
            ));
        }
    }

    if config.scanner.timeout_ms == 0 {
        errors.push(ValidationError::new("scanner.timeout_ms", "must be greater than 0"));
    }
    if config.scanner.ports.contains(&0) {
        errors.push(ValidationError::new("scanner.ports", "port 0 cannot be probed"));
    }

    if config.api.request_timeout_secs == 0 {
        errors.push(ValidationError::new("api.request_timeout_secs", "must be greater than 0"));
    }
    if config.api.api_key.as_deref().is_some_and(|key| key.trim().is_empty()) {
        errors.push(ValidationError::new("api.api_key", "must not be blank when set"));
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level {:?}", config.observability.log_level),
        ));
    }
    if config.observability.metrics_enabled {
        check_address(
            &mut errors,
            "observability.metrics_address",
            &config.observability.metrics_address,
        );
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &str, value: &str) {
    if let Err(e) = value.parse::<SocketAddr>() {
        errors.push(ValidationError::new(field, format!("invalid address {:?}: {}", value, e)));
    }
}
