//! Configuration validation.

use super::types::ServerConfig;
use std::net::IpAddr;

/// A single validation issue.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// Error message.
    pub message: String,
    /// Severity level.
    pub severity: ValidationSeverity,
}

impl ValidationError {
    /// Create a new error.
    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Error,
        }
    }

    /// Create a new warning.
    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            severity: ValidationSeverity::Warning,
        }
    }
}

/// Severity of validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationSeverity {
    /// Configuration is unusable.
    Error,
    /// Configuration works but is probably not what was intended.
    Warning,
}

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// Create a new empty (valid) result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an issue to the result.
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Check if the validation passed (no errors, warnings allowed).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self
            .errors
            .iter()
            .any(|e| e.severity == ValidationSeverity::Error)
    }

    /// Get all validation issues.
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Get only warnings.
    #[must_use]
    pub fn warnings(&self) -> Vec<&ValidationError> {
        self.errors
            .iter()
            .filter(|e| e.severity == ValidationSeverity::Warning)
            .collect()
    }

    /// Merge another validation result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }
}

/// Trait for configuration validators.
pub trait Validator: std::fmt::Debug + Send + Sync {
    /// Validate a configuration and return any issues.
    fn validate(&self, config: &ServerConfig) -> ValidationResult;
}

/// Sanity checks on addresses and limits.
#[derive(Debug, Default)]
pub struct BasicValidator;

impl BasicValidator {
    /// Create a new basic validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for BasicValidator {
    fn validate(&self, config: &ServerConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if config.server.host.parse::<IpAddr>().is_err() {
            result.add_error(ValidationError::error(
                "server.host",
                format!("'{}' is not an IP address", config.server.host),
            ));
        }

        if config.limits.max_request_size == 0 {
            result.add_error(ValidationError::error(
                "limits.max_request_size",
                "Maximum request size cannot be 0",
            ));
        } else if config.limits.max_request_size < 1024 {
            result.add_error(ValidationError::warning(
                "limits.max_request_size",
                "Maximum request size below 1 KiB will truncate most upgrade requests",
            ));
        }

        if config.limits.read_timeout.is_zero() {
            result.add_error(ValidationError::error(
                "limits.read_timeout",
                "Read timeout cannot be 0",
            ));
        }

        if config.limits.max_field_length == 0 {
            result.add_error(ValidationError::error(
                "limits.max_field_length",
                "Maximum field length cannot be 0",
            ));
        }

        result
    }
}

/// Rejects an HTTP port and WebSocket port that collide.
#[derive(Debug, Default)]
pub struct PortConflictValidator;

impl PortConflictValidator {
    /// Create a new port conflict validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Validator for PortConflictValidator {
    fn validate(&self, config: &ServerConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if let Some(ws_port) = config.server.websocket_port {
            // Port 0 asks the OS for an ephemeral port, so two zeros never collide.
            if ws_port != 0 && ws_port == config.server.port {
                result.add_error(ValidationError::error(
                    "server.websocket_port",
                    format!("Port {ws_port} conflicts with server.port"),
                ));
            }
        }

        result
    }
}
