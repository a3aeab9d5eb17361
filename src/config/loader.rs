//! Configuration file loader.

use super::error::{ConfigError, ConfigResult};
use super::types::ServerConfig;
use super::validation::{BasicValidator, PortConflictValidator, Validator};
use std::path::Path;
use tracing::warn;

/// Configuration loader with validation support.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Validators to run on loaded configuration.
    validators: Vec<Box<dyn Validator>>,
}

impl ConfigLoader {
    /// Create a loader without validators.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loader with the built-in validators registered.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new()
            .with_validator(BasicValidator::new())
            .with_validator(PortConflictValidator::new())
    }

    /// Add a validator to the loader.
    #[must_use]
    pub fn with_validator<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Box::new(validator));
        self
    }

    /// Load configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, cannot be read, is not
    /// valid TOML, or fails validation.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> ConfigResult<ServerConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        self.load_str(&content)
    }

    /// Load configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or validation fails.
    pub fn load_str(&self, content: &str) -> ConfigResult<ServerConfig> {
        let config: ServerConfig = toml::from_str(content)?;
        self.validate(&config)?;
        Ok(config)
    }

    /// Run all registered validators. Warnings are logged, errors abort.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] listing every failed check.
    pub fn validate(&self, config: &ServerConfig) -> ConfigResult<()> {
        for validator in &self.validators {
            let result = validator.validate(config);
            for warning in result.warnings() {
                warn!(field = %warning.field, "{}", warning.message);
            }
            if !result.is_valid() {
                let errors: Vec<String> = result
                    .errors()
                    .iter()
                    .filter(|e| e.severity == super::ValidationSeverity::Error)
                    .map(|e| format!("{}: {}", e.field, e.message))
                    .collect();
                return Err(ConfigError::ValidationError(errors.join("; ")));
            }
        }
        Ok(())
    }

    /// Load configuration or return default if file doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default<P: AsRef<Path>>(&self, path: P) -> ConfigResult<ServerConfig> {
        let path = path.as_ref();
        if path.exists() {
            self.load(path)
        } else {
            Ok(ServerConfig::default())
        }
    }

    /// Save configuration to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn save<P: AsRef<Path>>(&self, config: &ServerConfig, path: P) -> ConfigResult<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(config)?;
        std::fs::write(path, content).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(())
    }
}
