//! # Configuration System
//!
//! TOML-based configuration for the signaling server: parsing, defaults and
//! validation.
//!
//! ## Example Configuration
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 9001
//! websocket_port = 9002
//!
//! [limits]
//! max_request_size = 16384
//! read_timeout = "30s"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

mod error;
mod loader;
mod types;
mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use types::{LimitsConfig, ListenerSection, LogFormat, LogLevel, LoggingConfig, ServerConfig};
pub use validation::{
    BasicValidator, PortConflictValidator, ValidationError, ValidationResult, ValidationSeverity,
    Validator,
};
