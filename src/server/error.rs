//! Server lifecycle errors.

use crate::config::ConfigError;
use std::io;
use std::net::SocketAddr;
use thiserror::Error;

/// Errors raised while starting or stopping the server.
///
/// Per-connection failures never surface here; they are logged and the
/// connection is dropped.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A listener could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The configured host/port does not form a socket address.
    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    /// Operation not allowed in the current state.
    #[error("Invalid state: {current}, expected {expected}")]
    InvalidState {
        /// Current status.
        current: String,
        /// Expected status.
        expected: String,
    },

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_error_display() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:9001".parse().unwrap(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "in use"),
        };
        assert_eq!(err.to_string(), "Failed to bind 127.0.0.1:9001: in use");
    }

    #[test]
    fn test_invalid_state_display() {
        let err = ServerError::InvalidState {
            current: "stopped".to_string(),
            expected: "running".to_string(),
        };
        assert!(err.to_string().contains("expected running"));
    }
}
