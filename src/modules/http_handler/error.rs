//! Error types for the HTTP handler module.

use std::io;
use thiserror::Error;

/// Errors that can occur in HTTP handling.
///
/// Malformed requests are not errors: the parser degrades to a partial
/// [`Request`](super::Request) and routing answers 400/404.
#[derive(Debug, Error)]
pub enum HttpError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A read did not complete within the configured timeout.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Connection closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// No route found for request.
    #[error("No route found for {method} {path}")]
    NoRoute {
        /// HTTP method.
        method: String,
        /// Request path.
        path: String,
    },
}

/// Result type for HTTP operations.
pub type HttpResult<T> = Result<T, HttpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HttpError::NoRoute {
            method: "GET".to_string(),
            path: "/room/abc".to_string(),
        };
        assert_eq!(err.to_string(), "No route found for GET /room/abc");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        let http_err = HttpError::from(io_err);
        assert!(matches!(http_err, HttpError::Io(_)));
    }
}
