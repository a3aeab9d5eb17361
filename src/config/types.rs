//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Root configuration structure for the signaling server.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener binding configuration.
    pub server: ListenerSection,

    /// Request limits and timeouts.
    pub limits: LimitsConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Listener section configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ListenerSection {
    /// Bind address shared by all listeners.
    pub host: String,

    /// Port for HTTP requests and in-band WebSocket upgrades.
    pub port: u16,

    /// Port for the raw WebSocket listener (explicit handshake). Disabled when unset.
    pub websocket_port: Option<u16>,
}

impl Default for ListenerSection {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9001,
            websocket_port: None,
        }
    }
}

impl ListenerSection {
    /// Socket address of the HTTP listener.
    pub fn http_addr(&self) -> Option<SocketAddr> {
        Self::socket_addr(&self.host, self.port)
    }

    /// Socket address of the raw WebSocket listener, if enabled.
    pub fn websocket_addr(&self) -> Option<SocketAddr> {
        self.websocket_port
            .and_then(|port| Self::socket_addr(&self.host, port))
    }

    fn socket_addr(host: &str, port: u16) -> Option<SocketAddr> {
        host.parse::<IpAddr>()
            .ok()
            .map(|ip| SocketAddr::new(ip, port))
    }
}

/// Request limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum bytes buffered for a single HTTP request.
    pub max_request_size: usize,

    /// Timeout for each read on a raw HTTP socket.
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,

    /// Maximum length of `post_id` / `host_user_id` on room creation.
    pub max_field_length: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_size: 16 * 1024,
            read_timeout: Duration::from_secs(30),
            max_field_length: 256,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: LogLevel,

    /// Log format (json, pretty, compact).
    pub format: LogFormat,
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level (most verbose).
    Trace,
    /// Debug level.
    Debug,
    /// Info level (default).
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level (least verbose).
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Log format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format (machine-readable).
    Json,
    /// Pretty multi-line format (default).
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.server.websocket_port, None);
        assert_eq!(config.limits.max_request_size, 16384);
        assert_eq!(config.limits.read_timeout, Duration::from_secs(30));
        assert_eq!(config.logging.level, LogLevel::Info);
    }

    #[test]
    fn test_parse_empty_config() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.server, ListenerSection::default());
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [server]
            host = "127.0.0.1"
            port = 8080
            websocket_port = 8081

            [limits]
            max_request_size = 4096
            read_timeout = "5s"
            max_field_length = 64

            [logging]
            level = "debug"
            format = "json"
        "#;

        let config: ServerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.websocket_port, Some(8081));
        assert_eq!(config.limits.max_request_size, 4096);
        assert_eq!(config.limits.read_timeout, Duration::from_secs(5));
        assert_eq!(config.limits.max_field_length, 64);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_listener_addrs() {
        let section = ListenerSection {
            host: "127.0.0.1".to_string(),
            port: 9001,
            websocket_port: Some(9002),
        };
        assert_eq!(
            section.http_addr(),
            Some("127.0.0.1:9001".parse().unwrap())
        );
        assert_eq!(
            section.websocket_addr(),
            Some("127.0.0.1:9002".parse().unwrap())
        );

        let bad = ListenerSection {
            host: "not-an-ip".to_string(),
            ..ListenerSection::default()
        };
        assert!(bad.http_addr().is_none());
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("WARN".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert_eq!("warning".parse::<LogLevel>(), Ok(LogLevel::Warn));
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
