//! WebSocket error types.

use std::fmt;
use std::io;

/// Result type for WebSocket operations.
pub type WebSocketResult<T> = Result<T, WebSocketError>;

/// Errors that can occur during upgrade and session handling.
#[derive(Debug)]
pub enum WebSocketError {
    /// I/O error.
    Io(io::Error),

    /// Request is not a WebSocket upgrade.
    InvalidUpgrade(String),

    /// `Sec-WebSocket-Key` header missing.
    MissingKey,

    /// Role segment is neither `host` nor `viewer`.
    InvalidRole(String),

    /// Upgrade path carries no room id.
    MissingRoomId,

    /// Writing the 101 response failed.
    HandshakeWrite(io::Error),

    /// Protocol error.
    Protocol(String),

    /// Connection closed.
    ConnectionClosed,

    /// Tungstenite error.
    Tungstenite(tokio_tungstenite::tungstenite::Error),
}

impl fmt::Display for WebSocketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::InvalidUpgrade(msg) => write!(f, "Invalid upgrade request: {msg}"),
            Self::MissingKey => write!(f, "Missing Sec-WebSocket-Key"),
            Self::InvalidRole(role) => write!(f, "Invalid role: {role}"),
            Self::MissingRoomId => write!(f, "Missing room id"),
            Self::HandshakeWrite(e) => write!(f, "Failed to write handshake: {e}"),
            Self::Protocol(msg) => write!(f, "Protocol error: {msg}"),
            Self::ConnectionClosed => write!(f, "Connection closed"),
            Self::Tungstenite(e) => write!(f, "WebSocket error: {e}"),
        }
    }
}

impl std::error::Error for WebSocketError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) | Self::HandshakeWrite(e) => Some(e),
            Self::Tungstenite(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WebSocketError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for WebSocketError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Tungstenite(e)
    }
}
