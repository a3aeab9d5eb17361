//! WebSocket HTTP upgrade handling.
//!
//! Implements the server side of the RFC 6455 handshake on top of a request
//! that was already framed and parsed by the HTTP handler.

use crate::modules::http_handler::{PathPattern, Request};
use crate::modules::websocket_handler::error::{WebSocketError, WebSocketResult};
use crate::rooms::PeerRole;
use base64::Engine;
use sha1::{Digest, Sha1};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// WebSocket magic GUID for Sec-WebSocket-Accept calculation.
const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Path template for in-band upgrades.
pub const UPGRADE_PATH: &str = "/room/:room_id/:role";

/// Whether `request` asks for a WebSocket upgrade.
///
/// Requires `Upgrade`, `Connection` and `Sec-WebSocket-Key` headers (names
/// matched case-insensitively) and an `Upgrade` value containing
/// "websocket" in any case.
#[must_use]
pub fn is_websocket_upgrade(request: &Request) -> bool {
    let Some(upgrade) = request.header_ignore_case("Upgrade") else {
        return false;
    };
    request.header_ignore_case("Connection").is_some()
        && request.header_ignore_case("Sec-WebSocket-Key").is_some()
        && upgrade.to_ascii_lowercase().contains("websocket")
}

/// Compute Sec-WebSocket-Accept value from client key.
#[must_use]
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    let hash = hasher.finalize();
    base64::engine::general_purpose::STANDARD.encode(hash)
}

/// Build the `101 Switching Protocols` response. It has no body.
#[must_use]
pub fn handshake_response(key: &str) -> Vec<u8> {
    let accept = compute_accept_key(key);
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {accept}\r\n\
         \r\n"
    )
    .into_bytes()
}

/// Room and role extracted from an upgrade path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeTarget {
    /// Room the peer joins.
    pub room_id: String,
    /// Role the peer plays.
    pub role: PeerRole,
}

impl UpgradeTarget {
    /// Parse `/room/:room_id/:role`.
    pub fn from_path(path: &str) -> WebSocketResult<Self> {
        let pattern = upgrade_pattern();
        let params = pattern.match_path(path).ok_or(WebSocketError::MissingRoomId)?;

        let room_id = params
            .get("room_id")
            .filter(|id| !id.is_empty())
            .ok_or(WebSocketError::MissingRoomId)?
            .clone();
        let role = params
            .get("role")
            .map(String::as_str)
            .unwrap_or_default()
            .parse::<PeerRole>()
            .map_err(WebSocketError::InvalidRole)?;

        Ok(Self { room_id, role })
    }
}

fn upgrade_pattern() -> &'static PathPattern {
    static PATTERN: OnceLock<PathPattern> = OnceLock::new();
    PATTERN.get_or_init(|| PathPattern::compile(UPGRADE_PATH))
}

/// A socket whose HTTP phase is over.
///
/// Holding this value is the only way to reach the stream after the 101 was
/// written; the session layer consumes it.
#[derive(Debug)]
pub struct UpgradedConnection<S> {
    /// The raw transport, positioned after the handshake.
    pub stream: S,
    /// Room id from the upgrade path.
    pub room_id: String,
    /// Synthesized peer id.
    pub peer_id: String,
    /// Role from the upgrade path.
    pub role: PeerRole,
}

/// Complete an in-band upgrade.
///
/// Validates the key and the target path before anything is written, so a
/// rejected upgrade leaves the socket untouched for the caller to close.
pub async fn perform_upgrade<S>(
    mut stream: S,
    request: &Request,
) -> WebSocketResult<UpgradedConnection<S>>
where
    S: AsyncWrite + Unpin,
{
    if !is_websocket_upgrade(request) {
        return Err(WebSocketError::InvalidUpgrade(
            "missing upgrade headers".to_string(),
        ));
    }
    let key = request
        .header_ignore_case("Sec-WebSocket-Key")
        .ok_or(WebSocketError::MissingKey)?;
    let target = UpgradeTarget::from_path(request.path())?;

    let response = handshake_response(key.trim());
    stream
        .write_all(&response)
        .await
        .map_err(WebSocketError::HandshakeWrite)?;
    stream.flush().await.map_err(WebSocketError::HandshakeWrite)?;

    let peer_id = generate_peer_id(&target.room_id, target.role);
    debug!(
        peer_id = %peer_id,
        room_id = %target.room_id,
        role = %target.role,
        "Upgrade handshake written"
    );

    Ok(UpgradedConnection {
        stream,
        room_id: target.room_id,
        peer_id,
        role: target.role,
    })
}

/// Synthesize a peer id for an upgraded connection.
///
/// The suffix is a nanosecond timestamp forced to increase on every call,
/// so concurrent upgrades to the same room and role never collide.
#[must_use]
pub fn generate_peer_id(room_id: &str, role: PeerRole) -> String {
    static LAST: AtomicU64 = AtomicU64::new(0);

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        .unwrap_or(0);

    let mut prev = LAST.load(Ordering::Relaxed);
    let stamp = loop {
        let next = now.max(prev + 1);
        match LAST.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => break next,
            Err(actual) => prev = actual,
        }
    };

    format!("{room_id}_{role}_{stamp}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const UPGRADE: &[u8] = b"GET /room/r1/host HTTP/1.1\r\n\
                             Host: example.com\r\n\
                             Upgrade: websocket\r\n\
                             Connection: Upgrade\r\n\
                             Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
                             Sec-WebSocket-Version: 13\r\n\
                             \r\n";

    fn upgrade_request(path: &str) -> Request {
        Request::parse(
            format!(
                "GET {path} HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
                 Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n"
            )
            .as_bytes(),
        )
    }

    #[test]
    fn test_compute_accept_key() {
        // Test vector from RFC 6455
        let key = "dGhlIHNhbXBsZSBub25jZQ==";
        let accept = compute_accept_key(key);
        assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_detect_upgrade() {
        assert!(is_websocket_upgrade(&Request::parse(UPGRADE)));

        let mixed_case = Request::parse(
            b"GET /room/r1/host HTTP/1.1\r\nupgrade: WebSocket\r\nconnection: upgrade\r\n\
              sec-websocket-key: abc\r\n\r\n",
        );
        assert!(is_websocket_upgrade(&mixed_case));
    }

    #[test]
    fn test_detect_requires_all_headers() {
        let no_key = Request::parse(
            b"GET / HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n",
        );
        assert!(!is_websocket_upgrade(&no_key));

        let no_connection = Request::parse(
            b"GET / HTTP/1.1\r\nUpgrade: websocket\r\nSec-WebSocket-Key: abc\r\n\r\n",
        );
        assert!(!is_websocket_upgrade(&no_connection));

        let wrong_protocol = Request::parse(
            b"GET / HTTP/1.1\r\nUpgrade: h2c\r\nConnection: Upgrade\r\nSec-WebSocket-Key: abc\r\n\r\n",
        );
        assert!(!is_websocket_upgrade(&wrong_protocol));
    }

    #[test]
    fn test_handshake_response() {
        let response = String::from_utf8(handshake_response("dGhlIHNhbXBsZSBub25jZQ==")).unwrap();
        assert!(response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(response.contains("Upgrade: websocket\r\n"));
        assert!(response.contains("Connection: Upgrade\r\n"));
        assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
        assert!(!response.contains("Content-Length"));
    }

    #[test]
    fn test_upgrade_target() {
        let target = UpgradeTarget::from_path("/room/r1/viewer").unwrap();
        assert_eq!(target.room_id, "r1");
        assert_eq!(target.role, PeerRole::Viewer);

        assert!(matches!(
            UpgradeTarget::from_path("/room/r1/admin"),
            Err(WebSocketError::InvalidRole(role)) if role == "admin"
        ));
        assert!(matches!(
            UpgradeTarget::from_path("/room//host"),
            Err(WebSocketError::MissingRoomId)
        ));
        assert!(matches!(
            UpgradeTarget::from_path("/ws"),
            Err(WebSocketError::MissingRoomId)
        ));
    }

    #[test]
    fn test_peer_ids_unique() {
        let ids: HashSet<String> = (0..1000)
            .map(|_| generate_peer_id("r1", PeerRole::Viewer))
            .collect();
        assert_eq!(ids.len(), 1000);
        assert!(ids.iter().all(|id| id.starts_with("r1_viewer_")));
    }

    #[tokio::test]
    async fn test_perform_upgrade_writes_101() {
        let request = upgrade_request("/room/r1/host");
        let mut out = Vec::new();

        let conn = perform_upgrade(&mut out, &request).await.unwrap();
        assert_eq!(conn.room_id, "r1");
        assert_eq!(conn.role, PeerRole::Host);
        assert!(conn.peer_id.starts_with("r1_host_"));
        drop(conn);

        let written = String::from_utf8(out).unwrap();
        assert!(written.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
    }

    #[tokio::test]
    async fn test_rejected_upgrade_writes_nothing() {
        let mut out = Vec::new();

        assert!(matches!(
            perform_upgrade(&mut out, &upgrade_request("/room/r1/admin")).await,
            Err(WebSocketError::InvalidRole(_))
        ));
        assert!(matches!(
            perform_upgrade(&mut out, &upgrade_request("/lobby")).await,
            Err(WebSocketError::MissingRoomId)
        ));

        assert!(out.is_empty());
    }
}
