//! End-to-end tests against a running signaling server.

use futures_util::{SinkExt, StreamExt};
use livestream_signaling::config::ServerConfig;
use livestream_signaling::rooms::MemoryRoomManager;
use livestream_signaling::server::{ServerStatus, SignalingServer};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type Client = WebSocketStream<TcpStream>;

async fn start_server(websocket_port: bool) -> (SignalingServer, SocketAddr) {
    let mut config = ServerConfig::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.server.websocket_port = websocket_port.then_some(0);

    let mut server = SignalingServer::new(config, Arc::new(MemoryRoomManager::new()));
    let addr = server.start().await.unwrap();
    (server, addr)
}

/// Send a raw request and read until the server closes.
async fn http(addr: SocketAddr, raw: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();

    let mut out = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut out))
        .await
        .expect("response timed out")
        .unwrap();
    let text = String::from_utf8(out).unwrap();

    let status = text
        .split(' ')
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(0);
    let body = text
        .split_once("\r\n\r\n")
        .map(|(_, body)| body.to_string())
        .unwrap_or_default();
    (status, body)
}

async fn create_room(addr: SocketAddr) -> String {
    let body = r#"{"post_id":"post-1","host_user_id":"user-1"}"#;
    let raw = format!(
        "POST /room/create HTTP/1.1\r\nHost: test\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let (status, body) = http(addr, &raw).await;
    assert_eq!(status, 201, "{body}");
    let json: Value = serde_json::from_str(&body).unwrap();
    json["room_id"].as_str().unwrap().to_string()
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let stream = TcpStream::connect(addr).await.unwrap();
    let (ws, response) = tokio_tungstenite::client_async(format!("ws://{addr}{path}"), stream)
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 101);
    ws
}

async fn next_json(client: &mut Client) -> Value {
    let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("timed out waiting for frame")
        .expect("stream ended")
        .unwrap();
    match frame {
        Message::Text(text) => serde_json::from_str(&text).unwrap(),
        other => panic!("unexpected frame: {other:?}"),
    }
}

async fn join(client: &mut Client, room_id: &str, role: &str) -> String {
    let join = serde_json::json!({"type": "join", "room_id": room_id, "role": role});
    client.send(Message::text(join.to_string())).await.unwrap();

    let ack = next_json(client).await;
    assert_eq!(ack["type"], "join");
    assert_eq!(ack["data"]["room_id"], room_id);
    ack["data"]["peer_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_room_api() {
    let (mut server, addr) = start_server(false).await;

    let room_id = create_room(addr).await;
    assert!(room_id.starts_with("room_"));

    let (status, body) = http(addr, &format!("GET /room/{room_id}/stats HTTP/1.1\r\n\r\n")).await;
    assert_eq!(status, 200);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["post_id"], "post-1");
    assert_eq!(json["is_active"], true);

    let (status, body) = http(addr, &format!("POST /room/{room_id}/stop HTTP/1.1\r\n\r\n")).await;
    assert_eq!(status, 200);
    assert_eq!(body, format!(r#"{{"status":"stopped","room_id":"{room_id}"}}"#));

    let (status, body) = http(addr, "GET /room/missing/stats HTTP/1.1\r\n\r\n").await;
    assert_eq!(status, 404);
    assert_eq!(body, r#"{"error":"Room not found"}"#);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_create_room_requires_fields() {
    let (mut server, addr) = start_server(false).await;

    let body = r#"{"post_id":"post-1"}"#;
    let raw = format!(
        "POST /room/create HTTP/1.1\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let (status, body) = http(addr, &raw).await;
    assert_eq!(status, 400);
    assert_eq!(body, r#"{"error":"Missing post_id or host_user_id"}"#);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_health_and_unknown_route() {
    let (mut server, addr) = start_server(false).await;

    let (status, body) = http(addr, "GET /health HTTP/1.1\r\n\r\n").await;
    assert_eq!(status, 200);
    assert_eq!(body, r#"{"status":"healthy","service":"media_server"}"#);

    let (status, body) = http(addr, "DELETE /health HTTP/1.1\r\n\r\n").await;
    assert_eq!(status, 404);
    assert_eq!(body, r#"{"error":"Route not found"}"#);

    let stats = server.stats();
    assert_eq!(stats.requests_handled, 2);
    assert_eq!(stats.responses_2xx, 1);
    assert_eq!(stats.responses_4xx, 1);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_join_and_offer_echo() {
    let (mut server, addr) = start_server(false).await;
    let room_id = create_room(addr).await;

    let mut host = connect(addr, &format!("/room/{room_id}/host")).await;
    let peer_id = join(&mut host, &room_id, "host").await;
    assert!(peer_id.starts_with("peer_"));
    assert!(server.registry().get(&peer_id).await.is_some());

    let offer = r#"{"type":"offer","sdp":"v=0"}"#;
    host.send(Message::text(offer)).await.unwrap();
    let answer = next_json(&mut host).await;
    assert_eq!(answer["type"], "answer");
    assert_eq!(answer["data"]["sdp"], "v=0");

    let room = server.rooms().get_room(&room_id).unwrap();
    assert!(room.has_host);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_broadcast_reaches_viewers_only() {
    let (mut server, addr) = start_server(false).await;
    let room_id = create_room(addr).await;

    let mut host = connect(addr, &format!("/room/{room_id}/host")).await;
    let host_id = join(&mut host, &room_id, "host").await;
    let mut viewer = connect(addr, &format!("/room/{room_id}/viewer")).await;
    join(&mut viewer, &room_id, "viewer").await;

    let delivered = server
        .registry()
        .broadcast_to_room(&room_id, r#"{"type":"viewer_joined"}"#, Some(&host_id))
        .await;
    assert_eq!(delivered, 1);
    assert_eq!(next_json(&mut viewer).await["type"], "viewer_joined");

    let silent = tokio::time::timeout(Duration::from_millis(100), host.next()).await;
    assert!(silent.is_err());

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_invalid_role_closes_without_handshake() {
    let (mut server, addr) = start_server(false).await;

    let (status, body) = http(
        addr,
        "GET /room/r1/admin HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\nSec-WebSocket-Version: 13\r\n\r\n",
    )
    .await;
    assert_eq!(status, 0);
    assert!(body.is_empty());

    // The socket drops before the counter is bumped.
    for _ in 0..50 {
        if server.stats().upgrades_failed == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.stats().upgrades_failed, 1);

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_raw_websocket_listener() {
    let (mut server, addr) = start_server(true).await;
    let room_id = create_room(addr).await;
    let ws_addr = server.websocket_addr().unwrap();

    let mut client = connect(ws_addr, "/").await;
    let peer_id = join(&mut client, &room_id, "viewer").await;
    assert!(server.registry().get(&peer_id).await.is_some());

    client
        .send(Message::text(r#"{"type":"leave"}"#))
        .await
        .unwrap();
    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(Ok(frame)) = client.next().await {
            if matches!(frame, Message::Close(_)) {
                break;
            }
        }
    })
    .await;
    assert!(closed.is_ok());

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_closes_sessions() {
    let (mut server, addr) = start_server(false).await;
    let room_id = create_room(addr).await;

    let mut viewer = connect(addr, &format!("/room/{room_id}/viewer")).await;
    join(&mut viewer, &room_id, "viewer").await;

    server.shutdown().await.unwrap();
    assert_eq!(server.status(), ServerStatus::Stopped);
    assert!(server.registry().is_empty().await);

    let frame = tokio::time::timeout(Duration::from_secs(5), viewer.next())
        .await
        .unwrap();
    assert!(matches!(frame, Some(Ok(Message::Close(_)))));

    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_shutdown_drops_unresponsive_peer() {
    let (mut server, addr) = start_server(false).await;
    let room_id = create_room(addr).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    let upgrade = format!(
        "GET /room/{room_id}/viewer HTTP/1.1\r\nHost: test\r\nUpgrade: websocket\r\n\
         Connection: Upgrade\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
         Sec-WebSocket-Version: 13\r\n\r\n"
    );
    stream.write_all(upgrade.as_bytes()).await.unwrap();

    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        stream.read_exact(&mut byte).await.unwrap();
        head.push(byte[0]);
    }
    assert!(head.starts_with(b"HTTP/1.1 101"));

    server.shutdown().await.unwrap();

    // The close frame is never answered; the server drops the socket anyway.
    let mut rest = Vec::new();
    let eof = tokio::time::timeout(Duration::from_secs(3), stream.read_to_end(&mut rest)).await;
    assert!(eof.is_ok(), "socket still open after shutdown");
    assert_eq!(rest.first(), Some(&0x88));
}

#[tokio::test]
async fn test_shutdown_closes_session_before_join() {
    let (mut server, _) = start_server(true).await;
    let ws_addr = server.websocket_addr().unwrap();
    let mut client = connect(ws_addr, "/").await;

    server.shutdown().await.unwrap();

    let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .unwrap();
    assert!(matches!(frame, Some(Ok(Message::Close(_)))));
}

#[tokio::test]
async fn test_trailing_slash_is_not_a_route() {
    let (mut server, addr) = start_server(false).await;

    let (status, _) = http(addr, "GET /health/ HTTP/1.1\r\n\r\n").await;
    assert_eq!(status, 404);

    let body = r#"{"post_id":"p1","host_user_id":"u1"}"#;
    let raw = format!(
        "POST //room//create/ HTTP/1.1\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let (status, _) = http(addr, &raw).await;
    assert_eq!(status, 404);
    assert_eq!(server.rooms().stats().total_rooms, 0);

    server.shutdown().await.unwrap();
}
