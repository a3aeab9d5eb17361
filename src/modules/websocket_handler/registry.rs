//! Session registry and room broadcast hub.

use super::session::Session;
use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Directory of live sessions keyed by peer id.
///
/// Room membership is derived by scanning every session's room id, so
/// broadcasts are O(total sessions). That is fine at a few hundred peers per
/// process and is the first thing to index if it grows beyond that.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. Returns the session previously stored under the
    /// same peer id, if any.
    pub async fn register(
        &self,
        peer_id: impl Into<String>,
        session: Arc<Session>,
    ) -> Option<Arc<Session>> {
        let peer_id = peer_id.into();
        debug!(peer_id = %peer_id, "Registering session");
        self.sessions.write().await.insert(peer_id, session)
    }

    /// Remove whatever session is stored under `peer_id`.
    pub async fn unregister(&self, peer_id: &str) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(peer_id)
    }

    /// Remove `peer_id` only if it still maps to `session`.
    ///
    /// A session tearing itself down must not evict a newer session that
    /// took over the same id.
    pub async fn unregister_session(&self, peer_id: &str, session: &Arc<Session>) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(peer_id) {
            Some(current) if Arc::ptr_eq(current, session) => {
                sessions.remove(peer_id);
                debug!(peer_id = %peer_id, "Session unregistered");
                true
            },
            _ => false,
        }
    }

    /// Look up a session.
    pub async fn get(&self, peer_id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(peer_id).cloned()
    }

    /// Send a text frame to one peer. Unknown peers are a silent no-op.
    ///
    /// Returns whether the frame was written.
    pub async fn send_to_peer(&self, peer_id: &str, message: &str) -> bool {
        let Some(session) = self.get(peer_id).await else {
            debug!(peer_id = %peer_id, "send_to_peer: unknown peer");
            return false;
        };

        match session.send(message.to_string()).await {
            Ok(()) => true,
            Err(e) => {
                warn!(peer_id = %peer_id, error = %e, "Failed to send to peer");
                false
            },
        }
    }

    /// Send a text frame to every session in `room_id` except
    /// `exclude_peer_id`.
    ///
    /// Best effort: a failed recipient is logged and skipped. Returns the
    /// number of sessions the frame was written to.
    pub async fn broadcast_to_room(
        &self,
        room_id: &str,
        message: &str,
        exclude_peer_id: Option<&str>,
    ) -> usize {
        let targets: Vec<(String, Arc<Session>)> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .filter(|(peer_id, _)| Some(peer_id.as_str()) != exclude_peer_id)
                .filter(|(_, session)| session.room_id().as_deref() == Some(room_id))
                .map(|(peer_id, session)| (peer_id.clone(), Arc::clone(session)))
                .collect()
        };

        let sends = targets.iter().map(|(peer_id, session)| async move {
            match session.send(message.to_string()).await {
                Ok(()) => true,
                Err(e) => {
                    warn!(peer_id = %peer_id, error = %e, "Broadcast send failed");
                    false
                },
            }
        });
        let delivered = join_all(sends).await.into_iter().filter(|ok| *ok).count();

        debug!(
            room_id = %room_id,
            targets = targets.len(),
            delivered,
            "Broadcast complete"
        );
        delivered
    }

    /// Close every session and clear the registry. Returns how many were
    /// closed.
    pub async fn close_all(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let drained: Vec<Arc<Session>> = sessions.drain().map(|(_, s)| s).collect();
        for session in &drained {
            session.close().await;
        }
        if !drained.is_empty() {
            info!(count = drained.len(), "Closed all sessions");
        }
        drained.len()
    }

    /// Number of registered sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is registered.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Registered peer ids.
    pub async fn peer_ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::websocket_handler::session::tests::{client_pair, ClientSocket};
    use crate::rooms::PeerRole;
    use futures_util::StreamExt;
    use std::time::Duration;
    use tokio_tungstenite::tungstenite::Message;

    async fn expect_text(client: &mut ClientSocket) -> String {
        let msg = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .expect("timed out")
            .expect("stream ended")
            .expect("read failed");
        match msg {
            Message::Text(text) => text.to_string(),
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    async fn expect_silence(client: &mut ClientSocket) {
        let result = tokio::time::timeout(Duration::from_millis(100), client.next()).await;
        assert!(result.is_err(), "unexpected frame: {result:?}");
    }

    #[tokio::test]
    async fn test_register_and_send() {
        let registry = SessionRegistry::new();
        let (session, mut client) = client_pair("r1", "p1", PeerRole::Viewer).await;
        registry.register("p1", session).await;

        assert_eq!(registry.len().await, 1);
        assert!(registry.send_to_peer("p1", "hello").await);
        assert_eq!(expect_text(&mut client).await, "hello");
    }

    #[tokio::test]
    async fn test_send_after_unregister_is_noop() {
        let registry = SessionRegistry::new();
        let (session, mut client) = client_pair("r1", "p1", PeerRole::Viewer).await;
        registry.register("p1", session).await;

        assert!(registry.unregister("p1").await.is_some());
        assert!(!registry.send_to_peer("p1", "hello").await);
        assert!(registry.is_empty().await);
        expect_silence(&mut client).await;

        assert!(!registry.send_to_peer("never-registered", "x").await);
    }

    #[tokio::test]
    async fn test_broadcast_with_exclusion() {
        let registry = SessionRegistry::new();
        let (s1, mut c1) = client_pair("room-a", "p1", PeerRole::Host).await;
        let (s2, mut c2) = client_pair("room-a", "p2", PeerRole::Viewer).await;
        let (s3, mut c3) = client_pair("room-a", "p3", PeerRole::Viewer).await;
        let (s4, mut c4) = client_pair("room-b", "p4", PeerRole::Viewer).await;
        registry.register("p1", s1).await;
        registry.register("p2", s2).await;
        registry.register("p3", s3).await;
        registry.register("p4", s4).await;

        let delivered = registry
            .broadcast_to_room("room-a", r#"{"type":"offer"}"#, Some("p1"))
            .await;
        assert_eq!(delivered, 2);

        assert_eq!(expect_text(&mut c2).await, r#"{"type":"offer"}"#);
        assert_eq!(expect_text(&mut c3).await, r#"{"type":"offer"}"#);
        expect_silence(&mut c1).await;
        expect_silence(&mut c4).await;
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_room() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.broadcast_to_room("nobody", "x", None).await, 0);

        let (s1, _c1) = client_pair("room-a", "p1", PeerRole::Host).await;
        registry.register("p1", s1).await;
        assert_eq!(registry.broadcast_to_room("room-a", "x", Some("p1")).await, 0);
    }

    #[tokio::test]
    async fn test_broadcast_skips_failed_recipient() {
        let registry = SessionRegistry::new();
        let (s1, _c1) = client_pair("room-a", "p1", PeerRole::Viewer).await;
        let (s2, mut c2) = client_pair("room-a", "p2", PeerRole::Viewer).await;
        s1.close().await;
        registry.register("p1", s1).await;
        registry.register("p2", s2).await;

        assert_eq!(registry.broadcast_to_room("room-a", "x", None).await, 1);
        assert_eq!(expect_text(&mut c2).await, "x");
    }

    #[tokio::test]
    async fn test_unregister_session_checks_identity() {
        let registry = SessionRegistry::new();
        let (old, _c1) = client_pair("r1", "p1", PeerRole::Viewer).await;
        let (new, _c2) = client_pair("r1", "p1", PeerRole::Viewer).await;

        registry.register("p1", Arc::clone(&old)).await;
        let replaced = registry.register("p1", Arc::clone(&new)).await;
        assert!(replaced.is_some_and(|s| Arc::ptr_eq(&s, &old)));

        assert!(!registry.unregister_session("p1", &old).await);
        assert_eq!(registry.len().await, 1);
        assert!(registry.unregister_session("p1", &new).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = SessionRegistry::new();
        let (s1, mut c1) = client_pair("r1", "p1", PeerRole::Host).await;
        let (s2, _c2) = client_pair("r1", "p2", PeerRole::Viewer).await;
        registry.register("p1", Arc::clone(&s1)).await;
        registry.register("p2", Arc::clone(&s2)).await;

        assert_eq!(registry.close_all().await, 2);
        assert!(registry.is_empty().await);
        assert!(!s1.is_open());
        assert!(!s2.is_open());

        let frame = tokio::time::timeout(Duration::from_secs(2), c1.next())
            .await
            .unwrap();
        assert!(matches!(frame, Some(Ok(Message::Close(_)))));
    }
}
