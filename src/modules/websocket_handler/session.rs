//! Per-connection signaling session.

use super::error::{WebSocketError, WebSocketResult};
use super::message::{encode, encode_join_ack, MessageType, SignalMessage};
use super::registry::SessionRegistry;
use super::upgrade::UpgradedConnection;
use crate::rooms::{PeerRole, RoomManager};
use futures_util::stream::SplitStream;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use parking_lot::RwLock;
use std::fmt;
use std::ops::ControlFlow;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

type FrameSink = Pin<Box<dyn Sink<Message, Error = tungstenite::Error> + Send>>;

/// Upper bound on writing the close frame to a peer that stopped reading.
const CLOSE_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Read half handed back to the task driving [`Session::run`].
pub type SessionStream<S> = SplitStream<WebSocketStream<S>>;

/// Session lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Created, read loop not started.
    Connecting = 0,
    /// Reading and dispatching frames.
    Open = 1,
    /// Terminal.
    Closed = 2,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Open,
            _ => Self::Closed,
        }
    }
}

/// Who a session speaks for. Empty until JOIN on the raw listener.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Peer id.
    pub peer_id: Option<String>,
    /// Room id.
    pub room_id: Option<String>,
    /// Role.
    pub role: Option<PeerRole>,
}

/// One WebSocket peer.
///
/// The read half of the socket belongs to [`Session::run`]; the write half
/// sits behind a lock so frames from the read loop and from broadcasts never
/// interleave.
pub struct Session {
    identity: RwLock<SessionIdentity>,
    state: AtomicU8,
    writer: Mutex<FrameSink>,
    rooms: Arc<dyn RoomManager>,
    /// Wakes the read loop when the session is closed from outside.
    closed: Notify,
    /// Whether `identity.peer_id` was issued by the room manager.
    joined: AtomicBool,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &*self.identity.read())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Wrap a WebSocket stream whose handshake is complete.
    pub fn new<S>(
        ws: WebSocketStream<S>,
        identity: SessionIdentity,
        rooms: Arc<dyn RoomManager>,
    ) -> (Arc<Self>, SessionStream<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = ws.split();
        let sink: FrameSink = Box::pin(sink);
        let session = Arc::new(Self {
            identity: RwLock::new(identity),
            state: AtomicU8::new(SessionState::Connecting as u8),
            writer: Mutex::new(sink),
            rooms,
            closed: Notify::new(),
            joined: AtomicBool::new(false),
        });
        (session, stream)
    }

    /// Take ownership of a socket upgraded by the HTTP listener.
    pub async fn from_upgraded<S>(
        conn: UpgradedConnection<S>,
        rooms: Arc<dyn RoomManager>,
    ) -> (Arc<Self>, SessionStream<S>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let ws = WebSocketStream::from_raw_socket(conn.stream, Role::Server, None).await;
        let identity = SessionIdentity {
            peer_id: Some(conn.peer_id),
            room_id: Some(conn.room_id),
            role: Some(conn.role),
        };
        Self::new(ws, identity, rooms)
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Whether the session has not been closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() != SessionState::Closed
    }

    /// Snapshot of the identity.
    #[must_use]
    pub fn identity(&self) -> SessionIdentity {
        self.identity.read().clone()
    }

    /// Peer id, once known.
    #[must_use]
    pub fn peer_id(&self) -> Option<String> {
        self.identity.read().peer_id.clone()
    }

    /// Room id, once known.
    #[must_use]
    pub fn room_id(&self) -> Option<String> {
        self.identity.read().room_id.clone()
    }

    /// Role, once known.
    #[must_use]
    pub fn role(&self) -> Option<PeerRole> {
        self.identity.read().role
    }

    /// Write one text frame.
    pub async fn send(&self, text: String) -> WebSocketResult<()> {
        if !self.is_open() {
            return Err(WebSocketError::ConnectionClosed);
        }
        let len = text.len() as u64;

        let mut writer = self.writer.lock().await;
        writer.send(Message::text(text)).await?;
        drop(writer);

        self.rooms.record_traffic(len, 0);
        Ok(())
    }

    /// Close the session. Only the first call has any effect; it returns
    /// `true`.
    ///
    /// The read loop stops without waiting for the peer to answer the close
    /// frame.
    pub async fn close(&self) -> bool {
        let previous = self
            .state
            .swap(SessionState::Closed as u8, Ordering::AcqRel);
        if previous == SessionState::Closed as u8 {
            return false;
        }
        self.closed.notify_one();

        let mut writer = self.writer.lock().await;
        match tokio::time::timeout(CLOSE_WRITE_TIMEOUT, writer.close()).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => debug!(error = %e, "Close handshake failed"),
            Err(_) => debug!("Timed out writing close frame"),
        }
        info!(peer_id = ?self.peer_id(), "Session closed");
        true
    }

    /// Drive the read loop until the peer leaves, the socket fails or the
    /// session is closed, then unregister from `registry` and release the
    /// room manager's peer if JOIN created one.
    ///
    /// Returns the number of frames dispatched.
    pub async fn run<St>(self: Arc<Self>, mut incoming: St, registry: Arc<SessionRegistry>) -> u64
    where
        St: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
    {
        let _ = self.state.compare_exchange(
            SessionState::Connecting as u8,
            SessionState::Open as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        info!(peer_id = ?self.peer_id(), room_id = ?self.room_id(), "Session open");

        let mut dispatched = 0;
        loop {
            let frame = tokio::select! {
                frame = incoming.next() => frame,
                () = self.closed.notified() => break,
            };
            let Some(frame) = frame else {
                break;
            };
            if !self.is_open() {
                break;
            }

            let text = match frame {
                Ok(Message::Text(text)) => text,
                Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => text,
                    Err(_) => {
                        warn!(peer_id = ?self.peer_id(), "Ignoring non-UTF-8 binary frame");
                        continue;
                    },
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    debug!(peer_id = ?self.peer_id(), error = %e, "Read failed");
                    break;
                },
            };

            dispatched += 1;
            self.rooms.record_traffic(0, text.len() as u64);
            if self.dispatch(&text, &registry).await.is_break() {
                break;
            }
        }

        self.close().await;
        if let Some(peer_id) = self.peer_id() {
            registry.unregister_session(&peer_id, &self).await;
            if self.joined.swap(false, Ordering::AcqRel) {
                debug!(peer_id = %peer_id, "Releasing room membership");
                self.rooms.remove_peer(&peer_id);
            }
        }
        dispatched
    }

    async fn dispatch(self: &Arc<Self>, text: &str, registry: &SessionRegistry) -> ControlFlow<()> {
        let msg = SignalMessage::parse(text);
        debug!(peer_id = ?self.peer_id(), kind = %msg.kind, "Message received");

        match msg.kind {
            MessageType::Join => self.handle_join(&msg, registry).await,
            MessageType::Offer => {
                debug!(peer_id = ?self.peer_id(), "Offer received, echoing as answer");
                self.reply(encode(MessageType::Answer, &msg.payload)).await;
            },
            MessageType::Answer => {
                debug!(peer_id = ?self.peer_id(), "Answer received");
            },
            MessageType::IceCandidate => {
                debug!(peer_id = ?self.peer_id(), "ICE candidate received");
            },
            MessageType::Leave => {
                info!(peer_id = ?self.peer_id(), "Peer leaving");
                if let Some(peer_id) = self.peer_id() {
                    self.joined.store(false, Ordering::Release);
                    self.rooms.remove_peer(&peer_id);
                }
                return ControlFlow::Break(());
            },
            MessageType::Error | MessageType::ViewerJoined | MessageType::ViewerLeft => {
                warn!(peer_id = ?self.peer_id(), "Unrecognized message ignored");
            },
        }
        ControlFlow::Continue(())
    }

    async fn handle_join(self: &Arc<Self>, msg: &SignalMessage, registry: &SessionRegistry) {
        let room_id = msg
            .room_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| self.room_id());
        let Some(room_id) = room_id else {
            warn!("JOIN without room id ignored");
            return;
        };
        let role = if msg.wants_host() {
            PeerRole::Host
        } else {
            PeerRole::Viewer
        };

        let Some(peer_id) = self
            .rooms
            .add_peer(&room_id, &msg.payload, &msg.payload, role)
        else {
            warn!(room_id = %room_id, role = %role, "Room manager rejected peer");
            return;
        };

        let previous = {
            let mut identity = self.identity.write();
            let previous = identity.peer_id.replace(peer_id.clone());
            identity.room_id = Some(room_id.clone());
            identity.role = Some(role);
            previous
        };
        if let Some(previous) = previous {
            registry.unregister_session(&previous, self).await;
            if self.joined.swap(true, Ordering::AcqRel) {
                self.rooms.remove_peer(&previous);
            }
        } else {
            self.joined.store(true, Ordering::Release);
        }
        registry.register(peer_id.clone(), Arc::clone(self)).await;

        info!(peer_id = %peer_id, room_id = %room_id, role = %role, "Peer joined");
        self.reply(encode_join_ack(&peer_id, &room_id)).await;
    }

    async fn reply(&self, encoded: serde_json::Result<String>) {
        let result = match encoded {
            Ok(text) => self.send(text).await,
            Err(e) => Err(WebSocketError::Protocol(e.to_string())),
        };
        if let Err(e) = result {
            warn!(peer_id = ?self.peer_id(), error = %e, "Failed to reply");
        }
    }
}
