//! # WebSocket Handler Module
//!
//! Signaling over WebSocket: the upgrade handshake performed on an already
//! parsed HTTP request, the signaling message schema, per-connection
//! sessions and the registry that routes frames between them.
//!
//! ## Flow
//!
//! - [`perform_upgrade`] validates the target path `/room/:room_id/:role`,
//!   writes `101 Switching Protocols` and returns an [`UpgradedConnection`]
//!   owning the socket
//! - [`Session::from_upgraded`] wraps the socket; [`Session::run`] reads
//!   frames and dispatches JOIN / OFFER / ANSWER / ICE / LEAVE
//! - [`SessionRegistry`] maps peer ids to sessions for direct sends and
//!   room broadcasts
//!
//! Peers on the dedicated WebSocket listener skip the HTTP phase and get
//! their identity from JOIN.

mod error;
pub mod message;
mod registry;
mod session;
mod upgrade;

pub use error::{WebSocketError, WebSocketResult};
pub use message::{MessageType, SignalMessage};
pub use registry::SessionRegistry;
pub use session::{Session, SessionIdentity, SessionState, SessionStream};
pub use upgrade::{
    compute_accept_key, generate_peer_id, handshake_response, is_websocket_upgrade,
    perform_upgrade, UpgradeTarget, UpgradedConnection, UPGRADE_PATH,
};
