//! # Livestream Signaling
//!
//! The signaling front door of a livestream media server: a small HTTP/1.1
//! API for managing rooms and a WebSocket channel over which hosts and
//! viewers exchange JOIN, SDP offer/answer and ICE messages.
//!
//! ## Layout
//!
//! - [`modules::http_handler`] frames, parses and routes HTTP requests.
//! - [`modules::websocket_handler`] performs the upgrade and runs sessions.
//! - [`rooms`] is the room directory the two consult.
//! - [`server`] binds the listeners and owns the shared state.
//!
//! Media transport (RTP, DTLS, SFU forwarding) lives elsewhere; this crate
//! only relays signaling.

pub mod config;
pub mod logging;
pub mod modules;
pub mod rooms;
pub mod server;
