//! # Protocol Modules
//!
//! - [`http_handler`] - request framing, parsing, routing and the room API
//! - [`websocket_handler`] - upgrade handshake, signaling sessions and the
//!   session registry

pub mod http_handler;
pub mod websocket_handler;
