//! Signaling message schema.
//!
//! Inbound frames are JSON objects discriminated by `type`. Outbound frames
//! are `{"type":<type>,"data":<payload>}` where the payload is embedded
//! verbatim.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::fmt;

/// Signaling message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Peer joins a room.
    Join,
    /// SDP offer from a host.
    Offer,
    /// SDP answer.
    Answer,
    /// ICE candidate.
    IceCandidate,
    /// Peer leaves.
    Leave,
    /// Error or unrecognized message.
    Error,
    /// A viewer joined the room.
    ViewerJoined,
    /// A viewer left the room.
    ViewerLeft,
}

impl MessageType {
    /// Wire name of the type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Offer => "offer",
            Self::Answer => "answer",
            Self::IceCandidate => "ice_candidate",
            Self::Leave => "leave",
            Self::Error => "error",
            Self::ViewerJoined => "viewer_joined",
            Self::ViewerLeft => "viewer_left",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Inbound {
    #[serde(alias = "JOIN")]
    Join {
        #[serde(default)]
        room_id: Option<String>,
        #[serde(default)]
        role: Option<String>,
    },
    Offer,
    Answer,
    #[serde(alias = "candidate")]
    IceCandidate,
    Leave,
    Error,
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalMessage {
    /// Message type. Undecodable input maps to [`MessageType::Error`].
    pub kind: MessageType,
    /// Room id carried by JOIN.
    pub room_id: Option<String>,
    /// Role string carried by JOIN.
    pub role: Option<String>,
    /// The complete frame text, passed through untouched.
    pub payload: String,
}

impl SignalMessage {
    /// Decode a text frame. Never fails.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let (kind, room_id, role) = match serde_json::from_str::<Inbound>(text) {
            Ok(Inbound::Join { room_id, role }) => (MessageType::Join, room_id, role),
            Ok(Inbound::Offer) => (MessageType::Offer, None, None),
            Ok(Inbound::Answer) => (MessageType::Answer, None, None),
            Ok(Inbound::IceCandidate) => (MessageType::IceCandidate, None, None),
            Ok(Inbound::Leave) => (MessageType::Leave, None, None),
            Ok(Inbound::Error) | Err(_) => (MessageType::Error, None, None),
        };

        Self {
            kind,
            room_id,
            role,
            payload: text.to_string(),
        }
    }

    /// Whether a JOIN asked for the host role.
    #[must_use]
    pub fn wants_host(&self) -> bool {
        self.role.as_deref() == Some("host")
    }
}

#[derive(Serialize)]
struct Envelope<'a, D: ?Sized + Serialize> {
    #[serde(rename = "type")]
    kind: MessageType,
    data: &'a D,
}

/// Encode an outbound frame.
///
/// `data` is embedded verbatim when it is valid JSON, otherwise as a JSON
/// string.
pub fn encode(kind: MessageType, data: &str) -> serde_json::Result<String> {
    match serde_json::from_str::<&RawValue>(data) {
        Ok(raw) => serde_json::to_string(&Envelope { kind, data: raw }),
        Err(_) => serde_json::to_string(&Envelope { kind, data }),
    }
}

/// Data of the JOIN acknowledgment.
#[derive(Debug, Serialize)]
pub struct JoinAck<'a> {
    /// Assigned peer id.
    pub peer_id: &'a str,
    /// Joined room.
    pub room_id: &'a str,
}

/// Encode the JOIN acknowledgment.
pub fn encode_join_ack(peer_id: &str, room_id: &str) -> serde_json::Result<String> {
    serde_json::to_string(&Envelope {
        kind: MessageType::Join,
        data: &JoinAck { peer_id, room_id },
    })
}
