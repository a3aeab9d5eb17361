//! # Room Management
//!
//! The room/peer directory consulted by the HTTP API and the signaling
//! sessions. The signaling core only depends on the [`RoomManager`] trait;
//! [`MemoryRoomManager`] is the in-process implementation used by the binary.

mod memory;

pub use memory::MemoryRoomManager;

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Role a peer plays inside a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerRole {
    /// The broadcaster. At most one per room.
    Host,
    /// A watcher.
    Viewer,
}

impl PeerRole {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Viewer => "viewer",
        }
    }

    /// Returns `true` for [`PeerRole::Host`].
    #[must_use]
    pub fn is_host(&self) -> bool {
        matches!(self, Self::Host)
    }
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PeerRole {
    type Err = String;

    /// Only the exact lowercase literals are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "host" => Ok(Self::Host),
            "viewer" => Ok(Self::Viewer),
            other => Err(other.to_string()),
        }
    }
}

/// Point-in-time view of a room, serialized by `GET /room/:room_id/stats`.
///
/// Field order is the wire order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSnapshot {
    /// Room identifier.
    pub room_id: String,
    /// Post the livestream is attached to.
    pub post_id: String,
    /// Whether the room is still live.
    pub is_active: bool,
    /// Number of connected viewers.
    pub viewer_count: usize,
    /// Whether a host is connected.
    pub has_host: bool,
}

/// Aggregate counters, serialized by `GET /stats`.
///
/// Field order is the wire order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerStats {
    /// Rooms currently known.
    pub total_rooms: usize,
    /// Rooms that are live.
    pub active_rooms: usize,
    /// Peers across all rooms.
    pub total_peers: usize,
    /// Viewers across all rooms.
    pub total_viewers: usize,
    /// Hosts across all rooms.
    pub total_hosts: usize,
    /// Signaling bytes written to peers.
    pub total_bytes_sent: u64,
    /// Signaling bytes read from peers.
    pub total_bytes_received: u64,
}

/// Room and peer lifecycle owned outside the signaling core.
///
/// Implementations must be callable concurrently from every connection task.
pub trait RoomManager: Send + Sync {
    /// Create a room for a post. Returns the new room id, or `None` on failure.
    fn create_room(&self, post_id: &str, host_user_id: &str) -> Option<String>;

    /// Delete a room. Returns `false` if the room is unknown.
    fn delete_room(&self, room_id: &str) -> bool;

    /// Look up a room.
    fn get_room(&self, room_id: &str) -> Option<RoomSnapshot>;

    /// Aggregate statistics.
    fn stats(&self) -> ServerStats;

    /// Add a peer to a room. Returns the assigned peer id, or `None` if the
    /// peer could not be admitted.
    fn add_peer(
        &self,
        room_id: &str,
        display_name: &str,
        metadata: &str,
        role: PeerRole,
    ) -> Option<String>;

    /// Remove a peer. Unknown peers are ignored.
    fn remove_peer(&self, peer_id: &str);

    /// Account signaling traffic.
    fn record_traffic(&self, _bytes_sent: u64, _bytes_received: u64) {}
}
