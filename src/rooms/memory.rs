//! In-process room directory.

use super::{PeerRole, RoomManager, RoomSnapshot, ServerStats};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug)]
struct Room {
    post_id: String,
    is_active: bool,
    /// peer_id -> role
    peers: HashMap<String, PeerRole>,
}

impl Room {
    fn viewer_count(&self) -> usize {
        self.peers.values().filter(|role| !role.is_host()).count()
    }

    fn has_host(&self) -> bool {
        self.peers.values().any(PeerRole::is_host)
    }
}

#[derive(Debug, Default)]
struct Directory {
    rooms: HashMap<String, Room>,
    /// peer_id -> room_id
    peer_rooms: HashMap<String, String>,
}

/// [`RoomManager`] backed by in-memory maps.
#[derive(Debug, Default)]
pub struct MemoryRoomManager {
    directory: RwLock<Directory>,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
}

impl MemoryRoomManager {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoomManager for MemoryRoomManager {
    fn create_room(&self, post_id: &str, host_user_id: &str) -> Option<String> {
        let room_id = format!("room_{}", Uuid::new_v4().simple());
        let room = Room {
            post_id: post_id.to_string(),
            is_active: true,
            peers: HashMap::new(),
        };

        self.directory.write().rooms.insert(room_id.clone(), room);
        info!(
            room_id = %room_id,
            post_id = %post_id,
            host_user_id = %host_user_id,
            "Room created"
        );
        Some(room_id)
    }

    fn delete_room(&self, room_id: &str) -> bool {
        let mut directory = self.directory.write();
        let Some(room) = directory.rooms.remove(room_id) else {
            return false;
        };
        for peer_id in room.peers.keys() {
            directory.peer_rooms.remove(peer_id);
        }
        info!(room_id = %room_id, peers = room.peers.len(), "Room deleted");
        true
    }

    fn get_room(&self, room_id: &str) -> Option<RoomSnapshot> {
        let directory = self.directory.read();
        directory.rooms.get(room_id).map(|room| RoomSnapshot {
            room_id: room_id.to_string(),
            post_id: room.post_id.clone(),
            is_active: room.is_active,
            viewer_count: room.viewer_count(),
            has_host: room.has_host(),
        })
    }

    fn stats(&self) -> ServerStats {
        let directory = self.directory.read();
        let mut stats = ServerStats {
            total_rooms: directory.rooms.len(),
            total_bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            total_bytes_received: self.bytes_received.load(Ordering::Relaxed),
            ..ServerStats::default()
        };

        for room in directory.rooms.values() {
            if room.is_active {
                stats.active_rooms += 1;
            }
            let viewers = room.viewer_count();
            stats.total_peers += room.peers.len();
            stats.total_viewers += viewers;
            stats.total_hosts += room.peers.len() - viewers;
        }

        stats
    }

    fn add_peer(
        &self,
        room_id: &str,
        _display_name: &str,
        _metadata: &str,
        role: PeerRole,
    ) -> Option<String> {
        let mut directory = self.directory.write();
        let room = directory.rooms.get_mut(room_id)?;
        if !room.is_active || (role.is_host() && room.has_host()) {
            debug!(room_id = %room_id, role = %role, "Peer rejected");
            return None;
        }

        let peer_id = format!("peer_{}", Uuid::new_v4().simple());
        room.peers.insert(peer_id.clone(), role);
        directory
            .peer_rooms
            .insert(peer_id.clone(), room_id.to_string());

        debug!(room_id = %room_id, peer_id = %peer_id, role = %role, "Peer added");
        Some(peer_id)
    }

    fn remove_peer(&self, peer_id: &str) {
        let mut directory = self.directory.write();
        let Some(room_id) = directory.peer_rooms.remove(peer_id) else {
            return;
        };
        if let Some(room) = directory.rooms.get_mut(&room_id) {
            room.peers.remove(peer_id);
        }
        debug!(room_id = %room_id, peer_id = %peer_id, "Peer removed");
    }

    fn record_traffic(&self, bytes_sent: u64, bytes_received: u64) {
        self.bytes_sent.fetch_add(bytes_sent, Ordering::Relaxed);
        self.bytes_received
            .fetch_add(bytes_received, Ordering::Relaxed);
    }
}
