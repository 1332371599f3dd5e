use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::room::{Phase, Room};

/// Owns every live room. Rooms are created on the first join referencing an
/// unknown id and destroyed the instant their roster empties; no state
/// survives the process. Each instance is fully isolated so tests can run
/// several side by side.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Mutex<Room>>>>,
}

impl RoomRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rooms: RwLock::new(HashMap::new()),
        })
    }

    /// Fetch the room, creating it if absent. Returns whether it was created
    /// so the caller can mark the creating player as host.
    pub async fn get_or_create(&self, room_id: &str) -> (Arc<Mutex<Room>>, bool) {
        let mut rooms = self.rooms.write().await;
        if let Some(room) = rooms.get(room_id) {
            return (room.clone(), false);
        }

        let room = Arc::new(Mutex::new(Room::new(room_id.to_string())));
        rooms.insert(room_id.to_string(), room.clone());
        tracing::info!(room_id = %room_id, "Room created");
        (room, true)
    }

    pub async fn get(&self, room_id: &str) -> Option<Arc<Mutex<Room>>> {
        let rooms = self.rooms.read().await;
        rooms.get(room_id).cloned()
    }

    /// Drop the room if its roster is still empty, atomically with the
    /// emptiness check: the registry write lock is held across the re-check
    /// (registry lock before room lock, same order as `get_or_create`), so
    /// a join that slipped in after the caller observed the room empty keeps
    /// it alive. Returns whether the room was removed. The room's pending
    /// phase timer is cancelled when the last Arc reference goes away.
    pub async fn remove_if_empty(&self, room_id: &str) -> bool {
        let mut rooms = self.rooms.write().await;
        let Some(room_arc) = rooms.get(room_id).cloned() else {
            return false;
        };

        let room = room_arc.lock().await;
        if !room.is_empty() {
            tracing::debug!(
                room_id = %room_id,
                players = room.player_count(),
                "Teardown skipped, player joined during removal"
            );
            return false;
        }
        drop(room);

        rooms.remove(room_id);
        tracing::info!(room_id = %room_id, "Room destroyed");
        true
    }

    pub async fn room_count(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }

    /// Snapshot of (room id, player count, phase) for the periodic stats log
    pub async fn stats(&self) -> Vec<(String, usize, Phase)> {
        let rooms = self.rooms.read().await;
        let mut stats = Vec::with_capacity(rooms.len());
        for (id, room) in rooms.iter() {
            let room = room.lock().await;
            stats.push((id.clone(), room.player_count(), room.phase));
        }
        stats
    }
}
