//! Room identity and the recent-room history.

use serde::{Deserialize, Serialize};

/// Identity of a room on a relay server.
///
/// Fixed for the lifetime of a session; joining another room means a full
/// reconnect and rejoin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomIdentity {
    pub server: String,
    pub room: String,
    pub password: Option<String>,
}

impl RoomIdentity {
    pub fn new(
        server: impl Into<String>,
        room: impl Into<String>,
        password: Option<String>,
    ) -> Self {
        Self {
            server: server.into(),
            room: room.into(),
            password,
        }
    }
}

/// One entry of the recent-room history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentRoom {
    pub server: String,
    pub room: String,
    pub password: Option<String>,
    /// Unix timestamp (milliseconds) of the join
    pub time: i64,
}

impl RecentRoom {
    pub fn from_identity(identity: &RoomIdentity, time: i64) -> Self {
        Self {
            server: identity.server.clone(),
            room: identity.room.clone(),
            password: identity.password.clone(),
            time,
        }
    }

    fn same_room(&self, other: &RecentRoom) -> bool {
        self.server == other.server && self.room == other.room
    }
}

/// Recent rooms, most recent first, unique by `(server, room)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentRooms {
    entries: Vec<RecentRoom>,
}

impl RecentRooms {
    pub fn new(entries: Vec<RecentRoom>) -> Self {
        let mut rooms = Self::default();
        // Oldest first so the first given entry ends up in front.
        for entry in entries.into_iter().rev() {
            rooms.add(entry);
        }
        rooms
    }

    /// Move (or insert) `entry` to the front, dropping any entry for the same room.
    pub fn add(&mut self, entry: RecentRoom) {
        self.entries.retain(|room| !room.same_room(&entry));
        self.entries.insert(0, entry);
    }

    /// Drop every entry for the same `(server, room)` as `entry`.
    pub fn remove(&mut self, entry: &RecentRoom) {
        self.entries.retain(|room| !room.same_room(entry));
    }

    pub fn entries(&self) -> &[RecentRoom] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
