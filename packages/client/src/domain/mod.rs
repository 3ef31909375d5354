//! Domain models of a synchronization room.
//!
//! Pure data and projections: nothing here performs I/O, so every rule about
//! rosters, recent rooms and sync status is testable in isolation.

mod member;
mod message;
mod playback;
mod room;

pub use member::{Member, Roster};
pub use message::{Message, MessageAuthor};
pub use playback::{
    HostState, PlaybackAction, PlaybackState, PlayerState, SyncStatus, TrackedHostState,
    derive_status,
};
pub use room::{RecentRoom, RecentRooms, RoomIdentity};
