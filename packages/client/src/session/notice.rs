//! Events surfaced to the UI collaborator.

use crate::domain::{Member, Message, RoomIdentity};

#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    /// First successful join of a room
    Joined { identity: RoomIdentity, users: usize },
    /// Room state re-seeded after a transport drop
    Rejoined { identity: RoomIdentity, users: usize },
    RejoinFailed { identity: RoomIdentity, reason: String },
    UserJoined(Member),
    UserLeft(Member),
    HostChanged(Member),
    PartyPausingChanged(bool),
    NewMessage(Message),
    /// The transport dropped; `will_retry` tells whether it is re-established
    ConnectionLost { reason: String, will_retry: bool },
    Reconnecting { attempt: u32, max_attempts: u32 },
}
