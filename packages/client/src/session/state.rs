//! Owned session state and its observable snapshot.

use tokio::time::Instant;

use crate::{
    config::PollWindow,
    domain::{Member, Message, Roster, RoomIdentity, TrackedHostState},
};

use super::poller::{PollRecord, PollTracker, Poller};

/// Session-level lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Disconnected,
    /// A transport is being (re-)established
    Connecting,
    /// Transport up, not (or no longer) in a room
    Connected,
    InRoom,
}

/// Everything one session knows about its connection and room.
///
/// Mutated only by the session engine; observers read [`SessionSnapshot`]s.
#[derive(Debug)]
pub struct SessionState {
    pub phase: SessionPhase,
    /// Last successfully joined room; kept across transport drops for the rejoin
    pub identity: Option<RoomIdentity>,
    pub roster: Roster,
    /// Id of the member currently authoritative for media actions
    pub host_id: Option<String>,
    /// This client as the relay last reported it
    pub me: Option<Member>,
    pub host_state: Option<TrackedHostState>,
    pub party_pausing: bool,
    pub messages: Vec<Message>,
    pub polls: PollTracker,
    pub poller: Poller,
}

impl SessionState {
    pub fn new(poll_window: PollWindow) -> Self {
        Self {
            phase: SessionPhase::Disconnected,
            identity: None,
            roster: Roster::default(),
            host_id: None,
            me: None,
            host_state: None,
            party_pausing: false,
            messages: Vec::new(),
            polls: PollTracker::new(poll_window),
            poller: Poller::default(),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.phase, SessionPhase::Connected | SessionPhase::InRoom)
    }

    pub fn is_in_room(&self) -> bool {
        self.phase == SessionPhase::InRoom
    }

    pub fn host(&self) -> Option<&Member> {
        self.host_id.as_deref().and_then(|id| self.roster.get(id))
    }

    /// Enter the room described by a successful join
    pub fn enter_room(
        &mut self,
        identity: RoomIdentity,
        members: Vec<Member>,
        party_pausing: bool,
        now: Instant,
    ) {
        self.roster.replace(members);
        self.host_id = self.roster.flagged_host().map(|m| m.id.clone());
        self.me = None;
        self.host_state = None;
        self.party_pausing = party_pausing;
        self.polls.clear_unacked();
        self.identity = Some(identity);
        self.phase = SessionPhase::InRoom;
        self.poller.start(now);
    }

    /// Unexpected loss of the transport.
    ///
    /// Room-scoped state is dropped, the identity is kept so the room can be
    /// rejoined once the transport is back.
    pub fn on_transport_lost(&mut self, reconnecting: bool) {
        self.poller.cancel();
        self.clear_room();
        self.phase = if reconnecting {
            SessionPhase::Connecting
        } else {
            SessionPhase::Disconnected
        };
    }

    /// Explicit disconnect: nothing survives
    pub fn teardown(&mut self) {
        self.poller.cancel();
        self.clear_room();
        self.messages.clear();
        self.party_pausing = false;
        self.identity = None;
        self.phase = SessionPhase::Disconnected;
    }

    fn clear_room(&mut self) {
        self.roster.clear();
        self.host_id = None;
        self.me = None;
        self.host_state = None;
        self.polls.clear_unacked();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase,
            is_connected: self.is_connected(),
            is_in_room: self.is_in_room(),
            identity: self.identity.clone(),
            users: self.roster.members().to_vec(),
            host_id: self.host_id.clone(),
            me: self.me.clone(),
            host_state: self.host_state.clone(),
            party_pausing: self.party_pausing,
            messages: self.messages.clone(),
            srtt: self.polls.srtt(),
            unacked_polls: self.polls.unacked().copied().collect(),
            poller_running: self.poller.is_running(),
        }
    }
}

/// Immutable view of a [`SessionState`] published after every transition
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    pub phase: SessionPhase,
    pub is_connected: bool,
    pub is_in_room: bool,
    pub identity: Option<RoomIdentity>,
    pub users: Vec<Member>,
    pub host_id: Option<String>,
    pub me: Option<Member>,
    pub host_state: Option<TrackedHostState>,
    pub party_pausing: bool,
    pub messages: Vec<Message>,
    /// Smoothed round-trip time in milliseconds
    pub srtt: f64,
    pub unacked_polls: Vec<PollRecord>,
    pub poller_running: bool,
}

impl SessionSnapshot {
    pub fn host(&self) -> Option<&Member> {
        let host_id = self.host_id.as_deref()?;
        self.users.iter().find(|m| m.id == host_id)
    }
}
