//! Routes inbound relay events to state transitions.
//!
//! `dispatch` never touches the transport or the player; whatever has to
//! happen outside the state is returned as [`Reaction`]s for the engine.

use crate::{
    domain::{Member, PlaybackAction, RoomIdentity, TrackedHostState},
    infrastructure::dto::{PollResult, RosterChange, ServerEvent},
};

use super::{
    notice::SessionNotice,
    party_pause,
    state::{SessionPhase, SessionState},
};

/// Follow-up work produced by an event
#[derive(Debug, Clone, PartialEq)]
pub enum Reaction {
    /// Rejoin the last room on the fresh transport
    Rejoin(RoomIdentity),
    /// Drive the local player
    Playback(PlaybackAction),
    /// The transport is gone; the engine decides about re-establishing it
    TransportLost { reason: String },
    Notice(SessionNotice),
}

/// Apply one inbound event to the session.
///
/// `join-result` is not routed here: it only means something to the pending
/// join it answers.
pub fn dispatch(state: &mut SessionState, event: ServerEvent, now_millis: i64) -> Vec<Reaction> {
    tracing::debug!("Dispatching '{}'", event.name());

    match event {
        ServerEvent::JoinResult(_) => {
            tracing::warn!("Ignoring join-result without a pending join");
            Vec::new()
        }
        ServerEvent::PollResult(result) => on_poll_result(state, result, now_millis),
        ServerEvent::PartyPausingChanged(enabled) => {
            party_pause::on_remote_change(state, enabled);
            vec![Reaction::Notice(SessionNotice::PartyPausingChanged(enabled))]
        }
        ServerEvent::PartyPausingPause { is_pause } => {
            match party_pause::on_broadcast(state, is_pause) {
                Some(action) => vec![Reaction::Playback(action)],
                None => {
                    tracing::debug!("Party pausing is off, ignoring party pause");
                    Vec::new()
                }
            }
        }
        ServerEvent::UserJoined(change) => on_roster_change(state, change, SessionNotice::UserJoined),
        ServerEvent::UserLeft(change) => on_roster_change(state, change, SessionNotice::UserLeft),
        ServerEvent::HostSwap(user) => {
            state.roster.mark_host(&user.id);
            state.host_id = Some(user.id.clone());
            tracing::info!("Host is now '{}'", user.display_name());
            vec![Reaction::Notice(SessionNotice::HostChanged(user))]
        }
        ServerEvent::HostUpdate(host_state) => {
            state.host_state = Some(TrackedHostState {
                state: host_state,
                received_at: now_millis,
            });
            Vec::new()
        }
        ServerEvent::NewMessage(message) => {
            state.messages.push(message.clone());
            vec![Reaction::Notice(SessionNotice::NewMessage(message))]
        }
        ServerEvent::Connect => {
            tracing::info!("Transport connected");
            state.phase = SessionPhase::Connected;
            state
                .identity
                .clone()
                .map(Reaction::Rejoin)
                .into_iter()
                .collect()
        }
        ServerEvent::Disconnect { reason } => {
            tracing::warn!("Transport lost: {}", reason);
            state.on_transport_lost(false);
            vec![Reaction::TransportLost { reason }]
        }
    }
}

fn on_poll_result(state: &mut SessionState, result: PollResult, now_millis: i64) -> Vec<Reaction> {
    let Some(command_id) = result.command_id else {
        tracing::warn!("Ignoring poll-result without a commandId");
        return Vec::new();
    };
    // Results for polls this session no longer tracks describe a stale roster
    let Some(sample) = state.polls.acknowledge(command_id, now_millis) else {
        tracing::warn!("Ignoring result for unknown poll {}", command_id);
        return Vec::new();
    };
    tracing::debug!(
        "Poll {} answered after {}ms (srtt {:.1}ms)",
        command_id,
        sample,
        state.polls.srtt()
    );

    if state.is_in_room() {
        state.roster.replace(result.users);
        if result.me.is_some() {
            state.me = result.me;
        }
    }
    Vec::new()
}

fn on_roster_change(
    state: &mut SessionState,
    change: RosterChange,
    notice: fn(Member) -> SessionNotice,
) -> Vec<Reaction> {
    if !state.is_in_room() {
        tracing::debug!("Not in a room, ignoring roster change");
        return Vec::new();
    }
    state.roster.replace(change.users);
    vec![Reaction::Notice(notice(change.user))]
}
