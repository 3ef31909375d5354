//! Party-pausing: collective pause/resume arbitrated by the relay.
//!
//! The flag is replicated through the relay. A pause or resume request only
//! takes effect locally once the relay acknowledges it, and never while the
//! flag is off.

use serde_json::Value;

use crate::{
    domain::PlaybackAction,
    infrastructure::dto::{ClientEvent, is_truthy},
};

use super::state::SessionState;

/// Local toggle. Returns the notification to emit, if connected.
pub fn set_local(state: &mut SessionState, enabled: bool) -> Option<ClientEvent> {
    state.party_pausing = enabled;
    state
        .is_connected()
        .then_some(ClientEvent::PartyPausingChange(enabled))
}

/// Toggle coming from the relay; never echoed back
pub fn on_remote_change(state: &mut SessionState, enabled: bool) {
    state.party_pausing = enabled;
}

/// Ask the relay for a party-wide pause or resume.
///
/// `None` when not connected or party pausing is off; the request is dropped.
pub fn request(state: &SessionState, is_pause: bool) -> Option<ClientEvent> {
    (state.is_connected() && state.party_pausing)
        .then_some(ClientEvent::PartyPausingSend { is_pause })
}

/// Relay answer to a [`request`]: act only on a truthy ack while the flag is on
pub fn on_ack(state: &SessionState, is_pause: bool, args: &[Value]) -> Option<PlaybackAction> {
    let accepted = args.first().is_some_and(is_truthy);
    (state.party_pausing && accepted).then(|| PlaybackAction::from_intent(is_pause))
}

/// Party-wide pause or resume decided by the relay
pub fn on_broadcast(state: &SessionState, is_pause: bool) -> Option<PlaybackAction> {
    state
        .party_pausing
        .then(|| PlaybackAction::from_intent(is_pause))
}
