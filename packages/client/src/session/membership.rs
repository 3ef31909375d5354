//! Join handshake and roster seeding.

use tokio::time::Instant;

use crate::{
    config::ClientProfile,
    domain::RoomIdentity,
    error::ClientError,
    infrastructure::dto::{JoinRequest, JoinResult},
};

use super::state::SessionState;

/// Summary of an accepted join
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub identity: RoomIdentity,
    pub users: usize,
    pub party_pausing: bool,
}

pub fn build_join_request(profile: &ClientProfile, identity: &RoomIdentity) -> JoinRequest {
    JoinRequest {
        username: profile.username.clone(),
        room: identity.room.clone(),
        password: identity.password.clone(),
        avatar_url: profile.avatar_url.clone(),
        uuid: profile.uuid.clone(),
    }
}

/// Apply a `join-result` to the session.
///
/// A falsy result is a rejection and leaves the state untouched. A truthy one
/// replaces the roster with exactly the relay's list and starts the poller.
pub fn apply_join_result(
    state: &mut SessionState,
    identity: RoomIdentity,
    result: JoinResult,
    now: Instant,
) -> Result<JoinOutcome, ClientError> {
    if !result.success {
        return Err(ClientError::JoinRejected {
            room: identity.room,
            reason: result
                .details
                .unwrap_or_else(|| "no details given".to_string()),
        });
    }

    let users = result.current_users.len();
    state.enter_room(
        identity.clone(),
        result.current_users,
        result.party_pausing,
        now,
    );
    tracing::info!(
        "Joined room '{}' on {} with {} users",
        identity.room,
        identity.server,
        users
    );

    Ok(JoinOutcome {
        identity,
        users,
        party_pausing: result.party_pausing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::PollWindow,
        domain::Member,
        session::state::SessionPhase,
    };

    fn connected_state() -> SessionState {
        let mut state = SessionState::new(PollWindow::default());
        state.phase = SessionPhase::Connected;
        state
    }

    fn identity() -> RoomIdentity {
        RoomIdentity::new("wss://relay.example", "abc123", None)
    }

    #[test]
    fn test_join_request_carries_profile_and_room() {
        // テスト項目: join リクエストにユーザー情報と部屋情報が載る
        // given (前提条件):
        let profile = ClientProfile::new("alice").with_avatar_url("https://img/a.png");
        let identity = RoomIdentity::new("wss://relay.example", "abc123", Some("pw".into()));

        // when (操作):
        let request = build_join_request(&profile, &identity);

        // then (期待する結果):
        assert_eq!(request.username, "alice");
        assert_eq!(request.room, "abc123");
        assert_eq!(request.password.as_deref(), Some("pw"));
        assert_eq!(request.avatar_url.as_deref(), Some("https://img/a.png"));
        assert_eq!(request.uuid, profile.uuid);
    }

    #[test]
    fn test_successful_join_replaces_roster_exactly() {
        // テスト項目: 成功した join 後、参加者はサーバーの currentUsers と完全に一致する
        // given (前提条件):
        let mut state = connected_state();
        state.roster.replace(vec![Member::new("stale")]);
        assert!(!state.is_in_room());
        let result = JoinResult {
            success: true,
            details: None,
            current_users: vec![Member::new("u1")],
            party_pausing: false,
        };

        // when (操作):
        let outcome = apply_join_result(&mut state, identity(), result, Instant::now()).unwrap();

        // then (期待する結果):
        assert!(state.is_in_room());
        assert_eq!(state.roster.members(), &[Member::new("u1")]);
        assert_eq!(state.identity, Some(identity()));
        assert!(state.poller.is_running());
        assert_eq!(outcome.users, 1);
    }

    #[test]
    fn test_rejected_join_mutates_nothing() {
        // テスト項目: 拒否された join は状態を一切変更しない
        // given (前提条件):
        let mut state = connected_state();
        let result = JoinResult {
            success: false,
            details: Some("wrong password".to_string()),
            current_users: vec![Member::new("u1")],
            party_pausing: true,
        };

        // when (操作):
        let outcome = apply_join_result(&mut state, identity(), result, Instant::now());

        // then (期待する結果):
        match outcome {
            Err(ClientError::JoinRejected { room, reason }) => {
                assert_eq!(room, "abc123");
                assert_eq!(reason, "wrong password");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!state.is_in_room());
        assert!(state.roster.is_empty());
        assert!(!state.party_pausing);
        assert!(!state.poller.is_running());
        assert_eq!(state.identity, None);
    }
}
