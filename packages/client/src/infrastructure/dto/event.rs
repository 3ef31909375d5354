//! Typed relay events.
//!
//! Inbound events are decoded from a frame's name and positional arguments and
//! validated here, so nothing past this module handles raw JSON.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    domain::{HostState, Member, Message, PlayerState, SyncStatus},
    error::ProtocolError,
};

use super::frame::{Frame, is_truthy};

/// Event names on the wire
pub mod names {
    pub const JOIN: &str = "join";
    pub const SEND_MESSAGE: &str = "send_message";
    pub const TRANSFER_HOST: &str = "transfer_host";
    pub const PARTY_PAUSING_CHANGE: &str = "party_pausing_change";
    pub const PARTY_PAUSING_SEND: &str = "party_pausing_send";
    pub const POLL: &str = "poll";

    pub const JOIN_RESULT: &str = "join-result";
    pub const POLL_RESULT: &str = "poll-result";
    pub const PARTY_PAUSING_CHANGED: &str = "party-pausing-changed";
    pub const PARTY_PAUSING_PAUSE: &str = "party-pausing-pause";
    pub const USER_JOINED: &str = "user-joined";
    pub const USER_LEFT: &str = "user-left";
    pub const HOST_SWAP: &str = "host-swap";
    pub const HOST_UPDATE: &str = "host-update";
    pub const NEW_MESSAGE: &str = "new_message";
}

// ========================================
// Outbound payloads
// ========================================

/// `join` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub username: String,
    pub room: String,
    pub password: Option<String>,
    pub avatar_url: Option<String>,
    pub uuid: String,
}

/// `send_message` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub msg: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// `transfer_host` payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferHostRequest {
    pub username: String,
}

/// `poll` payload: the sampled player state plus correlation data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollPayload {
    #[serde(flatten)]
    pub player: PlayerState,
    pub status: SyncStatus,
    pub uuid: String,
    pub command_id: u64,
    /// Half of the sender's SRTT in milliseconds
    pub latency: f64,
}

/// Events the client emits
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Join(JoinRequest),
    SendMessage(OutgoingMessage),
    TransferHost(TransferHostRequest),
    PartyPausingChange(bool),
    PartyPausingSend { is_pause: bool },
    Poll(PollPayload),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join(_) => names::JOIN,
            Self::SendMessage(_) => names::SEND_MESSAGE,
            Self::TransferHost(_) => names::TRANSFER_HOST,
            Self::PartyPausingChange(_) => names::PARTY_PAUSING_CHANGE,
            Self::PartyPausingSend { .. } => names::PARTY_PAUSING_SEND,
            Self::Poll(_) => names::POLL,
        }
    }

    /// Wrap the event in a frame, optionally expecting an ack
    pub fn into_frame(self, ack_id: Option<u64>) -> Result<Frame, ProtocolError> {
        let name = self.name().to_string();
        let arg = match self {
            Self::Join(request) => serde_json::to_value(request)?,
            Self::SendMessage(message) => serde_json::to_value(message)?,
            Self::TransferHost(request) => serde_json::to_value(request)?,
            Self::PartyPausingChange(value) => Value::Bool(value),
            Self::PartyPausingSend { is_pause } => Value::Bool(is_pause),
            Self::Poll(payload) => serde_json::to_value(payload)?,
        };
        Ok(Frame::Event {
            name,
            args: vec![arg],
            ack_id,
        })
    }
}

// ========================================
// Inbound payloads
// ========================================

/// `join-result(success, data, details, currentUsers, partyPausing)`
#[derive(Debug, Clone, PartialEq)]
pub struct JoinResult {
    pub success: bool,
    /// Human-readable detail, mostly set on rejection
    pub details: Option<String>,
    pub current_users: Vec<Member>,
    pub party_pausing: bool,
}

/// `poll-result(users, me, commandId)`
#[derive(Debug, Clone, PartialEq)]
pub struct PollResult {
    pub users: Vec<Member>,
    pub me: Option<Member>,
    pub command_id: Option<u64>,
}

/// `user-joined(users, user)` / `user-left(users, user)`
#[derive(Debug, Clone, PartialEq)]
pub struct RosterChange {
    pub users: Vec<Member>,
    pub user: Member,
}

/// Events the client reacts to.
///
/// `Connect` and `Disconnect` are raised by the transport layer, never by
/// the relay itself.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    JoinResult(JoinResult),
    PollResult(PollResult),
    PartyPausingChanged(bool),
    PartyPausingPause { is_pause: bool },
    UserJoined(RosterChange),
    UserLeft(RosterChange),
    HostSwap(Member),
    HostUpdate(HostState),
    NewMessage(Message),
    Connect,
    Disconnect { reason: String },
}

/// Cursor over positional arguments; missing arguments read as `null`.
struct Args {
    event: &'static str,
    values: std::vec::IntoIter<Value>,
}

impl Args {
    fn new(event: &'static str, values: Vec<Value>) -> Self {
        Self {
            event,
            values: values.into_iter(),
        }
    }

    fn next_raw(&mut self) -> Value {
        self.values.next().unwrap_or(Value::Null)
    }

    fn next<T: DeserializeOwned>(&mut self) -> Result<T, ProtocolError> {
        let value = self.next_raw();
        serde_json::from_value(value).map_err(|source| ProtocolError::InvalidPayload {
            event: self.event.to_string(),
            source,
        })
    }

    fn next_truthy(&mut self) -> bool {
        is_truthy(&self.next_raw())
    }

    /// Lists that may be absent read as empty
    fn next_list<T: DeserializeOwned>(&mut self) -> Result<Vec<T>, ProtocolError> {
        Ok(self.next::<Option<Vec<T>>>()?.unwrap_or_default())
    }
}

impl ServerEvent {
    /// Decode a relay event from its name and positional arguments
    pub fn decode(name: &str, args: Vec<Value>) -> Result<Self, ProtocolError> {
        match name {
            names::JOIN_RESULT => {
                let mut args = Args::new(names::JOIN_RESULT, args);
                let success = args.next_truthy();
                let _data = args.next_raw();
                let details = describe(args.next_raw());
                let current_users = args.next_list()?;
                let party_pausing = args.next_truthy();
                Ok(Self::JoinResult(JoinResult {
                    success,
                    details,
                    current_users,
                    party_pausing,
                }))
            }
            names::POLL_RESULT => {
                let mut args = Args::new(names::POLL_RESULT, args);
                Ok(Self::PollResult(PollResult {
                    users: args.next_list()?,
                    me: args.next()?,
                    command_id: args.next()?,
                }))
            }
            names::PARTY_PAUSING_CHANGED => {
                let mut args = Args::new(names::PARTY_PAUSING_CHANGED, args);
                Ok(Self::PartyPausingChanged(args.next_truthy()))
            }
            names::PARTY_PAUSING_PAUSE => {
                let mut args = Args::new(names::PARTY_PAUSING_PAUSE, args);
                Ok(Self::PartyPausingPause {
                    is_pause: args.next_truthy(),
                })
            }
            names::USER_JOINED => {
                let mut args = Args::new(names::USER_JOINED, args);
                Ok(Self::UserJoined(RosterChange {
                    users: args.next_list()?,
                    user: args.next()?,
                }))
            }
            names::USER_LEFT => {
                let mut args = Args::new(names::USER_LEFT, args);
                Ok(Self::UserLeft(RosterChange {
                    users: args.next_list()?,
                    user: args.next()?,
                }))
            }
            names::HOST_SWAP => {
                let mut args = Args::new(names::HOST_SWAP, args);
                Ok(Self::HostSwap(args.next()?))
            }
            names::HOST_UPDATE => {
                let mut args = Args::new(names::HOST_UPDATE, args);
                Ok(Self::HostUpdate(args.next()?))
            }
            names::NEW_MESSAGE => {
                let mut args = Args::new(names::NEW_MESSAGE, args);
                Ok(Self::NewMessage(args.next()?))
            }
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::JoinResult(_) => names::JOIN_RESULT,
            Self::PollResult(_) => names::POLL_RESULT,
            Self::PartyPausingChanged(_) => names::PARTY_PAUSING_CHANGED,
            Self::PartyPausingPause { .. } => names::PARTY_PAUSING_PAUSE,
            Self::UserJoined(_) => names::USER_JOINED,
            Self::UserLeft(_) => names::USER_LEFT,
            Self::HostSwap(_) => names::HOST_SWAP,
            Self::HostUpdate(_) => names::HOST_UPDATE,
            Self::NewMessage(_) => names::NEW_MESSAGE,
            Self::Connect => "connect",
            Self::Disconnect { .. } => "disconnect",
        }
    }
}

/// Render an opaque `details` argument as text
fn describe(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PlaybackState;
    use serde_json::json;

    #[test]
    fn test_decode_successful_join_result() {
        // テスト項目: 成功した join-result から参加者と party pausing が取り出される
        // given (前提条件):
        let args = vec![json!(true), json!({}), json!(null), json!([{"id": "u1"}]), json!(true)];

        // when (操作):
        let event = ServerEvent::decode("join-result", args).unwrap();

        // then (期待する結果):
        assert_eq!(
            event,
            ServerEvent::JoinResult(JoinResult {
                success: true,
                details: None,
                current_users: vec![Member::new("u1")],
                party_pausing: true,
            })
        );
    }

    #[test]
    fn test_decode_rejected_join_result_with_details() {
        // テスト項目: 失敗した join-result は success=false と詳細を持つ
        // given (前提条件):
        let args = vec![json!(false), json!(null), json!("wrong password")];

        // when (操作):
        let event = ServerEvent::decode("join-result", args).unwrap();

        // then (期待する結果):
        let ServerEvent::JoinResult(result) = event else {
            panic!("expected join-result");
        };
        assert!(!result.success);
        assert_eq!(result.details.as_deref(), Some("wrong password"));
        assert!(result.current_users.is_empty());
        assert!(!result.party_pausing);
    }

    #[test]
    fn test_decode_poll_result() {
        // テスト項目: poll-result の commandId が取り出される
        // given (前提条件):
        let args = vec![json!([{"id": "u1"}, {"id": "u2"}]), json!({"id": "u2"}), json!(4)];

        // when (操作):
        let event = ServerEvent::decode("poll-result", args).unwrap();

        // then (期待する結果):
        let ServerEvent::PollResult(result) = event else {
            panic!("expected poll-result");
        };
        assert_eq!(result.users.len(), 2);
        assert_eq!(result.me, Some(Member::new("u2")));
        assert_eq!(result.command_id, Some(4));
    }

    #[test]
    fn test_decode_host_update() {
        // テスト項目: host-update の状態が復元できる
        // given (前提条件):
        let args = vec![json!({"time": 1500.0, "state": "playing"})];

        // when (操作):
        let event = ServerEvent::decode("host-update", args).unwrap();

        // then (期待する結果):
        let ServerEvent::HostUpdate(state) = event else {
            panic!("expected host-update");
        };
        assert_eq!(state.time, Some(1500.0));
        assert_eq!(state.state, PlaybackState::Playing);
        assert_eq!(state.playback_rate, 1.0);
    }

    #[test]
    fn test_decode_user_joined_without_user_is_invalid() {
        // テスト項目: user 引数が欠けた user-joined は不正なペイロードになる
        // given (前提条件):
        let args = vec![json!([{"id": "u1"}])];

        // when (操作):
        let result = ServerEvent::decode("user-joined", args);

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidPayload { ref event, .. }) if event == "user-joined"
        ));
    }

    #[test]
    fn test_decode_unknown_event() {
        // テスト項目: 未知のイベント名はエラーになる
        // given (前提条件):
        let args = vec![];

        // when (操作):
        let result = ServerEvent::decode("kick", args);

        // then (期待する結果):
        assert!(matches!(result, Err(ProtocolError::UnknownEvent(name)) if name == "kick"));
    }

    #[test]
    fn test_poll_event_flattens_player_state() {
        // テスト項目: poll のペイロードはプレイヤー状態と相関データが同じ階層に並ぶ
        // given (前提条件):
        let event = ClientEvent::Poll(PollPayload {
            player: PlayerState::new(PlaybackState::Paused, Some(2000.0)),
            status: SyncStatus::Good,
            uuid: "me".to_string(),
            command_id: 9,
            latency: 60.0,
        });

        // when (操作):
        let frame = event.into_frame(None).unwrap();

        // then (期待する結果):
        let Frame::Event { name, args, ack_id } = frame else {
            panic!("expected event frame");
        };
        assert_eq!(name, "poll");
        assert_eq!(ack_id, None);
        assert_eq!(args[0]["time"], 2000.0);
        assert_eq!(args[0]["state"], "paused");
        assert_eq!(args[0]["commandId"], 9);
        assert_eq!(args[0]["latency"], 60.0);
        assert_eq!(args[0]["status"], "good");
        assert_eq!(args[0]["uuid"], "me");
    }

    #[test]
    fn test_join_request_field_names() {
        // テスト項目: join のペイロードが camelCase のフィールド名を持つ
        // given (前提条件):
        let event = ClientEvent::Join(JoinRequest {
            username: "alice".to_string(),
            room: "abc123".to_string(),
            password: None,
            avatar_url: Some("https://img/a.png".to_string()),
            uuid: "uuid-1".to_string(),
        });

        // when (操作):
        let frame = event.into_frame(None).unwrap();

        // then (期待する結果):
        let Frame::Event { args, .. } = frame else {
            panic!("expected event frame");
        };
        assert_eq!(
            args[0],
            json!({
                "username": "alice",
                "room": "abc123",
                "password": null,
                "avatarUrl": "https://img/a.png",
                "uuid": "uuid-1"
            })
        );
    }
}
