//! Integration tests running the client against an in-process fake relay.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use lounge_client::{
    ClientConfig, ClientProfile, LoungeClient, PlaybackSettings, ReconnectPolicy, SessionNotice,
    domain::{PlaybackState, RoomIdentity},
    infrastructure::{dto::Frame, player::SimulatedPlayer},
};
use lounge_shared::time::SystemClock;
use serde_json::{Value, json};
use tokio::net::TcpListener;

const WAIT: Duration = Duration::from_secs(5);

/// Fake relay behavior and what it has seen
#[derive(Default)]
struct Relay {
    events: Mutex<Vec<String>>,
    /// Answer to every `party_pausing_send`
    accept_party_pause: AtomicBool,
    /// Close the first connection right after its join succeeded
    drop_first_connection: AtomicBool,
}

impl Relay {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

/// Helper struct to manage the fake relay lifecycle
struct TestRelay {
    state: Arc<Relay>,
    port: u16,
    task: tokio::task::JoinHandle<()>,
}

impl TestRelay {
    async fn start(relay: Relay) -> Self {
        let state = Arc::new(relay);
        let app = Router::new()
            .route("/socket", get(websocket_handler))
            .route("/health", get(health_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let task = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { state, port, task }
    }

    fn server(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "load": 0 }))
}

async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<Relay>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn users() -> Value {
    json!([
        {"id": "host", "username": "host", "isHost": true},
        {"id": "me", "username": "alice"}
    ])
}

async fn send(socket: &mut WebSocket, frame: Frame) -> bool {
    let text = frame.encode().unwrap();
    socket.send(Message::Text(text.into())).await.is_ok()
}

async fn handle_socket(mut socket: WebSocket, state: Arc<Relay>) {
    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(Frame::Event { name, args, ack_id }) = Frame::decode(text.as_str()) else {
            continue;
        };
        state.events.lock().unwrap().push(name.clone());
        let arg = args.first().cloned().unwrap_or(Value::Null);

        let delivered = match name.as_str() {
            "join" => {
                let reply = Frame::event(
                    "join-result",
                    vec![json!(true), json!({}), json!(null), users(), json!(false)],
                );
                let delivered = send(&mut socket, reply).await;
                if state.drop_first_connection.swap(false, Ordering::SeqCst) {
                    // Vanish without a closing handshake
                    return;
                }
                delivered
            }
            "poll" => {
                let reply = Frame::event(
                    "poll-result",
                    vec![users(), json!({"id": "me", "username": "alice"}), arg["commandId"].clone()],
                );
                send(&mut socket, reply).await
            }
            "party_pausing_send" => match ack_id {
                Some(ack_id) => {
                    let accepted = state.accept_party_pause.load(Ordering::SeqCst);
                    let ack = Frame::Ack {
                        ack_id,
                        args: vec![json!(accepted)],
                    };
                    send(&mut socket, ack).await
                }
                None => true,
            },
            _ => true,
        };

        if !delivered {
            break;
        }
    }
}

fn client(config: ClientConfig) -> (LoungeClient, Arc<SimulatedPlayer>) {
    let clock = Arc::new(SystemClock);
    let player = Arc::new(SimulatedPlayer::new(clock.clone()));
    let config = config.with_playback(PlaybackSettings {
        client_poll_interval: Duration::from_millis(20),
        ..PlaybackSettings::default()
    });
    let client = LoungeClient::new(config, ClientProfile::new("alice"), player.clone())
        .with_clock(clock);
    (client, player)
}

#[tokio::test]
async fn test_join_and_poll_over_websocket() {
    // テスト項目: 実際のソケット越しに入室し、poll の往復で SRTT と自分の情報が更新される
    // given (前提条件):
    let relay = TestRelay::start(Relay::default()).await;
    let (mut client, _player) = client(ClientConfig::default());
    let identity = RoomIdentity::new(relay.server(), "abc123", None);

    // when (操作):
    let outcome = client.connect_and_join(identity.clone()).await.unwrap();
    let mut snapshots = client.subscribe();
    let snapshot = tokio::time::timeout(WAIT, snapshots.wait_for(|s| s.me.is_some()))
        .await
        .unwrap()
        .unwrap()
        .clone();

    // then (期待する結果):
    assert_eq!(outcome.users, 2);
    assert!(snapshot.is_in_room);
    assert_eq!(snapshot.host_id.as_deref(), Some("host"));
    assert_eq!(snapshot.me.map(|m| m.id), Some("me".to_string()));
    assert!(snapshot.srtt >= 0.0);
    assert_eq!(client.recent_rooms().entries()[0].room, "abc123");

    client.disconnect().await.unwrap();
    let events = relay.state.events();
    assert_eq!(events.first().map(String::as_str), Some("join"));
    assert!(events.iter().any(|e| e == "poll"));

    // 切断後は poll が送られない
    let after_disconnect = relay.state.events().len();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(relay.state.events().len(), after_disconnect);
    assert!(!client.snapshot().is_connected);
}

#[tokio::test]
async fn test_party_pause_acknowledged_by_relay() {
    // テスト項目: リレーが ack=true を返すと、ローカルのプレイヤーが一時停止する
    // given (前提条件):
    let relay = TestRelay::start(Relay {
        accept_party_pause: AtomicBool::new(true),
        ..Relay::default()
    })
    .await;
    let (mut client, player) = client(ClientConfig::default());
    client
        .connect_and_join(RoomIdentity::new(relay.server(), "abc123", None))
        .await
        .unwrap();
    lounge_client::PlayerClient::press_play(player.as_ref())
        .await
        .unwrap();
    client.set_party_pausing(true).unwrap();

    // when (操作):
    client.send_party_pause(true).unwrap();

    // then (期待する結果):
    tokio::time::timeout(WAIT, async {
        while player.state().await != PlaybackState::Paused {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    let events = relay.state.events();
    assert!(events.iter().any(|e| e == "party_pausing_change"));
    assert!(events.iter().any(|e| e == "party_pausing_send"));

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_party_pause_rejected_by_relay() {
    // テスト項目: リレーが ack=false を返すと、ローカルのプレイヤーは再生を続ける
    // given (前提条件):
    let relay = TestRelay::start(Relay::default()).await;
    let (mut client, player) = client(ClientConfig::default());
    client
        .connect_and_join(RoomIdentity::new(relay.server(), "abc123", None))
        .await
        .unwrap();
    lounge_client::PlayerClient::press_play(player.as_ref())
        .await
        .unwrap();
    client.set_party_pausing(true).unwrap();

    // when (操作):
    client.send_party_pause(true).unwrap();
    tokio::time::timeout(WAIT, async {
        while !relay.state.events().iter().any(|e| e == "party_pausing_send") {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // then (期待する結果):
    assert_eq!(player.state().await, PlaybackState::Playing);

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_dropped_connection_rejoins_room() {
    // テスト項目: リレーとの接続が切れると再接続し、同じ部屋に自動で再入室する
    // given (前提条件):
    let relay = TestRelay::start(Relay {
        drop_first_connection: AtomicBool::new(true),
        ..Relay::default()
    })
    .await;
    let config = ClientConfig::default().with_reconnect(ReconnectPolicy {
        max_attempts: 3,
        interval: Duration::from_millis(50),
    });
    let (mut client, _player) = client(config);
    let mut notices = client.take_notices().unwrap();

    // when (操作):
    client
        .connect_and_join(RoomIdentity::new(relay.server(), "abc123", None))
        .await
        .unwrap();

    // then (期待する結果):
    let rejoined = tokio::time::timeout(WAIT, async {
        while let Some(notice) = notices.recv().await {
            if let SessionNotice::Rejoined { identity, users } = notice {
                return Some((identity, users));
            }
        }
        None
    })
    .await
    .unwrap();
    let (identity, users) = rejoined.unwrap();
    assert_eq!(identity.room, "abc123");
    assert_eq!(users, 2);

    let joins = relay
        .state
        .events()
        .iter()
        .filter(|e| e.as_str() == "join")
        .count();
    assert_eq!(joins, 2);
    assert!(client.snapshot().is_in_room);

    client.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_health_probe_and_create_room() {
    // テスト項目: health を確認したリレーの中から選んで新しい部屋を作成できる
    // given (前提条件):
    let relay = TestRelay::start(Relay::default()).await;
    let config = ClientConfig::default().with_servers(vec![
        relay.server(),
        "http://127.0.0.1:1".to_string(),
    ]);
    let (mut client, _player) = client(config);

    // when (操作):
    let healths = client.fetch_servers_health().await.to_vec();
    let outcome = client.create_and_join_room().await.unwrap();

    // then (期待する結果):
    assert_eq!(healths.len(), 1);
    assert_eq!(healths[0].url, relay.server());
    assert_eq!(healths[0].details.get("load"), Some(&json!(0)));
    assert_eq!(outcome.identity.server, relay.server());
    assert_eq!(outcome.identity.password, None);
    assert!(uuid_like(&outcome.identity.room));

    client.disconnect().await.unwrap();
}

fn uuid_like(room: &str) -> bool {
    room.len() == 36 && room.chars().filter(|c| *c == '-').count() == 4
}
