//! High-level client: one live session at a time, plus recent rooms and
//! relay health.

use std::sync::Arc;

use lounge_shared::time::{Clock, SystemClock};
use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use crate::{
    collaborator::{LiveSettings, PlayerClient, SettingsSource},
    config::{ClientConfig, ClientProfile},
    domain::{RecentRoom, RecentRooms, RoomIdentity},
    error::ClientError,
    infrastructure::{
        health::{HealthChecker, ServerHealth, best_server},
        transport::{Connector, WebSocketConnector},
    },
    session::{
        Collaborators, Command, JoinOutcome, Observers, SessionEngine, SessionHandle,
        SessionNotice, SessionSnapshot,
    },
};

pub struct LoungeClient {
    config: ClientConfig,
    profile: ClientProfile,
    collaborators: Collaborators,
    observers: Observers,
    notices: Option<mpsc::UnboundedReceiver<SessionNotice>>,
    session: Option<SessionHandle>,
    recent_rooms: RecentRooms,
    health: HealthChecker,
}

impl LoungeClient {
    /// Client talking websocket, with settings seeded from `config`
    pub fn new(config: ClientConfig, profile: ClientProfile, player: Arc<dyn PlayerClient>) -> Self {
        let (snapshots, _) = watch::channel(SessionSnapshot::default());
        let (notices_tx, notices) = mpsc::unbounded_channel();
        let collaborators = Collaborators {
            player,
            settings: Arc::new(LiveSettings::new(config.playback)),
            connector: Arc::new(WebSocketConnector),
            clock: Arc::new(SystemClock),
        };
        let health = HealthChecker::new(config.health_timeout);

        Self {
            config,
            profile,
            collaborators,
            observers: Observers {
                snapshots: Arc::new(snapshots),
                notices: notices_tx,
            },
            notices: Some(notices),
            session: None,
            recent_rooms: RecentRooms::default(),
            health,
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: Arc<dyn SettingsSource>) -> Self {
        self.collaborators.settings = settings;
        self
    }

    #[must_use]
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.collaborators.connector = connector;
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.collaborators.clock = clock;
        self
    }

    /// Start from a previously persisted history
    #[must_use]
    pub fn with_recent_rooms(mut self, recent_rooms: RecentRooms) -> Self {
        self.recent_rooms = recent_rooms;
        self
    }

    pub fn profile(&self) -> &ClientProfile {
        &self.profile
    }

    // ========================================
    // Session lifecycle
    // ========================================

    /// Connect to `server`, tearing down any existing session first
    pub async fn connect(&mut self, server: &str) -> Result<(), ClientError> {
        if self.session.is_some() {
            tracing::info!("Tearing down the previous session");
            if let Err(e) = self.disconnect().await {
                tracing::warn!("Previous session did not close cleanly: {}", e);
            }
        }

        let engine = SessionEngine::establish(
            server,
            self.config.clone(),
            self.profile.clone(),
            self.collaborators.clone(),
            self.observers.clone(),
        )
        .await?;
        self.session = Some(engine.spawn());
        Ok(())
    }

    /// Join a room on the connected relay
    pub async fn join_room(&self, identity: RoomIdentity) -> Result<JoinOutcome, ClientError> {
        self.session()?
            .join(identity, self.config.join_timeout)
            .await
    }

    /// Connect to the room's server, join it and remember it as a recent room
    pub async fn connect_and_join(
        &mut self,
        identity: RoomIdentity,
    ) -> Result<JoinOutcome, ClientError> {
        self.connect(&identity.server).await?;
        let outcome = self.join_room(identity.clone()).await?;
        let now = self.collaborators.clock.now_millis();
        self.recent_rooms
            .add(RecentRoom::from_identity(&identity, now));
        Ok(outcome)
    }

    /// Join a fresh room on the fastest healthy relay
    pub async fn create_and_join_room(&mut self) -> Result<JoinOutcome, ClientError> {
        let servers = self.config.servers.clone();
        let healths = self.health.get_or_fetch(&servers).await;
        let server = best_server(healths)?.url.clone();
        let identity = RoomIdentity::new(server, Uuid::new_v4().to_string(), None);
        self.connect_and_join(identity).await
    }

    /// End the session and wait for the relay to confirm
    pub async fn disconnect(&mut self) -> Result<(), ClientError> {
        match self.session.take() {
            Some(session) => session.disconnect().await,
            None => Ok(()),
        }
    }

    // ========================================
    // In-room actions
    // ========================================

    pub fn send_message(&self, msg: impl Into<String>) -> Result<(), ClientError> {
        self.session()?.send(Command::SendMessage(msg.into()))
    }

    pub fn transfer_host(&self, username: impl Into<String>) -> Result<(), ClientError> {
        self.session()?.send(Command::TransferHost(username.into()))
    }

    pub fn set_party_pausing(&self, enabled: bool) -> Result<(), ClientError> {
        self.session()?.send(Command::SetPartyPausing(enabled))
    }

    /// Ask the room to pause (`true`) or resume (`false`) together
    pub fn send_party_pause(&self, is_pause: bool) -> Result<(), ClientError> {
        self.session()?.send(Command::SendPartyPause { is_pause })
    }

    fn session(&self) -> Result<&SessionHandle, ClientError> {
        self.session.as_ref().ok_or(ClientError::NotConnected)
    }

    // ========================================
    // Observation
    // ========================================

    pub fn snapshot(&self) -> SessionSnapshot {
        self.observers.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.observers.snapshots.subscribe()
    }

    /// Notice stream; can be taken once
    pub fn take_notices(&mut self) -> Option<mpsc::UnboundedReceiver<SessionNotice>> {
        self.notices.take()
    }

    // ========================================
    // Recent rooms and relay health
    // ========================================

    pub fn recent_rooms(&self) -> &RecentRooms {
        &self.recent_rooms
    }

    pub fn remove_recent_room(&mut self, room: &RecentRoom) {
        self.recent_rooms.remove(room);
    }

    /// Probe every configured relay again
    pub async fn fetch_servers_health(&mut self) -> &[ServerHealth] {
        self.health.refresh(&self.config.servers).await
    }

    /// Cached relay health, probing only if nothing is cached
    pub async fn get_or_fetch_servers_health(&mut self) -> &[ServerHealth] {
        self.health.get_or_fetch(&self.config.servers).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lounge_shared::time::ManualClock;
    use serde_json::{Value, json};
    use tokio::task::JoinHandle;

    use super::*;
    use crate::{
        infrastructure::{
            dto::Frame,
            player::SimulatedPlayer,
            transport::{ChannelConnector, ChannelPeer},
        },
        session::SessionPhase,
    };

    fn client(connector: &ChannelConnector, config: ClientConfig) -> LoungeClient {
        let clock = Arc::new(ManualClock::new(1_000));
        LoungeClient::new(
            config,
            ClientProfile::new("alice"),
            Arc::new(SimulatedPlayer::new(clock.clone())),
        )
        .with_connector(Arc::new(connector.clone()))
        .with_clock(clock)
    }

    /// Relay that accepts every join and confirms the close
    fn accepting_relay(mut peer: ChannelPeer, users: Value) -> JoinHandle<Vec<String>> {
        tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(text) = peer.outbound.recv().await {
                let Ok(Frame::Event { name, .. }) = Frame::decode(&text) else {
                    continue;
                };
                if name == "join" {
                    let reply = Frame::event(
                        "join-result",
                        vec![json!(true), json!({}), json!(null), users.clone(), json!(false)],
                    );
                    let _ = peer.inbound.send(reply.encode().unwrap());
                }
                seen.push(name);
            }
            seen
        })
    }

    #[tokio::test]
    async fn test_connect_and_join_records_recent_room() {
        // テスト項目: 参加に成功すると最近の部屋の先頭に記録される
        // given (前提条件):
        let connector = ChannelConnector::new();
        let relay = accepting_relay(connector.push_pair(), json!([{"id": "u1"}]));
        let mut client = client(&connector, ClientConfig::default());
        let identity = RoomIdentity::new("wss://relay.example", "abc123", None);

        // when (操作):
        let outcome = client.connect_and_join(identity).await.unwrap();

        // then (期待する結果):
        assert_eq!(outcome.users, 1);
        let snapshot = client.snapshot();
        assert!(snapshot.is_in_room);
        assert_eq!(snapshot.users.len(), 1);
        let recent = client.recent_rooms().entries();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].server, "wss://relay.example");
        assert_eq!(recent[0].room, "abc123");
        assert_eq!(recent[0].password, None);
        assert_eq!(recent[0].time, 1_000);

        client.disconnect().await.unwrap();
        let seen = relay.await.unwrap();
        assert_eq!(seen.first().map(String::as_str), Some("join"));
        assert_eq!(client.snapshot().phase, SessionPhase::Disconnected);
    }

    #[tokio::test]
    async fn test_connect_tears_down_previous_session() {
        // テスト項目: 新しい接続の前に既存のセッションが切断される
        // given (前提条件):
        let connector = ChannelConnector::new();
        let first = accepting_relay(connector.push_pair(), json!([]));
        let _second = accepting_relay(connector.push_pair(), json!([]));
        let mut client = client(&connector, ClientConfig::default());
        client.connect("wss://relay.example").await.unwrap();

        // when (操作):
        client.connect("wss://relay.example").await.unwrap();

        // then (期待する結果):
        // 最初のリレーは接続が閉じられたことで終了している
        let seen = tokio::time::timeout(Duration::from_secs(1), first)
            .await
            .unwrap()
            .unwrap();
        assert!(seen.is_empty());
        assert!(client.snapshot().is_connected);
    }

    #[tokio::test]
    async fn test_join_without_connection_fails() {
        // テスト項目: 未接続で join すると NotConnected になる
        // given (前提条件):
        let connector = ChannelConnector::new();
        let client = client(&connector, ClientConfig::default());

        // when (操作):
        let result = client
            .join_room(RoomIdentity::new("wss://relay.example", "abc123", None))
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(ClientError::NotConnected)));
        assert!(matches!(
            client.send_message("hi"),
            Err(ClientError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_join_times_out_when_relay_is_silent() {
        // テスト項目: join-result が来なければ JoinTimeout になり、最近の部屋にも記録されない
        // given (前提条件):
        let connector = ChannelConnector::new();
        let _silent = connector.push_pair();
        let config = ClientConfig::default()
            .with_join_timeout(Duration::from_millis(30))
            .with_disconnect_timeout(Duration::from_millis(30));
        let mut client = client(&connector, config);

        // when (操作):
        let result = client
            .connect_and_join(RoomIdentity::new("wss://relay.example", "abc123", None))
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(ClientError::JoinTimeout(_))));
        assert!(client.recent_rooms().is_empty());
        assert!(!client.snapshot().is_in_room);
    }

    #[tokio::test]
    async fn test_connect_failure_is_surfaced() {
        // テスト項目: 接続できない場合 ConnectionError が返り、状態は Disconnected
        // given (前提条件):
        let connector = ChannelConnector::new();
        let mut client = client(&connector, ClientConfig::default());

        // when (操作):
        let result = client.connect("wss://relay.example").await;

        // then (期待する結果):
        assert!(matches!(result, Err(ClientError::ConnectionError(_))));
        assert_eq!(client.snapshot().phase, SessionPhase::Disconnected);
    }

    #[tokio::test]
    async fn test_create_and_join_without_servers() {
        // テスト項目: 健全なリレーが無ければ部屋を作成できない
        // given (前提条件):
        let connector = ChannelConnector::new();
        let mut client = client(&connector, ClientConfig::default());

        // when (操作):
        let result = client.create_and_join_room().await;

        // then (期待する結果):
        assert!(matches!(result, Err(ClientError::NoHealthyServer)));
    }

    #[tokio::test]
    async fn test_notices_can_be_taken_once() {
        // テスト項目: 通知ストリームは一度だけ取り出せる
        // given (前提条件):
        let connector = ChannelConnector::new();
        let mut client = client(&connector, ClientConfig::default());

        // when (操作):
        let first = client.take_notices();
        let second = client.take_notices();

        // then (期待する結果):
        assert!(first.is_some());
        assert!(second.is_none());
    }
}
