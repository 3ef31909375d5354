//! The session engine: one actor per relay connection.
//!
//! All state lives in the engine task. Commands, inbound frames, poll ticks
//! and reconnect attempts are handled one at a time by a single `select!`
//! loop, so no two reactions ever overlap.

use std::sync::Arc;

use lounge_shared::time::Clock;
use tokio::{
    sync::{mpsc, oneshot, watch},
    time::Instant,
};
use url::Url;

use crate::{
    collaborator::{PlayerClient, SettingsSource},
    config::{ClientConfig, ClientProfile},
    domain::{Message, PlaybackAction, RoomIdentity, derive_status},
    error::{ClientError, TransportError},
    infrastructure::{
        dto::{
            ClientEvent, Frame, JoinResult, OutgoingMessage, PollPayload, ServerEvent,
            TransferHostRequest,
        },
        transport::{BoxTransport, Connector, relay_endpoint},
    },
};

use super::{
    correlation::{Correlation, JoinReply, JoinWaiter, PendingAck},
    dispatcher::{self, Reaction},
    membership,
    notice::SessionNotice,
    party_pause,
    state::{SessionPhase, SessionSnapshot, SessionState},
};

/// Requests from the facade to the engine task
#[derive(Debug)]
pub enum Command {
    Join {
        identity: RoomIdentity,
        reply: JoinReply,
    },
    SendMessage(String),
    TransferHost(String),
    SetPartyPausing(bool),
    SendPartyPause {
        is_pause: bool,
    },
    Disconnect {
        reply: oneshot::Sender<Result<(), ClientError>>,
    },
}

/// External collaborators of a session
#[derive(Clone)]
pub struct Collaborators {
    pub player: Arc<dyn PlayerClient>,
    pub settings: Arc<dyn SettingsSource>,
    pub connector: Arc<dyn Connector>,
    pub clock: Arc<dyn Clock>,
}

/// Where the engine reports to
#[derive(Debug, Clone)]
pub struct Observers {
    pub snapshots: Arc<watch::Sender<SessionSnapshot>>,
    pub notices: mpsc::UnboundedSender<SessionNotice>,
}

#[derive(Debug, Default)]
struct ReconnectState {
    /// Failed attempts since the last drop
    attempts: u32,
    deadline: Option<Instant>,
}

pub struct SessionEngine {
    config: ClientConfig,
    profile: ClientProfile,
    endpoint: Url,
    collaborators: Collaborators,
    observers: Observers,
    state: SessionState,
    transport: Option<BoxTransport>,
    correlation: Correlation,
    reconnect: ReconnectState,
}

impl SessionEngine {
    /// Open the relay connection for `server`
    pub async fn establish(
        server: &str,
        config: ClientConfig,
        profile: ClientProfile,
        collaborators: Collaborators,
        observers: Observers,
    ) -> Result<Self, ClientError> {
        let endpoint = relay_endpoint(server, &config.relay_path)?;
        let state = SessionState::new(config.poll_window);
        let mut engine = Self {
            config,
            profile,
            endpoint,
            collaborators,
            observers,
            state,
            transport: None,
            correlation: Correlation::default(),
            reconnect: ReconnectState::default(),
        };

        engine.state.phase = SessionPhase::Connecting;
        engine.publish();
        tracing::info!("Connecting to {}", engine.endpoint);

        match engine.collaborators.connector.connect(&engine.endpoint).await {
            Ok(transport) => {
                engine.transport = Some(transport);
                let now = engine.now_millis();
                let reactions = dispatcher::dispatch(&mut engine.state, ServerEvent::Connect, now);
                engine.apply(reactions).await;
                engine.publish();
                Ok(engine)
            }
            Err(e) => {
                tracing::warn!("Failed to connect to {}: {}", engine.endpoint, e);
                engine.state.phase = SessionPhase::Disconnected;
                engine.publish();
                Err(e)
            }
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Run the engine on its own task
    pub fn spawn(self) -> super::SessionHandle {
        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        super::SessionHandle::new(commands, task)
    }

    /// Event loop; returns once disconnected or when every command sender is gone
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            let poll_deadline = self.state.poller.next_deadline();
            let reconnect_deadline = self.reconnect.deadline;

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    }
                    None => {
                        tracing::debug!("All handles dropped, closing session");
                        if let Err(e) = self.shutdown().await {
                            tracing::warn!("{}", e);
                        }
                        break;
                    }
                },
                incoming = recv_from(&mut self.transport) => self.handle_incoming(incoming).await,
                _ = sleep_until_opt(poll_deadline) => self.poll_tick().await,
                _ = sleep_until_opt(reconnect_deadline) => self.try_reconnect().await,
            }

            self.publish();
        }
    }

    // ========================================
    // Commands
    // ========================================

    /// Returns `false` once the session is over
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Join { identity, reply } => self.handle_join(identity, reply).await,
            Command::SendMessage(msg) => {
                self.state
                    .messages
                    .push(Message::local(msg.clone(), self.profile.avatar_url.clone()));
                if self.state.is_connected() {
                    let event = ClientEvent::SendMessage(OutgoingMessage {
                        msg,
                        kind: "message".to_string(),
                    });
                    let _ = self.emit(event, None).await;
                }
            }
            Command::TransferHost(username) => {
                if self.state.is_connected() {
                    let event = ClientEvent::TransferHost(TransferHostRequest { username });
                    let _ = self.emit(event, None).await;
                } else {
                    tracing::debug!("Not connected, dropping host transfer");
                }
            }
            Command::SetPartyPausing(enabled) => {
                tracing::info!("Party pausing {}", if enabled { "on" } else { "off" });
                if let Some(event) = party_pause::set_local(&mut self.state, enabled) {
                    let _ = self.emit(event, None).await;
                }
            }
            Command::SendPartyPause { is_pause } => self.send_party_pause(is_pause).await,
            Command::Disconnect { reply } => {
                let result = self.shutdown().await;
                let _ = reply.send(result);
                return false;
            }
        }
        true
    }

    async fn handle_join(&mut self, identity: RoomIdentity, reply: JoinReply) {
        if !self.state.is_connected() {
            let _ = reply.send(Err(ClientError::NotConnected));
            return;
        }
        if self.state.is_in_room()
            && let Some(current) = &self.state.identity
        {
            let _ = reply.send(Err(ClientError::AlreadyInRoom(current.room.clone())));
            return;
        }
        if let Some(pending) = self.correlation.pending_join()
            && !pending.is_abandoned()
        {
            let room = pending.identity.room.clone();
            let _ = reply.send(Err(ClientError::JoinInProgress(room)));
            return;
        }
        self.start_join(identity, JoinWaiter::Caller(reply)).await;
    }

    /// Arm the `join-result` listener, then send the join
    async fn start_join(&mut self, identity: RoomIdentity, waiter: JoinWaiter) {
        tracing::info!("Joining room '{}' on {}", identity.room, identity.server);
        let request = membership::build_join_request(&self.profile, &identity);

        if self.correlation.arm_join(identity, waiter).is_some() {
            tracing::debug!("Superseded an abandoned join");
        }

        if let Err(e) = self.emit(ClientEvent::Join(request), None).await
            && let Some(pending) = self.correlation.take_join()
            && let JoinWaiter::Caller(reply) = pending.waiter
        {
            let _ = reply.send(Err(e));
        }
    }

    async fn send_party_pause(&mut self, is_pause: bool) {
        let Some(event) = party_pause::request(&self.state, is_pause) else {
            tracing::debug!("Party pausing unavailable, dropping request");
            return;
        };
        let ack_id = self
            .correlation
            .register_ack(PendingAck::PartyPause { is_pause });
        if self.emit(event, Some(ack_id)).await.is_err() {
            self.correlation.cancel_ack(ack_id);
        }
    }

    // ========================================
    // Inbound
    // ========================================

    async fn handle_incoming(&mut self, incoming: Option<Result<String, TransportError>>) {
        let text = match incoming {
            Some(Ok(text)) => text,
            Some(Err(e)) => {
                self.lose_transport(e.to_string()).await;
                return;
            }
            None => {
                self.lose_transport("transport closed".to_string()).await;
                return;
            }
        };

        let frame = match Frame::decode(&text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Dropping undecodable frame: {}", e);
                return;
            }
        };

        match frame {
            Frame::Event { name, args, .. } => match ServerEvent::decode(&name, args) {
                Ok(ServerEvent::JoinResult(result)) => self.on_join_result(result),
                Ok(event) => {
                    let now = self.now_millis();
                    let reactions = dispatcher::dispatch(&mut self.state, event, now);
                    self.apply(reactions).await;
                }
                Err(e) => tracing::warn!("Dropping event: {}", e),
            },
            Frame::Ack { ack_id, args } => match self.correlation.resolve_ack(ack_id) {
                Some(PendingAck::PartyPause { is_pause }) => {
                    match party_pause::on_ack(&self.state, is_pause, &args) {
                        Some(action) => {
                            drive_player(self.collaborators.player.as_ref(), action).await
                        }
                        None => tracing::debug!("Party pause not applied"),
                    }
                }
                None => tracing::warn!("Ignoring ack for unknown request {}", ack_id),
            },
        }
    }

    fn on_join_result(&mut self, result: JoinResult) {
        let Some(pending) = self.correlation.take_join() else {
            tracing::warn!("Ignoring join-result without a pending join");
            return;
        };
        if pending.is_abandoned() {
            tracing::warn!("Ignoring join-result for an abandoned join");
            return;
        }

        let outcome = membership::apply_join_result(
            &mut self.state,
            pending.identity.clone(),
            result,
            Instant::now(),
        );

        // Observers must see the room before the caller does
        self.publish();

        match pending.waiter {
            JoinWaiter::Caller(reply) => {
                if let Ok(outcome) = &outcome {
                    self.notify(SessionNotice::Joined {
                        identity: outcome.identity.clone(),
                        users: outcome.users,
                    });
                }
                let _ = reply.send(outcome);
            }
            JoinWaiter::Rejoin => match outcome {
                Ok(outcome) => self.notify(SessionNotice::Rejoined {
                    identity: outcome.identity,
                    users: outcome.users,
                }),
                Err(e) => {
                    tracing::warn!("Rejoin failed: {}", e);
                    self.notify(SessionNotice::RejoinFailed {
                        identity: pending.identity,
                        reason: e.to_string(),
                    });
                }
            },
        }
    }

    async fn apply(&mut self, reactions: Vec<Reaction>) {
        for reaction in reactions {
            match reaction {
                Reaction::Rejoin(identity) => self.start_join(identity, JoinWaiter::Rejoin).await,
                Reaction::Playback(action) => {
                    drive_player(self.collaborators.player.as_ref(), action).await
                }
                Reaction::TransportLost { reason } => self.schedule_reconnect(reason),
                Reaction::Notice(notice) => self.notify(notice),
            }
        }
    }

    // ========================================
    // Polling
    // ========================================

    async fn poll_tick(&mut self) {
        let settings = &self.collaborators.settings;
        let interval = settings.client_poll_interval();
        let flexibility = settings.sync_flexibility();
        self.state.poller.reschedule(Instant::now(), interval);
        if !self.state.is_in_room() {
            self.state.poller.cancel();
            return;
        }

        let sampled = match self.collaborators.player.poll_client().await {
            Ok(sampled) => sampled,
            Err(e) => {
                tracing::warn!("Skipping poll, player unavailable: {}", e);
                return;
            }
        };
        let status = derive_status(
            sampled.time,
            self.state.host_state.as_ref(),
            self.now_millis(),
            flexibility,
        );

        let ticket = self.state.polls.next_ticket();
        let payload = PollPayload {
            player: sampled,
            status,
            uuid: self.profile.uuid.clone(),
            command_id: ticket.command_id,
            latency: ticket.latency,
        };
        match self.emit(ClientEvent::Poll(payload), None).await {
            Ok(()) => {
                let time_sent = self.now_millis();
                self.state.polls.record(ticket, time_sent);
            }
            Err(_) => self.state.polls.skip(ticket),
        }
    }

    // ========================================
    // Transport
    // ========================================

    async fn emit(&mut self, event: ClientEvent, ack_id: Option<u64>) -> Result<(), ClientError> {
        let Some(transport) = self.transport.as_mut() else {
            return Err(ClientError::NotConnected);
        };
        let name = event.name();
        let text = event
            .into_frame(ack_id)
            .and_then(|frame| frame.encode())
            .map_err(|e| ClientError::ConnectionError(e.to_string()))?;

        tracing::debug!("Emitting '{}'", name);
        // A failed send surfaces as a drop on the receiving side
        transport.send(text).await.map_err(|e| {
            tracing::warn!("Failed to emit '{}': {}", name, e);
            ClientError::ConnectionError(e.to_string())
        })
    }

    async fn lose_transport(&mut self, reason: String) {
        self.transport = None;
        self.correlation.clear();
        let now = self.now_millis();
        let reactions =
            dispatcher::dispatch(&mut self.state, ServerEvent::Disconnect { reason }, now);
        self.apply(reactions).await;
    }

    fn schedule_reconnect(&mut self, reason: String) {
        let policy = self.config.reconnect;
        let will_retry = policy.should_attempt(self.reconnect.attempts);
        if will_retry {
            self.state.phase = SessionPhase::Connecting;
            self.reconnect.deadline = Some(Instant::now() + policy.interval);
            tracing::info!(
                "Reconnecting in {:?} (attempt {}/{})",
                policy.interval,
                self.reconnect.attempts + 1,
                policy.max_attempts
            );
        } else {
            tracing::error!(
                "Giving up after {} reconnect attempts",
                self.reconnect.attempts
            );
        }
        self.notify(SessionNotice::ConnectionLost { reason, will_retry });
    }

    async fn try_reconnect(&mut self) {
        self.reconnect.deadline = None;
        self.reconnect.attempts += 1;
        self.notify(SessionNotice::Reconnecting {
            attempt: self.reconnect.attempts,
            max_attempts: self.config.reconnect.max_attempts,
        });

        match self.collaborators.connector.connect(&self.endpoint).await {
            Ok(transport) => {
                tracing::info!("Reconnected to {}", self.endpoint);
                self.transport = Some(transport);
                self.reconnect.attempts = 0;
                let now = self.now_millis();
                let reactions = dispatcher::dispatch(&mut self.state, ServerEvent::Connect, now);
                self.apply(reactions).await;
            }
            Err(e) => {
                tracing::warn!("Reconnect attempt {} failed: {}", self.reconnect.attempts, e);
                self.state.phase = SessionPhase::Disconnected;
                self.schedule_reconnect(e.to_string());
            }
        }
    }

    /// Explicit disconnect.
    ///
    /// State is torn down before the transport is closed, then the relay's
    /// confirmation is awaited for at most the configured timeout.
    async fn shutdown(&mut self) -> Result<(), ClientError> {
        tracing::info!("Disconnecting from {}", self.endpoint);
        self.state.teardown();
        self.correlation.clear();
        self.reconnect = ReconnectState::default();
        self.publish();

        let Some(mut transport) = self.transport.take() else {
            return Ok(());
        };
        if let Err(e) = transport.close().await {
            tracing::debug!("Close request failed: {}", e);
        }

        let timeout = self.config.disconnect_timeout;
        let confirmed = tokio::time::timeout(timeout, async {
            while let Some(Ok(_)) = transport.recv().await {}
        })
        .await;

        match confirmed {
            Ok(()) => {
                tracing::info!("Disconnected");
                Ok(())
            }
            Err(_) => Err(ClientError::DisconnectTimeout(timeout)),
        }
    }

    // ========================================
    // Observers
    // ========================================

    fn publish(&self) {
        let snapshot = self.state.snapshot();
        self.observers.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }

    fn notify(&self, notice: SessionNotice) {
        if self.observers.notices.send(notice).is_err() {
            tracing::debug!("No notice listener");
        }
    }

    fn now_millis(&self) -> i64 {
        self.collaborators.clock.now_millis()
    }
}

/// Takes the player alone: the engine is not `Sync`, and `run` must stay `Send`
async fn drive_player(player: &dyn PlayerClient, action: PlaybackAction) {
    let result = match action {
        PlaybackAction::Play => player.press_play().await,
        PlaybackAction::Pause => player.press_pause().await,
    };
    match result {
        Ok(()) => tracing::debug!("Player: {:?}", action),
        Err(e) => tracing::warn!("Player refused {:?}: {}", action, e),
    }
}

async fn recv_from(transport: &mut Option<BoxTransport>) -> Option<Result<String, TransportError>> {
    match transport {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
