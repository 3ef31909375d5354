//! Caller-side handle to a running [`SessionEngine`](super::SessionEngine).

use std::time::Duration;

use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use crate::{domain::RoomIdentity, error::ClientError};

use super::{engine::Command, membership::JoinOutcome};

#[derive(Debug)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub(crate) fn new(commands: mpsc::UnboundedSender<Command>, task: JoinHandle<()>) -> Self {
        Self { commands, task }
    }

    /// Fire-and-forget command
    pub fn send(&self, command: Command) -> Result<(), ClientError> {
        self.commands
            .send(command)
            .map_err(|_| ClientError::SessionClosed)
    }

    /// Join a room and wait for the relay's answer.
    ///
    /// On timeout the join is abandoned: a late `join-result` is ignored.
    pub async fn join(
        &self,
        identity: RoomIdentity,
        timeout: Duration,
    ) -> Result<JoinOutcome, ClientError> {
        let (reply, outcome) = oneshot::channel();
        self.send(Command::Join { identity, reply })?;

        match tokio::time::timeout(timeout, outcome).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(ClientError::SessionClosed),
            Err(_) => Err(ClientError::JoinTimeout(timeout)),
        }
    }

    /// Tear the session down and wait for the engine task to finish
    pub async fn disconnect(self) -> Result<(), ClientError> {
        let (reply, done) = oneshot::channel();
        let result = match self.send(Command::Disconnect { reply }) {
            Ok(()) => done.await.unwrap_or(Ok(())),
            // Engine already gone, nothing left to tear down
            Err(_) => Ok(()),
        };
        if let Err(e) = self.task.await {
            tracing::error!("Session task failed: {}", e);
        }
        result
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
