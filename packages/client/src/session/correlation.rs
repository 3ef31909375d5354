//! One-shot correlated waits: the pending join and outstanding acks.
//!
//! Each entry is resolved at most once and removed when resolved. Dropping an
//! entry drops its continuation, which is how teardown cancels them.

use std::collections::BTreeMap;

use tokio::sync::oneshot;

use crate::{domain::RoomIdentity, error::ClientError};

use super::membership::JoinOutcome;

/// Outstanding acks kept at most; the oldest request is forgotten first
pub const MAX_PENDING_ACKS: usize = 16;

pub type JoinReply = oneshot::Sender<Result<JoinOutcome, ClientError>>;

/// Who is waiting for the next `join-result`
#[derive(Debug)]
pub enum JoinWaiter {
    /// A caller awaiting the outcome
    Caller(JoinReply),
    /// Automatic rejoin after a re-established transport
    Rejoin,
}

#[derive(Debug)]
pub struct PendingJoin {
    pub identity: RoomIdentity,
    pub waiter: JoinWaiter,
}

impl PendingJoin {
    /// Whether anybody still cares about the result
    pub fn is_abandoned(&self) -> bool {
        match &self.waiter {
            JoinWaiter::Caller(reply) => reply.is_closed(),
            JoinWaiter::Rejoin => false,
        }
    }
}

/// Request awaiting an `ack` frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingAck {
    PartyPause { is_pause: bool },
}

#[derive(Debug, Default)]
pub struct Correlation {
    join: Option<PendingJoin>,
    acks: BTreeMap<u64, PendingAck>,
    next_ack_id: u64,
}

impl Correlation {
    /// Arm the listener for the next `join-result`.
    ///
    /// Must happen before the `join` frame is sent. A join still pending is
    /// superseded and returned; callers refuse a new join while a live one is
    /// pending, so only abandoned joins and rejoins get here.
    pub fn arm_join(&mut self, identity: RoomIdentity, waiter: JoinWaiter) -> Option<PendingJoin> {
        self.join.replace(PendingJoin { identity, waiter })
    }

    /// Disarm the join listener; `None` if nothing was waiting
    pub fn take_join(&mut self) -> Option<PendingJoin> {
        self.join.take()
    }

    pub fn has_pending_join(&self) -> bool {
        self.join.is_some()
    }

    pub fn pending_join(&self) -> Option<&PendingJoin> {
        self.join.as_ref()
    }

    /// Register a request and return the `ackId` to send with it
    pub fn register_ack(&mut self, pending: PendingAck) -> u64 {
        self.next_ack_id += 1;
        let ack_id = self.next_ack_id;
        self.acks.insert(ack_id, pending);
        while self.acks.len() > MAX_PENDING_ACKS {
            if let Some((stale, _)) = self.acks.pop_first() {
                tracing::warn!("Giving up on unanswered request {}", stale);
            }
        }
        ack_id
    }

    /// Resolve an `ack` frame; `None` for an unknown or already used id
    pub fn resolve_ack(&mut self, ack_id: u64) -> Option<PendingAck> {
        self.acks.remove(&ack_id)
    }

    /// Forget an ack whose request never left
    pub fn cancel_ack(&mut self, ack_id: u64) {
        self.acks.remove(&ack_id);
    }

    pub fn pending_acks(&self) -> usize {
        self.acks.len()
    }

    /// Drop every pending wait; callers see their reply channel close
    pub fn clear(&mut self) {
        self.join = None;
        self.acks.clear();
    }
}
