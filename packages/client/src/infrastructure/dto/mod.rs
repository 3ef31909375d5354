//! Data Transfer Objects for the relay protocol.
//!
//! - `frame`: the JSON envelope carried by each websocket text frame
//! - `event`: typed inbound/outbound events and their payload records

pub mod event;
pub mod frame;

pub use event::{
    ClientEvent, JoinRequest, JoinResult, OutgoingMessage, PollPayload, PollResult, RosterChange,
    ServerEvent, TransferHostRequest,
};
pub use frame::{Frame, is_truthy};
