//! Synchronization session engine.
//!
//! - `state`: the owned session state and its published snapshot
//! - `membership`: join handshake
//! - `poller`: poll numbering, unacked polls, SRTT and the tick schedule
//! - `party_pause`: party-pausing arbitration
//! - `correlation`: pending join and outstanding acks
//! - `dispatcher`: inbound event routing
//! - `engine`: the actor tying it together

pub mod correlation;
pub mod dispatcher;
pub mod engine;
pub mod handle;
pub mod membership;
pub mod notice;
pub mod party_pause;
pub mod poller;
pub mod state;

pub use engine::{Collaborators, Command, Observers, SessionEngine};
pub use handle::SessionHandle;
pub use membership::JoinOutcome;
pub use notice::SessionNotice;
pub use poller::{PollRecord, PollTracker, Poller, SrttEstimator};
pub use state::{SessionPhase, SessionSnapshot, SessionState};
