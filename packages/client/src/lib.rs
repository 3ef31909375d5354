//! Lounge playback synchronization client.
//!
//! Keeps a local media player in step with the other members of a room by
//! talking to a relay server: joins rooms, polls the player and reports its
//! state with RTT compensation, and arbitrates party-wide pause/resume.

pub mod client;
pub mod collaborator;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod session;
pub mod ui;

pub use client::LoungeClient;
pub use collaborator::{LiveSettings, PlaybackSettings, PlayerClient, SettingsSource};
pub use config::{ClientConfig, ClientProfile, PollWindow, ReconnectPolicy};
pub use error::ClientError;
pub use session::{JoinOutcome, SessionNotice, SessionPhase, SessionSnapshot};
