//! Error types for the Lounge synchronization client.

use std::time::Duration;

use thiserror::Error;

/// Client-facing errors
#[derive(Debug, Error)]
pub enum ClientError {
    /// The relay connection could not be established
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The relay answered the join with a falsy result
    #[error("Join to room '{room}' rejected: {reason}")]
    JoinRejected { room: String, reason: String },

    /// No live relay connection
    #[error("Not connected to a relay server")]
    NotConnected,

    /// A join was requested while already in a room
    #[error("Already in room '{0}'")]
    AlreadyInRoom(String),

    /// An earlier join is still waiting for its result
    #[error("Join to room '{0}' is still pending")]
    JoinInProgress(String),

    /// No join result arrived in time
    #[error("No join result within {0:?}")]
    JoinTimeout(Duration),

    /// The relay never confirmed the closure
    #[error("Relay did not confirm disconnect within {0:?}")]
    DisconnectTimeout(Duration),

    /// The session ended while a request was outstanding
    #[error("Session closed")]
    SessionClosed,

    /// The server address cannot be turned into a relay endpoint
    #[error("Invalid server url '{url}': {reason}")]
    InvalidServerUrl { url: String, reason: String },

    /// Health probing found no reachable relay
    #[error("No healthy relay server available")]
    NoHealthyServer,
}

/// Errors of a single relay connection
#[derive(Debug, Error, PartialEq)]
pub enum TransportError {
    #[error("Failed to send frame: {0}")]
    Send(String),

    #[error("Failed to receive frame: {0}")]
    Receive(String),

    #[error("Transport closed")]
    Closed,
}

/// Frame or payload decoding errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    #[error("Unknown event '{0}'")]
    UnknownEvent(String),

    #[error("Invalid payload for '{event}': {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors reported by the media player collaborator
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlayerError {
    #[error("Player unavailable: {0}")]
    Unavailable(String),

    #[error("Player command failed: {0}")]
    CommandFailed(String),
}

/// Errors of a single relay health probe
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("Health request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error(transparent)]
    Url(#[from] ClientError),
}
