//! Relay transport abstraction.
//!
//! A [`Transport`] is one live full-duplex connection carrying text frames.
//! A [`Connector`] opens them; the session engine owns at most one at a time.

mod channel;
mod websocket;

use async_trait::async_trait;
use url::Url;

use crate::error::{ClientError, TransportError};

pub use channel::{ChannelConnector, ChannelPeer, ChannelTransport};
pub use websocket::{WebSocketConnector, WebSocketTransport};

/// One established relay connection
#[async_trait]
pub trait Transport: Send {
    /// Send one text frame
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Receive the next text frame.
    ///
    /// `None` once the peer has closed the connection. Must be cancel safe.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Ask the peer to close the connection
    async fn close(&mut self) -> Result<(), TransportError>;
}

pub type BoxTransport = Box<dyn Transport>;

/// Opens relay connections
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &Url) -> Result<BoxTransport, ClientError>;
}

/// Relay endpoint for a server address: `http`→`ws`, `https`→`wss`, plus `relay_path`.
pub fn relay_endpoint(server: &str, relay_path: &str) -> Result<Url, ClientError> {
    let mut url = parse_server(server)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(invalid(server, format!("unsupported scheme '{other}'"))),
    };
    set_scheme(&mut url, server, scheme)?;
    append_path(&mut url, relay_path);
    Ok(url)
}

/// Health endpoint for a server address: `ws`→`http`, `wss`→`https`, plus `/health`.
pub fn health_endpoint(server: &str) -> Result<Url, ClientError> {
    let mut url = parse_server(server)?;
    let scheme = match url.scheme() {
        "http" | "ws" => "http",
        "https" | "wss" => "https",
        other => return Err(invalid(server, format!("unsupported scheme '{other}'"))),
    };
    set_scheme(&mut url, server, scheme)?;
    append_path(&mut url, "health");
    Ok(url)
}

fn parse_server(server: &str) -> Result<Url, ClientError> {
    Url::parse(server).map_err(|e| invalid(server, e.to_string()))
}

fn set_scheme(url: &mut Url, server: &str, scheme: &str) -> Result<(), ClientError> {
    url.set_scheme(scheme)
        .map_err(|_| invalid(server, format!("cannot switch to '{scheme}'")))
}

fn append_path(url: &mut Url, segment: &str) {
    let mut path = url.path().trim_end_matches('/').to_string();
    path.push('/');
    path.push_str(segment.trim_start_matches('/'));
    url.set_path(&path);
}

fn invalid(server: &str, reason: String) -> ClientError {
    ClientError::InvalidServerUrl {
        url: server.to_string(),
        reason,
    }
}
