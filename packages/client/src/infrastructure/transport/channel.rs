//! In-memory transport over `tokio::sync::mpsc`.
//!
//! The far end is a [`ChannelPeer`] that plays the relay. Used to embed the
//! engine without a network and to drive it in tests.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::error::{ClientError, TransportError};

use super::{BoxTransport, Connector, Transport};

/// Client side of an in-memory connection
#[derive(Debug)]
pub struct ChannelTransport {
    outbound: Option<mpsc::UnboundedSender<String>>,
    inbound: mpsc::UnboundedReceiver<String>,
}

/// Relay side of an in-memory connection.
///
/// Dropping `inbound` closes the connection as seen by the client.
#[derive(Debug)]
pub struct ChannelPeer {
    /// Frames delivered to the client
    pub inbound: mpsc::UnboundedSender<String>,
    /// Frames sent by the client; yields `None` once the client closed
    pub outbound: mpsc::UnboundedReceiver<String>,
}

impl ChannelTransport {
    pub fn pair() -> (Self, ChannelPeer) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        (
            Self {
                outbound: Some(outbound_tx),
                inbound: inbound_rx,
            },
            ChannelPeer {
                inbound: inbound_tx,
                outbound: outbound_rx,
            },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        let outbound = self.outbound.as_ref().ok_or(TransportError::Closed)?;
        outbound.send(text).map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.outbound = None;
        Ok(())
    }
}

/// Hands out queued [`ChannelTransport`]s, one per `connect`.
///
/// An empty queue refuses the connection.
#[derive(Debug, Clone, Default)]
pub struct ChannelConnector {
    queue: Arc<Mutex<VecDeque<ChannelTransport>>>,
}

impl ChannelConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a connection and return its relay side
    pub fn push_pair(&self) -> ChannelPeer {
        let (transport, peer) = ChannelTransport::pair();
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(transport);
        }
        peer
    }
}

#[async_trait]
impl Connector for ChannelConnector {
    async fn connect(&self, endpoint: &Url) -> Result<BoxTransport, ClientError> {
        let next = self
            .queue
            .lock()
            .map_err(|e| ClientError::ConnectionError(e.to_string()))?
            .pop_front();
        match next {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(ClientError::ConnectionError(format!(
                "{endpoint} refused the connection"
            ))),
        }
    }
}
