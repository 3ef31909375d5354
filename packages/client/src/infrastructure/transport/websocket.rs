//! WebSocket transport built on `tokio-tungstenite`.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::protocol::Message,
};
use url::Url;

use crate::error::{ClientError, TransportError};

use super::{BoxTransport, Connector, Transport};

/// Opens websocket connections to a relay
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketConnector;

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, endpoint: &Url) -> Result<BoxTransport, ClientError> {
        let (stream, response) = connect_async(endpoint.as_str())
            .await
            .map_err(|e| ClientError::ConnectionError(e.to_string()))?;

        tracing::debug!(
            "WebSocket handshake with {} answered {}",
            endpoint,
            response.status()
        );

        Ok(Box::new(WebSocketTransport { stream }))
    }
}

/// A live websocket connection
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(frame)) => {
                    tracing::debug!("Relay closed the connection: {:?}", frame);
                    return None;
                }
                Ok(Message::Binary(data)) => {
                    tracing::warn!("Ignoring binary frame ({} bytes)", data.len());
                }
                // Ping/pong is handled by tungstenite
                Ok(_) => {}
                Err(e) => return Some(Err(TransportError::Receive(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stream
            .close(None)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }
}
