use futures::{SinkExt, StreamExt};
use log::{debug, info};
use serde_json::{Map, Value};
use shared::{Envelope, Inbound, PlayerProfile, Role};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("connection closed by server")]
    Closed,
    #[error("nothing received within {0:?}")]
    Timeout(Duration),
}

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connection to a relay server
pub struct RelayClient {
    socket: Socket,
}

impl RelayClient {
    /// Opens a WebSocket to the relay at `url`
    ///
    /// The connection is unregistered until one of the `register_*`
    /// methods is called.
    pub async fn connect(url: &str) -> Result<Self, ClientError> {
        info!("Connecting to {}...", url);
        let (socket, _) = connect_async(url).await?;
        Ok(RelayClient { socket })
    }

    /// Serializes a typed frame and sends it as text
    pub async fn send(&mut self, frame: &Inbound) -> Result<(), ClientError> {
        let text = frame.to_text()?;
        self.send_raw(text).await
    }

    /// Sends arbitrary text, bypassing the typed protocol.
    pub async fn send_raw(&mut self, text: impl Into<String>) -> Result<(), ClientError> {
        self.socket.send(Message::text(text.into())).await?;
        Ok(())
    }

    /// Claims the host role, replacing any earlier host
    pub async fn register_host(&mut self) -> Result<(), ClientError> {
        self.send(&Inbound::Register {
            role: Role::Host,
            value: PlayerProfile::default(),
        })
        .await
    }

    /// Registers as a player; the host is told about `profile`
    pub async fn register_client(&mut self, profile: PlayerProfile) -> Result<(), ClientError> {
        self.send(&Inbound::Register {
            role: Role::Client,
            value: profile,
        })
        .await
    }

    /// Signals that this player is ready
    ///
    /// Ignored by the relay unless the connection registered as a client.
    pub async fn ready(&mut self, profile: PlayerProfile) -> Result<(), ClientError> {
        self.send(&Inbound::Ready { value: profile }).await
    }

    /// Sends player input, forwarded to the host as `player_controls`
    pub async fn send_controls(&mut self, controls: Map<String, Value>) -> Result<(), ClientError> {
        self.send(&Inbound::Controls { value: controls }).await
    }

    /// Broadcasts `message` verbatim to every other connection
    pub async fn send_message(&mut self, message: impl Into<String>) -> Result<(), ClientError> {
        self.send(&Inbound::Message {
            message: message.into(),
        })
        .await
    }

    /// Waits for the next text frame, skipping control frames.
    pub async fn next_text(&mut self) -> Result<String, ClientError> {
        while let Some(message) = self.socket.next().await {
            match message? {
                Message::Text(text) => return Ok(text.to_string()),
                Message::Close(_) => return Err(ClientError::Closed),
                other => debug!("Ignoring non-text frame: {:?}", other),
            }
        }
        Err(ClientError::Closed)
    }

    /// Like [`next_text`](Self::next_text), but gives up after `wait`.
    /// Returns `Ok(None)` if nothing arrived in time.
    pub async fn recv_timeout(&mut self, wait: Duration) -> Result<Option<String>, ClientError> {
        match tokio::time::timeout(wait, self.next_text()).await {
            Ok(result) => result.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Waits up to `wait` for the next host notification.
    pub async fn expect_envelope(&mut self, wait: Duration) -> Result<Envelope, ClientError> {
        let text = self
            .recv_timeout(wait)
            .await?
            .ok_or(ClientError::Timeout(wait))?;
        Ok(Envelope::from_text(&text)?)
    }

    /// Sends a close frame and waits for the handshake to finish
    pub async fn close(mut self) -> Result<(), ClientError> {
        self.socket.close(None).await?;
        Ok(())
    }
}
