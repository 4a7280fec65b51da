//! Server network layer: WebSocket transport and the relay event loop
//!
//! Each accepted socket is split into a reader loop and a writer task. The
//! reader forwards frames to the single server loop over an unbounded
//! channel; the server loop exclusively owns the [`Router`] and processes
//! one event at a time.

use crate::registry::Outbox;
use crate::router::Router;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::ClientId;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Messages sent from connection tasks to the server loop
#[derive(Debug)]
pub enum RelayEvent {
    Connected {
        outbox: Outbox,
        reply: oneshot::Sender<ClientId>,
    },
    Frame {
        client_id: ClientId,
        text: String,
    },
    Closed {
        client_id: ClientId,
    },
    Shutdown,
}

/// Cloneable handle for stopping a running server
#[derive(Debug, Clone)]
pub struct ServerHandle {
    events: mpsc::UnboundedSender<RelayEvent>,
}

impl ServerHandle {
    pub fn shutdown(&self) {
        if self.events.send(RelayEvent::Shutdown).is_err() {
            debug!("Server already stopped");
        }
    }
}

pub struct Server {
    listener: TcpListener,
    router: Router,
    events_tx: mpsc::UnboundedSender<RelayEvent>,
    events_rx: mpsc::UnboundedReceiver<RelayEvent>,
}

impl Server {
    pub async fn bind(addr: &str) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server is listening on {}", listener.local_addr()?);

        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            router: Router::new(),
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn handle(&self) -> ServerHandle {
        ServerHandle {
            events: self.events_tx.clone(),
        }
    }

    /// Accepts connections and routes their events until shut down.
    pub async fn run(self) -> Result<(), ServerError> {
        let Server {
            listener,
            mut router,
            events_tx,
            mut events_rx,
        } = self;

        let acceptor = tokio::spawn(accept_loop(listener, events_tx));

        info!("Server started successfully");

        while let Some(event) = events_rx.recv().await {
            match event {
                RelayEvent::Connected { outbox, reply } => {
                    let client_id = router.connect(outbox);
                    if reply.send(client_id).is_err() {
                        // Connection task vanished before learning its id
                        router.disconnect(client_id);
                    }
                }
                RelayEvent::Frame { client_id, text } => {
                    router.handle_frame(client_id, &text);
                }
                RelayEvent::Closed { client_id } => {
                    router.disconnect(client_id);
                }
                RelayEvent::Shutdown => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        acceptor.abort();
        Ok(())
    }
}

async fn accept_loop(listener: TcpListener, events: mpsc::UnboundedSender<RelayEvent>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tokio::spawn(handle_connection(stream, addr, events.clone()));
            }
            Err(e) => {
                error!("Error accepting connection: {}", e);
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        }
    }
}

/// Drives one socket: registers it with the server loop, pumps outbound
/// messages from its outbox, and forwards inbound text frames.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    events: mpsc::UnboundedSender<RelayEvent>,
) {
    let socket = match accept_async(stream).await {
        Ok(socket) => socket,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();
    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<Message>();
    let (reply_tx, reply_rx) = oneshot::channel();

    if events
        .send(RelayEvent::Connected {
            outbox,
            reply: reply_tx,
        })
        .is_err()
    {
        return;
    }

    let Ok(client_id) = reply_rx.await else {
        return;
    };
    debug!("Connection {} assigned to {}", client_id, addr);

    let writer = tokio::spawn(async move {
        while let Some(message) = outbox_rx.recv().await {
            if let Err(e) = sink.send(message).await {
                debug!("Failed to send to {}: {}", client_id, e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let event = RelayEvent::Frame {
                    client_id,
                    text: text.to_string(),
                };
                if events.send(event).is_err() {
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                debug!("Binary frame from {} ignored", client_id);
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!("WebSocket error on {}: {}", client_id, e);
                break;
            }
        }
    }

    writer.abort();
    let _ = events.send(RelayEvent::Closed { client_id });
}
