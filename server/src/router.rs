//! Message routing for the relay
//!
//! Every decoded frame is dispatched on its discriminator. Host-directed
//! notifications are wrapped in an [`Envelope`]; `message` frames are the
//! only ones relayed as raw text. Nothing is ever sent back to a sender
//! whose frame was dropped.

use crate::registry::{Connection, Departure, Outbox, Registry};
use log::{debug, info, warn};
use serde_json::{Map, Value};
use shared::{ClientId, DecodeError, Inbound, Notification, PlayerProfile, Role};

pub struct Router {
    registry: Registry,
}

impl Router {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Starts tracking a new connection and returns its minted identifier.
    pub fn connect(&mut self, outbox: Outbox) -> ClientId {
        self.registry.connect(outbox).id()
    }

    /// Decodes and routes one text frame from `client_id`.
    pub fn handle_frame(&mut self, client_id: ClientId, text: &str) {
        let Some(sender) = self.registry.connection(client_id).cloned() else {
            warn!("Frame from unknown connection {} dropped", client_id);
            return;
        };

        match Inbound::decode(text) {
            Ok(inbound) => self.dispatch(&sender, inbound),
            Err(DecodeError::UnknownType(kind)) => {
                info!("Unknown message type from {}: {}", client_id, kind);
            }
            Err(e) => {
                warn!("Dropping frame from {}: {}", client_id, e);
            }
        }
    }

    /// Handles a transport close: prunes the registry and tells the host
    /// about departed clients.
    ///
    /// Only registered clients produce `client_disconnected`; unregistered
    /// connections and the host itself leave without a notification.
    pub fn disconnect(&mut self, client_id: ClientId) {
        match self.registry.disconnect(client_id) {
            Some(Departure::Client) => {
                info!("Client disconnected with ID: {}", client_id);
                self.notify_host(Notification::ClientDisconnected { client_id });
            }
            Some(Departure::Host) => {
                info!("Host disconnected with ID: {}", client_id);
            }
            Some(Departure::Unregistered) => {
                info!("Connection closed with ID: {}", client_id);
            }
            None => {
                debug!("Close for unknown connection {} ignored", client_id);
            }
        }
    }

    fn dispatch(&mut self, sender: &Connection, inbound: Inbound) {
        match inbound {
            Inbound::Register { role, value } => self.handle_register(sender, role, value),
            Inbound::Message { message } => self.handle_message(sender, &message),
            Inbound::Ready { value } => self.handle_ready(sender, value),
            Inbound::Controls { value } => self.handle_controls(sender, value),
        }
    }

    fn handle_register(&mut self, sender: &Connection, role: Role, profile: PlayerProfile) {
        match role {
            Role::Host => {
                if let Some(previous) = self.registry.set_host(sender.clone()) {
                    if previous.id() != sender.id() {
                        info!("Host {} replaced by {}", previous.id(), sender.id());
                    }
                }
                info!("Host registered with ID: {}", sender.id());
            }
            Role::Client => {
                let client_id = sender.id();
                if self.registry.host().is_some_and(|host| host.id() == client_id) {
                    warn!("Host {} tried to register as a client, dropped", client_id);
                    return;
                }
                self.registry.register(client_id, sender.clone());
                info!(
                    "Client registered with ID: {} ({})",
                    client_id,
                    profile.player_name.as_deref().unwrap_or("unnamed")
                );
                self.notify_host(Notification::NewClient { client_id, profile });
            }
        }
    }

    /// Relays the payload verbatim to every other open connection.
    fn handle_message(&self, sender: &Connection, message: &str) {
        debug!("Received from {}: {}", sender.id(), message);

        let mut delivered = 0;
        for peer in self.registry.open_peers(sender.id()) {
            if peer.send_text(message) {
                delivered += 1;
            }
        }
        debug!("Message from {} relayed to {} peers", sender.id(), delivered);
    }

    fn handle_ready(&self, sender: &Connection, profile: PlayerProfile) {
        let Some(client_id) = self.registry.lookup_identifier(sender) else {
            warn!(
                "Ready from unregistered connection {} dropped",
                sender.id()
            );
            return;
        };

        info!(
            "Player ready: {} ({})",
            profile.player_name.as_deref().unwrap_or("unnamed"),
            client_id
        );
        self.notify_host(Notification::PlayerReady { client_id, profile });
    }

    fn handle_controls(&self, sender: &Connection, controls: Map<String, Value>) {
        let Some(client_id) = self.registry.lookup_identifier(sender) else {
            debug!(
                "Controls from unregistered connection {} dropped",
                sender.id()
            );
            return;
        };

        self.notify_host(Notification::PlayerControls {
            client_id,
            controls,
        });
    }

    /// Sends a notification to the host if one is set and open.
    fn notify_host(&self, notification: Notification) -> bool {
        let Some(host) = self.registry.open_host() else {
            debug!("No open host, {} skipped", notification.kind());
            return false;
        };

        match notification.into_envelope().to_text() {
            Ok(text) => host.send_text(text),
            Err(e) => {
                warn!("Failed to encode host notification: {}", e);
                false
            }
        }
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
