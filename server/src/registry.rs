//! Connection registry for the relay
//!
//! Tracks every live transport connection, the subset that registered as
//! clients, and the single host. Identifiers are minted here when a
//! connection opens and are never reused for the lifetime of the registry.
//!
//! The registry is owned by the server loop, so none of these operations
//! need locking.

use log::info;
use shared::ClientId;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Sending half of a connection's writer queue
pub type Outbox = mpsc::UnboundedSender<Message>;

/// Transport handle for one live connection
///
/// The connection counts as open while its writer task still holds the
/// receiving end of the outbox.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ClientId,
    outbox: Outbox,
}

impl Connection {
    /// Wraps an outbox under the identifier minted for it
    pub fn new(id: ClientId, outbox: Outbox) -> Self {
        Self { id, outbox }
    }

    /// Identifier minted when the connection opened
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// True while the writer task still drains the outbox
    pub fn is_open(&self) -> bool {
        !self.outbox.is_closed()
    }

    /// Queues a text frame. Returns false if the connection is already gone.
    pub fn send_text(&self, text: impl Into<String>) -> bool {
        if !self.is_open() {
            return false;
        }
        self.outbox.send(Message::text(text.into())).is_ok()
    }
}

/// Role a connection held when it went away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    Client,
    Host,
    Unregistered,
}

pub struct Registry {
    /// Every open connection, registered or not
    connections: HashMap<ClientId, Connection>,
    /// Connections that registered with role `client`
    clients: HashMap<ClientId, Connection>,
    host: Option<Connection>,
    next_client_id: u64,
}

impl Registry {
    /// Creates an empty registry
    ///
    /// Identifiers start from 1 and increment for each new connection.
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
            clients: HashMap::new(),
            host: None,
            next_client_id: 1,
        }
    }

    /// Mints an identifier for a freshly opened connection and starts
    /// tracking it as a broadcast target.
    pub fn connect(&mut self, outbox: Outbox) -> Connection {
        let id = ClientId::new(self.next_client_id);
        self.next_client_id += 1;

        let connection = Connection::new(id, outbox);
        self.connections.insert(id, connection.clone());
        info!("New connection with ID: {}", id);

        connection
    }

    /// Records `connection` as a registered client under `id`.
    pub fn register(&mut self, id: ClientId, connection: Connection) {
        self.clients.insert(id, connection);
    }

    /// Returns the client identifier of `connection`, or None if it never
    /// registered as a client (or has since been removed).
    pub fn lookup_identifier(&self, connection: &Connection) -> Option<ClientId> {
        self.clients.get(&connection.id).map(Connection::id)
    }

    /// Removes a registered client. Returns false if it was not present.
    pub fn remove(&mut self, id: ClientId) -> bool {
        self.clients.remove(&id).is_some()
    }

    /// Makes `connection` the host, returning the one it replaced.
    ///
    /// Last registration wins. A host is never tracked as a client.
    pub fn set_host(&mut self, connection: Connection) -> Option<Connection> {
        self.clients.remove(&connection.id);
        self.host.replace(connection)
    }

    /// The current host, open or not
    ///
    /// Callers that send should prefer [`open_host`](Self::open_host).
    pub fn host(&self) -> Option<&Connection> {
        self.host.as_ref()
    }

    /// The host, if one is set and its connection is still open
    pub fn open_host(&self) -> Option<&Connection> {
        self.host.as_ref().filter(|host| host.is_open())
    }

    /// Looks up any open connection by identifier, registered or not
    pub fn connection(&self, id: ClientId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Forgets a closed connection everywhere it was tracked.
    ///
    /// Returns None if the id was unknown, which happens when the close
    /// event is delivered twice.
    pub fn disconnect(&mut self, id: ClientId) -> Option<Departure> {
        self.connections.remove(&id)?;

        let was_client = self.remove(id);
        let was_host = self.host.as_ref().is_some_and(|host| host.id == id);
        if was_host {
            self.host = None;
        }

        Some(match (was_host, was_client) {
            (true, _) => Departure::Host,
            (false, true) => Departure::Client,
            (false, false) => Departure::Unregistered,
        })
    }

    /// Open connections other than `exclude`, used for broadcasts
    pub fn open_peers(&self, exclude: ClientId) -> impl Iterator<Item = &Connection> {
        self.connections
            .values()
            .filter(move |connection| connection.id != exclude && connection.is_open())
    }

    /// Returns the number of registered clients
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Returns the number of open connections, including the host
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Returns true if no connections are open
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outbox() -> (Outbox, mpsc::UnboundedReceiver<Message>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_registry_creation() {
        let registry = Registry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.client_count(), 0);
        assert!(registry.host().is_none());
    }

    #[test]
    fn test_connect_mints_increasing_ids() {
        let mut registry = Registry::new();
        let (tx1, _rx1) = outbox();
        let (tx2, _rx2) = outbox();

        let first = registry.connect(tx1);
        let second = registry.connect(tx2);

        assert_eq!(first.id(), ClientId::new(1));
        assert_eq!(second.id(), ClientId::new(2));
        assert_eq!(registry.connection_count(), 2);
        // Connecting alone does not make a client
        assert_eq!(registry.client_count(), 0);
    }

    #[test]
    fn test_ids_never_reused() {
        let mut registry = Registry::new();
        let (tx, _rx) = outbox();
        let first = registry.connect(tx.clone());
        registry.disconnect(first.id());

        let second = registry.connect(tx);
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = Registry::new();
        let (tx, _rx) = outbox();
        let connection = registry.connect(tx);

        assert_eq!(registry.lookup_identifier(&connection), None);

        registry.register(connection.id(), connection.clone());
        assert_eq!(registry.lookup_identifier(&connection), Some(connection.id()));
        assert_eq!(registry.client_count(), 1);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut registry = Registry::new();
        let (tx, _rx) = outbox();
        let connection = registry.connect(tx);
        registry.register(connection.id(), connection.clone());

        assert!(registry.remove(connection.id()));
        assert!(!registry.remove(connection.id()));
        assert_eq!(registry.lookup_identifier(&connection), None);
    }

    #[test]
    fn test_set_host_last_writer_wins() {
        let mut registry = Registry::new();
        let (tx1, _rx1) = outbox();
        let (tx2, _rx2) = outbox();
        let first = registry.connect(tx1);
        let second = registry.connect(tx2);

        assert!(registry.set_host(first.clone()).is_none());
        let replaced = registry.set_host(second.clone());

        assert_eq!(replaced.map(|c| c.id()), Some(first.id()));
        assert_eq!(registry.host().map(Connection::id), Some(second.id()));
    }

    #[test]
    fn test_host_is_not_a_client() {
        let mut registry = Registry::new();
        let (tx, _rx) = outbox();
        let connection = registry.connect(tx);
        registry.register(connection.id(), connection.clone());

        registry.set_host(connection.clone());

        assert_eq!(registry.lookup_identifier(&connection), None);
        assert_eq!(registry.client_count(), 0);
    }

    #[test]
    fn test_open_host_skips_closed_connection() {
        let mut registry = Registry::new();
        let (tx, rx) = outbox();
        let host = registry.connect(tx);
        registry.set_host(host);

        assert!(registry.open_host().is_some());
        drop(rx);
        assert!(registry.host().is_some());
        assert!(registry.open_host().is_none());
    }

    #[test]
    fn test_disconnect_reports_role() {
        let mut registry = Registry::new();
        let (tx1, _rx1) = outbox();
        let (tx2, _rx2) = outbox();
        let (tx3, _rx3) = outbox();
        let client = registry.connect(tx1);
        let host = registry.connect(tx2);
        let idle = registry.connect(tx3);

        registry.register(client.id(), client.clone());
        registry.set_host(host.clone());

        assert_eq!(registry.disconnect(client.id()), Some(Departure::Client));
        assert_eq!(registry.disconnect(host.id()), Some(Departure::Host));
        assert_eq!(registry.disconnect(idle.id()), Some(Departure::Unregistered));
        assert_eq!(registry.disconnect(idle.id()), None);

        assert!(registry.is_empty());
        assert!(registry.host().is_none());
    }

    #[test]
    fn test_replaced_host_disconnect_keeps_current_host() {
        let mut registry = Registry::new();
        let (tx1, _rx1) = outbox();
        let (tx2, _rx2) = outbox();
        let old_host = registry.connect(tx1);
        let new_host = registry.connect(tx2);

        registry.set_host(old_host.clone());
        registry.set_host(new_host.clone());

        assert_eq!(
            registry.disconnect(old_host.id()),
            Some(Departure::Unregistered)
        );
        assert_eq!(registry.host().map(Connection::id), Some(new_host.id()));
    }

    #[test]
    fn test_open_peers_excludes_sender_and_closed() {
        let mut registry = Registry::new();
        let (tx1, _rx1) = outbox();
        let (tx2, _rx2) = outbox();
        let (tx3, rx3) = outbox();
        let sender = registry.connect(tx1);
        let open = registry.connect(tx2);
        let _closed = registry.connect(tx3);
        drop(rx3);

        let peers: Vec<ClientId> = registry.open_peers(sender.id()).map(Connection::id).collect();
        assert_eq!(peers, vec![open.id()]);
    }

    #[test]
    fn test_send_text_on_closed_connection() {
        let mut registry = Registry::new();
        let (tx, mut rx) = outbox();
        let connection = registry.connect(tx);

        assert!(connection.send_text("hello"));
        assert_eq!(rx.try_recv().unwrap(), Message::text("hello"));

        drop(rx);
        assert!(!connection.is_open());
        assert!(!connection.send_text("lost"));
    }
}
