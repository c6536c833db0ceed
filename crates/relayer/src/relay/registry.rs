//! Registry of open WebSocket connections.

use std::sync::{PoisonError, RwLock};

use tokio::sync::mpsc;
use uuid::Uuid;

/// Outbound frames buffered per connection before new ones are dropped.
pub const OUTBOUND_BUFFER: usize = 256;

/// Sender half of a connection's outbound text channel.
pub type ConnectionSender = mpsc::Sender<String>;

/// Handle to one open connection. Cloning shares the same outbound channel.
#[derive(Debug, Clone)]
pub struct Connection {
    id: String,
    tx: ConnectionSender,
}

impl Connection {
    pub fn new(id: impl Into<String>, tx: ConnectionSender) -> Self {
        Self { id: id.into(), tx }
    }

    /// New connection with a random id, plus the receiver its writer task drains.
    pub fn open() -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        (Self::new(Uuid::new_v4().to_string(), tx), rx)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Open while the writer task still holds the receiver.
    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    /// Queue a frame without waiting. Fails with `Full` when the writer has
    /// fallen `OUTBOUND_BUFFER` frames behind.
    pub fn send(&self, text: &str) -> Result<(), mpsc::error::TrySendError<String>> {
        self.tx.try_send(text.to_string())
    }
}

/// Live connection set. Readers take a cloned snapshot, so iteration never
/// holds the lock while sending.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<Vec<Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, conn: Connection) {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        connections.retain(|c| c.id != conn.id);
        connections.push(conn);
    }

    /// Remove by id. Returns false if the connection was not registered.
    pub fn unregister(&self, id: &str) -> bool {
        let mut connections = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = connections.len();
        connections.retain(|c| c.id != id);
        connections.len() != before
    }

    pub fn snapshot(&self) -> Vec<Connection> {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.connections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
