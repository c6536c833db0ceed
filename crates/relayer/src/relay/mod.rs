//! WebSocket relay: connection registry and broadcast.

mod registry;

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;

use shared::{ButtonEvent, ButtonEventKind};

pub use registry::{Connection, ConnectionRegistry, ConnectionSender, OUTBOUND_BUFFER};

/// What happened to one inbound text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Re-serialized and broadcast to every connection.
    Relayed(ButtonEventKind),
    /// Parsed, but its kind is not rebroadcast.
    Ignored(Option<ButtonEventKind>),
    /// Not a button event payload. Logged and dropped.
    Malformed,
}

/// Relay state: the registry plus best-effort fan-out over it.
#[derive(Debug, Clone)]
pub struct RelayState {
    registry: Arc<ConnectionRegistry>,
}

impl RelayState {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Register a new connection and announce it to everyone, itself included.
    pub fn connect(&self, conn: Connection) {
        let id = conn.id().to_string();
        self.registry.register(conn);
        tracing::info!(conn_id = %id, "Client connected");
        self.broadcast(&format!("Client connected: {}", id));
    }

    pub fn disconnect(&self, id: &str) {
        if self.registry.unregister(id) {
            tracing::info!(conn_id = %id, "Client disconnected");
        }
    }

    /// Send `message` to every open connection in the current snapshot.
    ///
    /// A failed send never stops the batch. A connection whose buffer is full
    /// misses this frame; one whose channel is closed is pruned afterwards.
    pub fn broadcast(&self, message: &str) {
        let mut dead = Vec::new();
        for conn in self.registry.snapshot() {
            if !conn.is_open() {
                dead.push(conn.id().to_string());
                continue;
            }
            match conn.send(message) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(conn_id = %conn.id(), "Outbound buffer full, dropping message");
                }
                Err(e @ TrySendError::Closed(_)) => {
                    tracing::error!(conn_id = %conn.id(), "Error broadcasting message: {}", e);
                    dead.push(conn.id().to_string());
                }
            }
        }
        for id in dead {
            if self.registry.unregister(&id) {
                tracing::debug!(conn_id = %id, "Pruned closed connection");
            }
        }
    }

    /// Parse an inbound frame and rebroadcast it if it is a PRESSED/RELEASED event.
    pub fn handle_frame(&self, conn_id: &str, text: &str) -> FrameOutcome {
        tracing::info!(conn_id = %conn_id, "Received message: {}", text);

        let event: ButtonEvent = match serde_json::from_str(text) {
            Ok(e) => e,
            Err(e) => {
                tracing::error!(conn_id = %conn_id, "Error handling message: {}", e);
                return FrameOutcome::Malformed;
            }
        };
        log_event(&event);

        if !event.is_relayed() {
            return FrameOutcome::Ignored(event.button_event);
        }
        let kind = event.button_event.unwrap_or(ButtonEventKind::Unknown);
        match serde_json::to_string(&event) {
            Ok(json) => {
                tracing::debug!(kind = kind.as_str(), "Broadcasting button event");
                self.broadcast(&json);
                FrameOutcome::Relayed(kind)
            }
            Err(e) => {
                tracing::error!(conn_id = %conn_id, "Error encoding event: {}", e);
                FrameOutcome::Malformed
            }
        }
    }
}

/// Device events are only logged; nothing outlives the process.
fn log_event(event: &ButtonEvent) {
    tracing::info!(
        device_id = event.device_id.as_deref().unwrap_or("unknown"),
        event = event.button_event.map(|k| k.as_str()).unwrap_or("none"),
        "Device event"
    );
}
