use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use indexmap::IndexMap;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::{dto::ws::ServerMessage, state::game::Role};

/// Identifier of one physical client socket.
pub type ConnectionId = Uuid;

/// Frame queued for a socket writer task.
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    /// Serialize and send as a text frame.
    Message(Arc<ServerMessage>),
    /// Send a close frame and stop writing.
    Close,
}

/// Channel feeding a socket writer task.
pub type OutboundSender = mpsc::UnboundedSender<OutboundFrame>;

/// Handle used by a room to push frames to one connected client.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique identifier of the socket.
    pub id: ConnectionId,
    /// Role declared when the socket was opened.
    pub role: Role,
    /// Team name for team connections.
    pub identity: Option<String>,
    /// Last time anything was heard from the client.
    pub last_heartbeat_at: Instant,
    tx: OutboundSender,
}

impl ConnectionHandle {
    /// Register a freshly joined socket.
    pub fn new(role: Role, identity: Option<String>, tx: OutboundSender) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            identity,
            last_heartbeat_at: Instant::now(),
            tx,
        }
    }

    /// Refresh the heartbeat.
    pub fn touch(&mut self, now: Instant) {
        self.last_heartbeat_at = now;
    }

    /// Whether nothing was heard for longer than `timeout`.
    pub fn is_stale(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_heartbeat_at) > timeout
    }

    /// Queue a message. Returns `false` when the writer is gone.
    pub fn send(&self, message: Arc<ServerMessage>) -> bool {
        self.tx.send(OutboundFrame::Message(message)).is_ok()
    }

    /// Ask the writer to close the socket.
    pub fn close(&self) {
        let _ = self.tx.send(OutboundFrame::Close);
    }
}

/// Fan-out of room messages to every registered connection.
///
/// All sends happen from the room's single processing loop, so successive
/// broadcasts reach each socket queue in order.
#[derive(Debug, Default)]
pub struct BroadcastBus {
    connections: IndexMap<ConnectionId, ConnectionHandle>,
}

impl BroadcastBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection.
    pub fn register(&mut self, handle: ConnectionHandle) -> ConnectionId {
        let id = handle.id;
        self.connections.insert(id, handle);
        id
    }

    /// Deregister a connection, returning its handle.
    pub fn remove(&mut self, id: &ConnectionId) -> Option<ConnectionHandle> {
        self.connections.shift_remove(id)
    }

    /// Look up a connection mutably.
    pub fn get_mut(&mut self, id: &ConnectionId) -> Option<&mut ConnectionHandle> {
        self.connections.get_mut(id)
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Connections currently representing `team_name`.
    pub fn team_connections(&self, team_name: &str) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|handle| handle.role == Role::Team)
            .filter(|handle| handle.identity.as_deref() == Some(team_name))
            .map(|handle| handle.id)
            .collect()
    }

    /// Connections not heard from within `timeout`.
    pub fn stale(&self, now: Instant, timeout: Duration) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|handle| handle.is_stale(now, timeout))
            .map(|handle| handle.id)
            .collect()
    }

    /// Send one message to one connection.
    pub fn send_to(&self, id: &ConnectionId, message: ServerMessage) {
        if let Some(handle) = self.connections.get(id) {
            if !handle.send(Arc::new(message)) {
                debug!(connection = %id, "writer closed; dropping direct message");
            }
        }
    }

    /// Deliver `message` to every connection matching `role_filter` (all roles when `None`).
    pub fn broadcast(&self, message: ServerMessage, role_filter: Option<Role>) {
        let message = Arc::new(message);
        for handle in self.connections.values() {
            if role_filter.is_some_and(|role| role != handle.role) {
                continue;
            }
            if !handle.send(message.clone()) {
                debug!(connection = %handle.id, "writer closed; skipping broadcast");
            }
        }
    }

    /// Close and drop every connection.
    pub fn close_all(&mut self) -> usize {
        let count = self.connections.len();
        for (_, handle) in self.connections.drain(..) {
            handle.close();
        }
        count
    }
}
