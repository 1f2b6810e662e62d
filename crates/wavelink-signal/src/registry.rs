//! Connection registry for the WebSocket transport
//!
//! Tracks live connections and their per-connection metadata: the outbound
//! frame channel, the room back-reference (a code, never a Room pointer),
//! and the liveness flag driven by the heartbeat.

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::warn;

use crate::messages::SignalMessage;

/// Opaque connection identifier
pub type ConnId = String;

/// Generate a unique connection id (8 random bytes, hex-encoded)
pub fn generate_conn_id() -> ConnId {
    let mut bytes = [0u8; 8];
    getrandom::fill(&mut bytes).expect("RNG failed - system entropy source unavailable");
    hex::encode(bytes)
}

/// Per-connection bookkeeping
struct ConnEntry {
    /// Outbound frames; the connection task drains this into the socket
    sender: mpsc::UnboundedSender<Message>,
    /// Back-reference into the room store, by code
    room: Option<String>,
    /// Cleared when a probe goes out, set again by the pong
    alive: bool,
}

/// Live transport connections
pub struct ConnectionRegistry {
    conns: DashMap<ConnId, ConnEntry>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            conns: DashMap::new(),
        }
    }

    /// Track a freshly accepted connection
    pub fn register(&self, id: &str, sender: mpsc::UnboundedSender<Message>) {
        self.conns.insert(
            id.to_string(),
            ConnEntry {
                sender,
                room: None,
                alive: true,
            },
        );
    }

    /// Forget a connection; its channel closes with it
    pub fn remove(&self, id: &str) {
        self.conns.remove(id);
    }

    /// Number of tracked connections (for monitoring)
    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    /// The connection's assigned room code, if any
    pub fn room(&self, id: &str) -> Option<String> {
        self.conns.get(id).and_then(|e| e.room.clone())
    }

    pub fn set_room(&self, id: &str, code: &str) {
        if let Some(mut entry) = self.conns.get_mut(id) {
            entry.room = Some(code.to_string());
        }
    }

    pub fn clear_room(&self, id: &str) {
        if let Some(mut entry) = self.conns.get_mut(id) {
            entry.room = None;
        }
    }

    /// The connection answered the latest probe
    pub fn mark_alive(&self, id: &str) {
        if let Some(mut entry) = self.conns.get_mut(id) {
            entry.alive = true;
        }
    }

    /// Serialize and deliver one message. A missing or closed connection is
    /// a skip, not an error: there is no delivery queue, and the peer's own
    /// teardown notifies whoever needs to know.
    pub fn send(&self, id: &str, msg: &SignalMessage) -> bool {
        let Some(entry) = self.conns.get(id) else {
            return false;
        };
        let json = match msg.to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize {} message: {}", msg.tag(), e);
                return false;
            }
        };
        entry.sender.send(Message::Text(json)).is_ok()
    }

    /// One heartbeat pass: connections that answered the previous probe are
    /// marked pending and probed again; the rest get a Close frame, which
    /// ends their task and runs the normal disconnect path. Returns how
    /// many were terminated.
    pub fn sweep(&self) -> usize {
        let mut terminated = 0;
        for mut entry in self.conns.iter_mut() {
            if entry.alive {
                entry.alive = false;
                let _ = entry.sender.send(Message::Ping(Vec::new()));
            } else {
                let _ = entry.sender.send(Message::Close(None));
                terminated += 1;
            }
        }
        terminated
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
