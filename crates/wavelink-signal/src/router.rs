//! Inbound message dispatch
//!
//! Classifies each parsed control message and either mutates room
//! membership, relays to the other member, or replies to the sender.
//! Handlers never await: sends are channel pushes, so a slow peer cannot
//! block message intake on other connections.

use std::sync::Arc;

use tracing::{debug, info, warn};

use wavelink_core::normalize_room_code;

use crate::messages::{CallType, SignalMessage};
use crate::registry::ConnectionRegistry;
use crate::room::{RoomMember, RoomStore};

/// Routes control messages between a connection and its room
pub struct Router {
    rooms: Arc<RoomStore>,
    registry: Arc<ConnectionRegistry>,
}

impl Router {
    pub fn new(rooms: Arc<RoomStore>, registry: Arc<ConnectionRegistry>) -> Self {
        Self { rooms, registry }
    }

    /// Handle one inbound message from `conn`
    pub fn dispatch(&self, conn: &str, msg: SignalMessage) {
        match msg {
            SignalMessage::CreateRoom { username } => self.create_room(conn, username),
            SignalMessage::JoinRoom { room_id, username } => {
                self.join_room(conn, &room_id, username)
            }
            SignalMessage::CallTypeSelected { call_type, .. } => {
                self.call_type_selected(conn, call_type)
            }
            SignalMessage::Ready { .. } => self.ready(conn),
            SignalMessage::LeaveRoom { .. } => self.leave_room(conn),
            relay if relay.is_relay() => self.relay(conn, relay),
            other => {
                // Reply tags bounced back by a confused client end up here;
                // tags we have never heard of already failed to parse
                warn!("Ignoring unexpected {} message from {}", other.tag(), conn);
            }
        }
    }

    fn create_room(&self, conn: &str, username: Option<String>) {
        // A connection occupies one room slot; creating departs the old
        // room just like an explicit leave would
        self.leave_room(conn);

        let member = RoomMember::new(conn, username);
        let creator = member.username.clone();
        let code = self.rooms.create(member);
        self.registry.set_room(conn, &code);
        self.registry.send(
            conn,
            &SignalMessage::RoomCreated {
                room_id: code.clone(),
            },
        );
        info!("Room {} created by {}. Waiting for peer to join.", code, creator);
    }

    fn join_room(&self, conn: &str, room_id: &str, username: Option<String>) {
        let code = normalize_room_code(room_id);
        let member = RoomMember::new(conn, username);
        let joiner = member.username.clone();

        match self.rooms.join(&code, member) {
            Ok(accept) => {
                // Depart any previous room only now: a failed join must
                // leave everything untouched
                if self.registry.room(conn).is_some_and(|prev| prev != accept.code) {
                    self.leave_room(conn);
                }
                self.registry.set_room(conn, &accept.code);

                // The waiting creator hears about the joiner first
                for peer in &accept.notify {
                    self.registry.send(
                        peer,
                        &SignalMessage::PeerJoined {
                            username: joiner.clone(),
                        },
                    );
                }

                info!(
                    "{} joined room {}. Call type: {}.",
                    joiner,
                    accept.code,
                    accept
                        .call_type
                        .map(|ct| ct.to_string())
                        .unwrap_or_else(|| "not started".into()),
                );

                self.registry.send(
                    conn,
                    &SignalMessage::RoomJoined {
                        room_id: accept.code,
                        call_type: accept.call_type,
                        peer_username: accept.peer_username,
                    },
                );
            }
            Err(e) => {
                info!("Join attempt on room {} failed: {}", code, e);
                let reply = match e {
                    wavelink_core::RoomError::Full => SignalMessage::RoomFull,
                    wavelink_core::RoomError::NotFound => SignalMessage::error(e.to_string()),
                };
                self.registry.send(conn, &reply);
            }
        }
    }

    /// Verbatim relay to the other member, with the sender's display name
    /// stamped on. A sender outside any room is dropped without a reply;
    /// join_room is the loud path, relays are not.
    fn relay(&self, conn: &str, mut msg: SignalMessage) {
        let Some(code) = self.registry.room(conn) else {
            debug!("Dropping {} from {}: no room assigned", msg.tag(), conn);
            return;
        };
        let Some(relay) = self.rooms.relay_targets(&code, conn) else {
            debug!("Dropping {} from {}: room {} is gone", msg.tag(), conn, code);
            return;
        };

        msg.set_username(relay.username);
        for peer in &relay.targets {
            self.registry.send(peer, &msg);
        }
    }

    fn call_type_selected(&self, conn: &str, call_type: CallType) {
        let Some(code) = self.registry.room(conn) else {
            debug!("Dropping call_type_selected from {}: no room assigned", conn);
            return;
        };
        let Some(relay) = self.rooms.select_call_type(&code, conn, call_type) else {
            return;
        };

        info!("{} selected {} call in room {}", relay.username, call_type, code);

        let note = SignalMessage::CallTypeNotification {
            call_type,
            username: relay.username,
        };
        for peer in &relay.targets {
            self.registry.send(peer, &note);
        }
    }

    /// Reply `peer_ready` only when both members are present; with one
    /// member the sender waits for `peer_joined` instead
    fn ready(&self, conn: &str) {
        let Some(code) = self.registry.room(conn) else {
            return;
        };
        if self.rooms.is_paired(&code) {
            info!("Both peers ready in room {}. Initiating signaling.", code);
            self.registry.send(conn, &SignalMessage::PeerReady);
        }
    }

    /// Explicit `leave_room` and transport disconnect share this path
    pub fn leave_room(&self, conn: &str) {
        let Some(code) = self.registry.room(conn) else {
            return;
        };
        self.registry.clear_room(conn);

        let Some(departure) = self.rooms.leave(&code, conn) else {
            return;
        };
        for peer in &departure.notify {
            self.registry.send(peer, &SignalMessage::PeerLeft);
        }
        info!("Client {} left room {}", conn, code);
    }
}
