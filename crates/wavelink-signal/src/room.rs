//! Rooms and the room store
//!
//! The store is the single source of truth for membership. Connections
//! carry only a room code back-reference, so every operation resolves the
//! room by code here, inside one atomic step per room.

use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use wavelink_core::code::generate_room_code;
use wavelink_core::{RoomError, DEFAULT_USERNAME, MAX_USERNAME_LEN};

use crate::messages::CallType;
use crate::{CODE_RETRY_LIMIT, ROOM_CAPACITY};

/// A member of a room, keyed by the owning connection's id
#[derive(Clone, Debug)]
pub struct RoomMember {
    pub id: String,
    pub username: String,
    /// Call type this member announced, if any; `members[0]`'s value is
    /// what late joiners are told
    pub call_type: Option<CallType>,
}

impl RoomMember {
    /// Build a member record, applying display-name hygiene
    pub fn new(id: impl Into<String>, username: Option<String>) -> Self {
        Self {
            id: id.into(),
            username: clean_username(username),
            call_type: None,
        }
    }
}

/// Normalize a client-supplied display name: empty or missing names become
/// the default, long names are truncated
pub fn clean_username(name: Option<String>) -> String {
    match name {
        Some(n) if !n.is_empty() => n.chars().take(MAX_USERNAME_LEN).collect(),
        _ => DEFAULT_USERNAME.to_string(),
    }
}

/// A two-party signaling room
pub struct Room {
    /// Room code, uppercase base-36
    pub code: String,
    /// Ordered members; the first entry is the creator
    members: Vec<RoomMember>,
    /// Outbound events waiting to be drained (polling mode only)
    pending: Vec<Value>,
    /// Last activity time
    last_activity: Instant,
}

impl Room {
    fn new(code: String, creator: RoomMember) -> Self {
        Self {
            code,
            members: vec![creator],
            pending: Vec::new(),
            last_activity: Instant::now(),
        }
    }

    /// The first entrant. A room never exists without members, so this
    /// cannot fail while the room is in the store.
    fn creator(&self) -> &RoomMember {
        &self.members[0]
    }

    fn member(&self, id: &str) -> Option<&RoomMember> {
        self.members.iter().find(|m| m.id == id)
    }

    fn member_mut(&mut self, id: &str) -> Option<&mut RoomMember> {
        self.members.iter_mut().find(|m| m.id == id)
    }

    /// Member ids other than `id`, in join order
    fn peer_ids(&self, id: &str) -> Vec<String> {
        self.members
            .iter()
            .filter(|m| m.id != id)
            .map(|m| m.id.clone())
            .collect()
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= ROOM_CAPACITY
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Check if the room has been idle for longer than `ttl`
    pub fn is_idle(&self, ttl: Duration) -> bool {
        self.last_activity.elapsed() > ttl
    }

    /// Update last activity time
    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}

/// Everything the router needs after a successful join, resolved inside
/// the room's atomic section
#[derive(Debug)]
pub struct JoinAccept {
    pub code: String,
    /// The creator's display name
    pub peer_username: String,
    /// The creator's announced call type, if a call already started
    pub call_type: Option<CallType>,
    /// Members to notify with `peer_joined`
    pub notify: Vec<String>,
}

/// Result of removing a member from its room
pub struct Departure {
    /// Members to notify with `peer_left`
    pub notify: Vec<String>,
    /// Whether the room emptied and was deleted
    pub deleted: bool,
}

/// Sender name and delivery targets for a relayed message
pub struct RelayTargets {
    pub username: String,
    pub targets: Vec<String>,
}

/// Concurrency-safe mapping from room code to room
///
/// Mutations against a single room are serialized by the map's per-entry
/// exclusive references; sends to peers happen after the mutation commits.
pub struct RoomStore {
    rooms: DashMap<String, Room>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Create a room with `creator` as its sole member, returning the code.
    ///
    /// Codes are drawn blind; an occupied code is redrawn rather than
    /// overwriting an in-flight room.
    ///
    /// # Panics
    /// Panics when no free code is found after [`CODE_RETRY_LIMIT`] draws.
    /// The code space holds 36^5 entries, so at human-driven room counts
    /// this means the entropy source is broken.
    pub fn create(&self, creator: RoomMember) -> String {
        for _ in 0..CODE_RETRY_LIMIT {
            let code = generate_room_code();
            match self.rooms.entry(code.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(Room::new(code.clone(), creator));
                    return code;
                }
                Entry::Occupied(_) => {
                    warn!("Room code {} already in use, redrawing", code);
                }
            }
        }
        panic!("no unused room code after {CODE_RETRY_LIMIT} draws");
    }

    /// Admit `member` into the room, atomically with the capacity check.
    ///
    /// A failed join leaves the room untouched.
    pub fn join(&self, code: &str, member: RoomMember) -> Result<JoinAccept, RoomError> {
        let mut room = self.rooms.get_mut(code).ok_or(RoomError::NotFound)?;
        if room.is_full() {
            return Err(RoomError::Full);
        }

        let creator = room.creator();
        let accept = JoinAccept {
            code: room.code.clone(),
            peer_username: creator.username.clone(),
            call_type: creator.call_type,
            notify: room.peer_ids(&member.id),
        };

        room.members.push(member);
        room.touch();
        Ok(accept)
    }

    /// Remove `member_id` from the room. Deletes the room the instant it
    /// empties. Returns None when the room is gone or the member was never
    /// in it.
    pub fn leave(&self, code: &str, member_id: &str) -> Option<Departure> {
        let (notify, emptied) = {
            let mut room = self.rooms.get_mut(code)?;
            let before = room.members.len();
            room.members.retain(|m| m.id != member_id);
            if room.members.len() == before {
                return None;
            }
            room.touch();
            (room.peer_ids(member_id), room.is_empty())
        };

        // Guard re-checked under the entry lock: a concurrent join between
        // the release above and this call must win
        let deleted = emptied && self.rooms.remove_if(code, |_, room| room.is_empty()).is_some();
        if deleted {
            debug!("Room {} is now empty and has been deleted", code);
        }

        Some(Departure { notify, deleted })
    }

    /// Resolve the sender's display name and the other members' ids for a
    /// verbatim relay. None when the room is gone or the sender is not a
    /// member of it.
    pub fn relay_targets(&self, code: &str, sender_id: &str) -> Option<RelayTargets> {
        let room = self.rooms.get(code)?;
        let sender = room.member(sender_id)?;
        Some(RelayTargets {
            username: sender.username.clone(),
            targets: room.peer_ids(sender_id),
        })
    }

    /// Record the call type the sender announced and resolve the derived
    /// notification's targets
    pub fn select_call_type(
        &self,
        code: &str,
        member_id: &str,
        call_type: CallType,
    ) -> Option<RelayTargets> {
        let mut room = self.rooms.get_mut(code)?;
        let username = {
            let member = room.member_mut(member_id)?;
            member.call_type = Some(call_type);
            member.username.clone()
        };
        room.touch();
        Some(RelayTargets {
            username,
            targets: room.peer_ids(member_id),
        })
    }

    /// Whether the room currently holds both members
    pub fn is_paired(&self, code: &str) -> bool {
        self.rooms
            .get(code)
            .map(|r| r.member_count() == ROOM_CAPACITY)
            .unwrap_or(false)
    }

    /// Queue an event for polling clients to drain. Returns false when the
    /// room is unknown.
    pub fn push_pending(&self, code: &str, event: Value) -> bool {
        match self.rooms.get_mut(code) {
            Some(mut room) => {
                room.pending.push(event);
                room.touch();
                true
            }
            None => false,
        }
    }

    /// Drain queued events in arrival order, refreshing the activity clock
    pub fn drain_pending(&self, code: &str) -> Option<Vec<Value>> {
        let mut room = self.rooms.get_mut(code)?;
        room.touch();
        Some(std::mem::take(&mut room.pending))
    }

    /// Record the announced call type on the creator (polling mode carries
    /// no sender identity on signals)
    pub fn set_creator_call_type(&self, code: &str, call_type: CallType) -> bool {
        match self.rooms.get_mut(code) {
            Some(mut room) => {
                room.members[0].call_type = Some(call_type);
                room.touch();
                true
            }
            None => false,
        }
    }

    /// Delete a room outright (polling mode's delayed leave)
    pub fn remove(&self, code: &str) -> bool {
        self.rooms.remove(code).is_some()
    }

    /// Delete rooms idle for longer than `ttl`, returning how many went
    pub fn purge_idle(&self, ttl: Duration) -> usize {
        let stale: Vec<String> = self
            .rooms
            .iter()
            .filter(|r| r.is_idle(ttl))
            .map(|r| r.code.clone())
            .collect();

        let count = stale.len();
        for code in stale {
            self.rooms.remove(&code);
            info!("Room {} removed (idle timeout)", code);
        }
        count
    }

    /// Number of live rooms (for monitoring)
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of members across all rooms (for monitoring)
    pub fn member_count(&self) -> usize {
        self.rooms.iter().map(|r| r.member_count()).sum()
    }
}

impl Default for RoomStore {
    fn default() -> Self {
        Self::new()
    }
}
