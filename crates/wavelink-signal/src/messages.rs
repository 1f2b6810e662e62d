//! Signaling protocol messages
//!
//! Both directions share the same envelope shape `{ "type": ..., fields }`.
//! Session descriptions and ICE candidates are opaque to the broker and
//! travel as raw JSON values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Messages exchanged over the signaling channel
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignalMessage {
    /// Client creates a room and becomes its creator
    CreateRoom {
        #[serde(skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },

    /// Room created successfully
    #[serde(rename_all = "camelCase")]
    RoomCreated { room_id: String },

    /// Client joins a room by its code
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },

    /// Successfully joined: the creator's announced call type (null until
    /// they pick one) and display name ride along
    #[serde(rename_all = "camelCase")]
    RoomJoined {
        room_id: String,
        call_type: Option<CallType>,
        peer_username: String,
    },

    /// Join rejected: the room already has two members
    RoomFull,

    /// The other peer entered the room
    PeerJoined { username: String },

    /// The other peer left or disconnected
    PeerLeft,

    /// Session description offer, relayed to the other peer
    #[serde(rename_all = "camelCase")]
    Offer {
        room_id: String,
        sdp: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },

    /// Session description answer, relayed to the other peer
    #[serde(rename_all = "camelCase")]
    Answer {
        room_id: String,
        sdp: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },

    /// ICE candidate record, relayed to the other peer
    #[serde(rename_all = "camelCase")]
    Candidate {
        room_id: String,
        candidate: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },

    /// Sender started sharing their screen
    #[serde(rename_all = "camelCase")]
    ScreenShareStarted {
        room_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },

    /// Sender stopped sharing their screen
    #[serde(rename_all = "camelCase")]
    ScreenShareStopped {
        room_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },

    /// Sender switched between front and rear camera
    #[serde(rename_all = "camelCase")]
    CameraSwitched {
        room_id: String,
        facing_mode: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },

    /// Sender announced which kind of call they are starting
    #[serde(rename_all = "camelCase")]
    CallTypeSelected {
        room_id: String,
        call_type: CallType,
    },

    /// Derived from `call_type_selected` and sent to the other peer, so a
    /// late joiner learns what kind of call to join
    #[serde(rename_all = "camelCase")]
    CallTypeNotification {
        call_type: CallType,
        username: String,
    },

    /// Sender's media is set up; asks whether the peer is already present
    #[serde(rename_all = "camelCase")]
    Ready {
        #[serde(skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
    },

    /// Reply to `ready` when both peers are in the room
    PeerReady,

    /// Client leaves its room
    #[serde(rename_all = "camelCase")]
    LeaveRoom {
        #[serde(skip_serializing_if = "Option::is_none")]
        room_id: Option<String>,
    },

    /// Operation-level failure reply
    Error { error: String },
}

/// Kind of call the creator announced
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Audio,
    Video,
}

impl std::fmt::Display for CallType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallType::Audio => write!(f, "audio"),
            CallType::Video => write!(f, "video"),
        }
    }
}

impl SignalMessage {
    /// Create an error reply
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Parse from JSON
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// The wire tag, for logging
    pub fn tag(&self) -> &'static str {
        match self {
            Self::CreateRoom { .. } => "create_room",
            Self::RoomCreated { .. } => "room_created",
            Self::JoinRoom { .. } => "join_room",
            Self::RoomJoined { .. } => "room_joined",
            Self::RoomFull => "room_full",
            Self::PeerJoined { .. } => "peer_joined",
            Self::PeerLeft => "peer_left",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::Candidate { .. } => "candidate",
            Self::ScreenShareStarted { .. } => "screen_share_started",
            Self::ScreenShareStopped { .. } => "screen_share_stopped",
            Self::CameraSwitched { .. } => "camera_switched",
            Self::CallTypeSelected { .. } => "call_type_selected",
            Self::CallTypeNotification { .. } => "call_type_notification",
            Self::Ready { .. } => "ready",
            Self::PeerReady => "peer_ready",
            Self::LeaveRoom { .. } => "leave_room",
            Self::Error { .. } => "error",
        }
    }

    /// Whether this tag is relayed verbatim between peers
    pub fn is_relay(&self) -> bool {
        matches!(
            self,
            Self::Offer { .. }
                | Self::Answer { .. }
                | Self::Candidate { .. }
                | Self::ScreenShareStarted { .. }
                | Self::ScreenShareStopped { .. }
                | Self::CameraSwitched { .. }
        )
    }

    /// Stamp the sender's display name onto a relay variant
    pub fn set_username(&mut self, name: String) {
        match self {
            Self::Offer { username, .. }
            | Self::Answer { username, .. }
            | Self::Candidate { username, .. }
            | Self::ScreenShareStarted { username, .. }
            | Self::ScreenShareStopped { username, .. }
            | Self::CameraSwitched { username, .. } => *username = Some(name),
            _ => {}
        }
    }
}
