//! Wavelink Signal Server
//!
//! Two-party signaling broker for direct call setup. Clients connect over
//! WebSocket, create a room, share its five-character code, and the broker
//! relays session descriptions and ICE candidates between the pair until
//! their own media path is up. It never carries media.
//!
//! # Protocol
//!
//! 1. Creator sends `create_room` and receives the room code
//! 2. Peer joins with `join_room` using the shared code
//! 3. Broker relays offers, answers, and candidates between the two
//! 4. Either side leaving or vanishing tears the room down
//!
//! The [`poll`] module exposes the same broker over request/response
//! endpoints for deployments that cannot hold a persistent connection.

pub mod messages;
pub mod poll;
pub mod registry;
pub mod room;
pub mod router;
pub mod server;

pub use messages::{CallType, SignalMessage};
pub use registry::ConnectionRegistry;
pub use room::{Room, RoomStore};
pub use router::Router;
pub use server::SignalServer;

/// Members per room; the broker is strictly two-party
pub const ROOM_CAPACITY: usize = 2;

/// Attempts to draw an unused room code before giving up
pub const CODE_RETRY_LIMIT: usize = 16;
