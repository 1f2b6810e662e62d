//! Wavelink Core - Shared types, room codes, and configuration
//!
//! This crate contains the foundational pieces used across all Wavelink
//! components. It has no dependencies on networking code.

pub mod code;
pub mod config;
pub mod error;

pub use code::{generate_room_code, normalize_room_code, validate_room_code};
pub use config::{Config, ConfigError, HeartbeatConfig, PollConfig, ServerConfig};
pub use error::RoomError;

/// Maximum display name length in characters (longer names are truncated)
pub const MAX_USERNAME_LEN: usize = 20;

/// Display name used when a client does not provide one
pub const DEFAULT_USERNAME: &str = "Anonymous";
