//! Error types for the Wavelink broker

use thiserror::Error;

/// Room membership errors
///
/// Terminal for the single requested operation only; they never tear down
/// the connection or touch other rooms. The display strings are the exact
/// text surfaced to clients.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomError {
    /// The requested room id is not in the store
    #[error("Room not found")]
    NotFound,

    /// The room already has two members
    #[error("Room is full")]
    Full,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_visible_text() {
        // Clients match on this string verbatim
        assert_eq!(RoomError::NotFound.to_string(), "Room not found");
    }
}
