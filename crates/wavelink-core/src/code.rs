//! Room code generation and parsing
//!
//! Codes are short enough to dictate over voice or type by hand. Generation
//! is stateless: uniqueness against live rooms is the store's concern, not
//! the generator's.

/// Length of a room code in characters
pub const ROOM_CODE_LENGTH: usize = 5;

/// Characters used in room codes (uppercase base-36)
const ROOM_CODE_CHARS: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a random room code (e.g., "K3F9Z")
///
/// # Panics
/// Panics if the system random number generator fails (extremely rare).
/// Use `try_generate_room_code` if you need to handle this case.
pub fn generate_room_code() -> String {
    try_generate_room_code().expect("RNG failed - system entropy source unavailable")
}

/// Try to generate a random room code, returning an error if RNG fails
pub fn try_generate_room_code() -> Result<String, getrandom::Error> {
    let mut bytes = [0u8; ROOM_CODE_LENGTH];
    getrandom::fill(&mut bytes)?;

    Ok(bytes
        .iter()
        .map(|b| ROOM_CODE_CHARS[(*b as usize) % ROOM_CODE_CHARS.len()] as char)
        .collect())
}

/// Normalize a room code (trim whitespace, uppercase)
pub fn normalize_room_code(code: &str) -> String {
    code.trim().chars().map(|c| c.to_ascii_uppercase()).collect()
}

/// Validate a room code format
pub fn validate_room_code(code: &str) -> bool {
    code.len() == ROOM_CODE_LENGTH && code.bytes().all(|b| ROOM_CODE_CHARS.contains(&b))
}
