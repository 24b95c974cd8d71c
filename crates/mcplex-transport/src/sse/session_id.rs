//! 128-bit cryptographically random session identifiers (spec §4.2.2,
//! §8 "Session ID collisions are prevented by cryptographic randomness").

use rand::RngCore;

/// Renders as 32 lowercase hex characters.
pub fn generate() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
