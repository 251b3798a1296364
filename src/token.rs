//! Verification token generation and comparison.

use rand::RngCore;
use rand::rngs::OsRng;
use subtle::ConstantTimeEq;

/// Entropy per token, in bytes (256 bits).
pub const TOKEN_BYTES: usize = 32;

/// Length of a token in its hex encoding.
pub const TOKEN_LEN: usize = TOKEN_BYTES * 2;

/// Generate a fresh token from the operating system CSPRNG, lowercase hex.
pub fn generate() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Compare a stored token with a submitted one without leaking the length
/// of the common prefix through timing.
pub fn tokens_match(stored: &str, submitted: &str) -> bool {
    stored.as_bytes().ct_eq(submitted.as_bytes()).into()
}
