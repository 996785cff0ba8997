//! Prompt fingerprints used as cache keys.

use sha2::{Digest, Sha256};

/// Length of a fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 12;

/// SHA-256 of the prompt, hex encoded and truncated to 12 characters.
/// Same prompt always produces the same fingerprint.
pub fn fingerprint(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    let mut encoded = hex::encode(&digest[..FINGERPRINT_LEN / 2]);
    encoded.truncate(FINGERPRINT_LEN);
    encoded
}
