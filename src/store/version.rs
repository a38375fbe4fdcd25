// Content version tags: SHA-256 of the stored bytes

use sha2::{Digest, Sha256};

/// Compute the version tag of `bytes` as a lowercase 64-character hex string.
pub fn compute_version(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
