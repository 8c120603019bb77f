use sha2::{Digest, Sha256};

/// Stable content signature used as an idempotency key for materialized records.
///
/// Parts are length-prefixed so `["ab", "c"]` and `["a", "bc"]` never collide.
pub fn content_signature(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}
