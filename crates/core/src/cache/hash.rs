//! Stable cache keys for the mapping namespace.

use sha2::{Digest, Sha256};

/// Compute the cache key for a `(container_id, mapping_key)` pair.
///
/// The newline separator keeps `("ab", "c")` and `("a", "bc")` apart.
pub fn compute_cache_key(container_id: &str, mapping_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(container_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(mapping_key.as_bytes());
    hex::encode(hasher.finalize())
}
