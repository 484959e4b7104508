//! One-way domain digests for cloud membership checks.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};

/// SHA-256 of the lowercased domain, base64 encoded.
pub fn hash_domain(domain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(domain.to_lowercase().as_bytes());
    STANDARD.encode(hasher.finalize())
}
