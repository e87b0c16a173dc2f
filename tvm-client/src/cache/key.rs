use sha2::{Digest, Sha256};

/// Derive the cache key for a credential request.
///
/// SHA-256 over `url`, `namespace` and `secret`, newline separated, hex
/// encoded. Two callers sharing a namespace but holding different secrets
/// never share an entry, and the secret cannot be read back from the key.
pub fn derive_cache_key(full_url: &str, namespace: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(full_url.as_bytes());
    hasher.update(b"\n");
    hasher.update(namespace.as_bytes());
    hasher.update(b"\n");
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}
