//! Log sanitization utilities
//!
//! Keeps TVM response bodies (which carry live credentials) and caller auth
//! secrets out of debug/error logs.

/// Maximum number of characters to include in truncated log output.
const TRUNCATE_LIMIT: usize = 256;

/// Number of leading characters of a secret that may be shown.
const SECRET_VISIBLE_PREFIX: usize = 4;

/// MSRV-compatible replacement for `str::floor_char_boundary` (stable since 1.91.0).
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        s.len()
    } else {
        let mut i = index;
        while i > 0 && !s.is_char_boundary(i) {
            i -= 1;
        }
        i
    }
}

/// Truncate a string for safe logging.
///
/// Returns the original string if it's within the limit,
/// otherwise returns the first `TRUNCATE_LIMIT` characters with a suffix
/// indicating the total length.
pub fn truncate_for_log(s: &str) -> String {
    if s.len() <= TRUNCATE_LIMIT {
        s.to_string()
    } else {
        format!(
            "{}... [truncated, total {} bytes]",
            &s[..floor_char_boundary(s, TRUNCATE_LIMIT)],
            s.len()
        )
    }
}

/// Mask a secret for display.
///
/// Short secrets are fully hidden; longer ones keep a short prefix so that
/// two different secrets can be told apart in a debug dump.
pub fn mask_secret(secret: &str) -> String {
    if secret.len() <= SECRET_VISIBLE_PREFIX * 2 {
        "****".to_string()
    } else {
        format!(
            "{}****",
            &secret[..floor_char_boundary(secret, SECRET_VISIBLE_PREFIX)]
        )
    }
}
