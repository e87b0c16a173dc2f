use chrono::{DateTime, Utc};

use crate::types::CredentialRecord;

/// Safety margin for in-flight usage: a record is treated as expired this
/// many milliseconds before its stated expiration.
pub const EXPIRY_SKEW_MS: i64 = 60_000;

/// Whether a cached record can still be handed out.
pub fn is_valid(record: &CredentialRecord) -> bool {
    is_valid_at(record, Utc::now())
}

/// [`is_valid`] against an explicit clock.
///
/// Expired iff `now > expiration - 60s` (millisecond precision). A missing
/// or unparseable `expiration` counts as expired, so the caller re-fetches.
pub fn is_valid_at(record: &CredentialRecord, now: DateTime<Utc>) -> bool {
    let Some(raw) = record.expiration() else {
        return false;
    };
    let Ok(expiration) = DateTime::parse_from_rfc3339(raw) else {
        log::debug!("[tvm] Unparseable expiration '{raw}', treating as expired");
        return false;
    };

    let deadline_ms = expiration.timestamp_millis() - EXPIRY_SKEW_MS;
    now.timestamp_millis() <= deadline_ms
}
