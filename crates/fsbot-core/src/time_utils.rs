use std::time::{SystemTime, UNIX_EPOCH};

fn since_epoch() -> std::time::Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// Current unix time in whole seconds.
pub fn current_unix_timestamp() -> u64 {
    since_epoch().as_secs()
}

/// Current unix time in milliseconds, saturating at `u64::MAX`.
pub fn current_unix_timestamp_ms() -> u64 {
    since_epoch().as_millis().try_into().unwrap_or(u64::MAX)
}

/// Returns true once `age_ms` or more has elapsed since `created_unix_ms`.
///
/// Timestamps in the future (clock skew) are never considered old.
pub fn is_older_than_ms(created_unix_ms: u64, age_ms: u64, now_unix_ms: u64) -> bool {
    now_unix_ms
        .checked_sub(created_unix_ms)
        .is_some_and(|elapsed| elapsed >= age_ms)
}
