use std::time::{SystemTime, UNIX_EPOCH};

/// Unix time in seconds; 0 if the clock reads before the epoch
pub fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

/// Whether something last seen at `last_seen` has outlived `ttl` seconds
pub fn is_expired(last_seen: i64, ttl: i64, now: i64) -> bool {
    now.saturating_sub(last_seen) > ttl
}
