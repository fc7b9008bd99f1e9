//! Timestamps and generated identifiers.
//!
//! Timestamps are RFC 3339 UTC strings with millisecond precision
//! (`2024-05-01T12:00:00.000Z`) so they sort lexicographically.

use chrono::{SecondsFormat, Utc};
use rand::Rng;

/// Current time as an RFC 3339 string with millisecond precision.
#[must_use]
pub fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn epoch_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// A random lowercase base-36 string of the given length.
#[must_use]
pub fn base36_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from_digit(rng.gen_range(0..36), 36).unwrap_or('0'))
        .collect()
}

/// An identifier of the form `{prefix}-{epoch_ms}-{7 base36 chars}`.
#[must_use]
pub fn generate_id(prefix: &str) -> String {
    format!("{prefix}-{}-{}", epoch_millis(), base36_suffix(7))
}
