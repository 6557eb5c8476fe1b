//! Timing helpers
//!
//! Signal frames carry wall-clock milliseconds.

use std::time::{SystemTime, UNIX_EPOCH};

/// Timestamp type (milliseconds since the Unix epoch)
pub type TimestampMs = u64;

/// Current Unix time in milliseconds
pub fn now_ms() -> TimestampMs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as TimestampMs)
        .unwrap_or(0)
}

/// Local UTC offset in the `+HH:MM` form sent with client details.
///
/// The standard library exposes no timezone database, so this reports UTC
/// unless `offset_minutes` is supplied by the caller.
pub fn utc_offset_string(offset_minutes: i32) -> String {
    let sign = if offset_minutes < 0 { '-' } else { '+' };
    let abs = offset_minutes.unsigned_abs();
    format!("{}{:02}:{:02}", sign, abs / 60, abs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_is_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
        assert!(a > 1_600_000_000_000);
    }

    #[test]
    fn test_utc_offset_string() {
        assert_eq!(utc_offset_string(0), "+00:00");
        assert_eq!(utc_offset_string(330), "+05:30");
        assert_eq!(utc_offset_string(-480), "-08:00");
    }
}
