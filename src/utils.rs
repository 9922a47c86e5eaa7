//! Display helpers and identifiers.

use std::time::Duration;

use bytesize::ByteSize;

/// Formats a duration in milliseconds for humans: `"850ms"`, `"1s 337ms"`, `"2days 3h"`.
pub fn pretty_milliseconds(ms: u64) -> String {
    humantime::format_duration(Duration::from_millis(ms)).to_string()
}

/// Formats a byte count with decimal units: `"512 B"`, `"1.3 KB"`.
pub fn pretty_bytes(bytes: u64) -> String {
    ByteSize::b(bytes).to_string_as(false)
}

/// Generates a random (v4) UUID string.
pub fn uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn milliseconds_below_a_second() {
        assert_eq!(pretty_milliseconds(0), "0s");
        assert_eq!(pretty_milliseconds(850), "850ms");
    }

    #[test]
    fn fractional_seconds_are_kept() {
        assert_eq!(pretty_milliseconds(1_337), "1s 337ms");
        assert_eq!(pretty_milliseconds(59_999), "59s 999ms");
        assert_eq!(pretty_milliseconds(65_500), "1m 5s 500ms");
    }

    #[test]
    fn milliseconds_as_compound_units() {
        assert_eq!(pretty_milliseconds(3_600_000), "1h");
        assert_eq!(pretty_milliseconds(183_600_000), "2days 3h");
    }

    #[test]
    fn bytes_with_decimal_units() {
        assert_eq!(pretty_bytes(0), "0 B");
        assert_eq!(pretty_bytes(512), "512 B");
        assert_eq!(pretty_bytes(1_337), "1.3 KB");
        assert_eq!(pretty_bytes(ByteSize::gb(518).as_u64()), "518.0 GB");
    }

    #[test]
    fn uuids_are_unique() {
        let a = uuid();
        assert_eq!(a.len(), 36);
        assert_ne!(a, uuid());
    }
}
