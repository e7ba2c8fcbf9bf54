//! Engagement timestamp parsing and display formatting.
//!
//! The CRM emits timestamps in two shapes depending on record age: epoch
//! milliseconds as a digit string, or an ISO-8601 instant (with or without a
//! trailing `Z`). Both are accepted everywhere a timestamp appears.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parse a raw timestamp into epoch milliseconds.
///
/// Returns `None` when the value is empty or unparseable; callers sort such
/// records at epoch 0.
pub fn parse_timestamp_ms(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if raw.bytes().all(|b| b.is_ascii_digit()) {
        return raw.parse::<i64>().ok();
    }

    if raw.contains('T') {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.timestamp_millis());
        }
        // Zone-less instants like "2026-01-12T15:14:37.106" are taken as UTC.
        let trimmed = raw.trim_end_matches('Z');
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
            return Some(naive.and_utc().timestamp_millis());
        }
    }

    None
}

/// Format a raw timestamp for display as `YYYY-MM-DD HH:MM` (UTC).
///
/// Absent values render as `"Unknown date"`; unparseable values pass through
/// verbatim rather than disappearing.
pub fn format_timestamp(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return "Unknown date".into();
    };

    match parse_timestamp_ms(raw).and_then(DateTime::<Utc>::from_timestamp_millis) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => raw.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_epoch_millis() {
        assert_eq!(parse_timestamp_ms("1700000000000"), Some(1_700_000_000_000));
    }

    #[test]
    fn parses_iso_with_zone() {
        let ms = parse_timestamp_ms("2026-01-12T15:14:37.106Z").unwrap();
        assert_eq!(ms, 1_768_230_877_106);
    }

    #[test]
    fn parses_iso_without_zone() {
        let with_zone = parse_timestamp_ms("2026-01-12T15:14:37Z").unwrap();
        let without = parse_timestamp_ms("2026-01-12T15:14:37").unwrap();
        assert_eq!(with_zone, without);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp_ms(""), None);
        assert_eq!(parse_timestamp_ms("soon"), None);
        assert_eq!(parse_timestamp_ms("12-34-56"), None);
    }

    #[test]
    fn formats_known_and_unknown() {
        assert_eq!(
            format_timestamp(Some("2026-01-12T15:14:37Z")),
            "2026-01-12 15:14"
        );
        assert_eq!(format_timestamp(None), "Unknown date");
        // Unparseable values pass through so the reader still sees something.
        assert_eq!(format_timestamp(Some("Q3 sometime")), "Q3 sometime");
    }
}
