//! XMLTV timestamp parsing and canonical formatting

use chrono::{DateTime, FixedOffset, NaiveDateTime};

/// Output format for `start`/`stop`: "20240115120000 +0100"
pub const CANONICAL_FORMAT: &str = "%Y%m%d%H%M%S %z";

/// Parse a programme timestamp in any accepted layout, keeping its offset.
///
/// Accepted:
/// - XMLTV compact `YYYYMMDD[HH[MM[SS]]]` with optional zone
///   (`+HHMM`, `+HH:MM`, `+HH`, `Z`, `UTC`, `GMT`; none means UTC)
/// - RFC 3339 (`2024-01-15T12:00:00+01:00`)
/// - `YYYY-MM-DD HH:MM:SS` with optional zone
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(dt) = parse_compact(value) {
        return Some(dt);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt);
    }

    parse_spaced(value)
}

/// Format a timestamp the way the writer emits it
pub fn format_timestamp(dt: &DateTime<FixedOffset>) -> String {
    dt.format(CANONICAL_FORMAT).to_string()
}

fn parse_compact(value: &str) -> Option<DateTime<FixedOffset>> {
    let digits = value.bytes().take_while(u8::is_ascii_digit).count();
    if !matches!(digits, 8 | 10 | 12 | 14) {
        return None;
    }

    // Missing time fields default to zero
    let mut padded = value[..digits].to_string();
    padded.push_str(&"000000"[..14 - digits]);
    let naive = NaiveDateTime::parse_from_str(&padded, "%Y%m%d%H%M%S").ok()?;

    let offset = parse_offset(&value[digits..])?;
    naive.and_local_timezone(offset).single()
}

fn parse_spaced(value: &str) -> Option<DateTime<FixedOffset>> {
    let date = value.get(..19).unwrap_or(value);
    let rest = value.get(date.len()..).unwrap_or_default();
    let naive = NaiveDateTime::parse_from_str(date, "%Y-%m-%d %H:%M:%S").ok()?;
    let offset = parse_offset(rest)?;
    naive.and_local_timezone(offset).single()
}

/// Parse a zone suffix. Empty means UTC; anything unrecognized is `None`.
fn parse_offset(zone: &str) -> Option<FixedOffset> {
    let zone = zone.trim();
    if zone.is_empty() || matches!(zone, "Z" | "UTC" | "GMT") {
        return FixedOffset::east_opt(0);
    }

    let sign = match zone.as_bytes()[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let digits: String = zone[1..].chars().filter(|c| *c != ':').collect();
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if hours > 23 || minutes > 59 {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical(value: &str) -> Option<String> {
        parse_timestamp(value).map(|dt| format_timestamp(&dt))
    }

    #[test]
    fn test_xmltv_compact() {
        assert_eq!(canonical("20240115120000 +0100").as_deref(), Some("20240115120000 +0100"));
        assert_eq!(canonical("20240115120000+0100").as_deref(), Some("20240115120000 +0100"));
        assert_eq!(canonical("20240115120000 -05:30").as_deref(), Some("20240115120000 -0530"));
        assert_eq!(canonical("20240115120000").as_deref(), Some("20240115120000 +0000"));
        assert_eq!(canonical("20240115120000 UTC").as_deref(), Some("20240115120000 +0000"));
    }

    #[test]
    fn test_truncated_compact() {
        assert_eq!(canonical("202401151230 +0200").as_deref(), Some("20240115123000 +0200"));
        assert_eq!(canonical("20240115").as_deref(), Some("20240115000000 +0000"));
    }

    #[test]
    fn test_iso_layouts() {
        assert_eq!(canonical("2024-01-15T12:00:00+01:00").as_deref(), Some("20240115120000 +0100"));
        assert_eq!(canonical("2024-01-15T12:00:00Z").as_deref(), Some("20240115120000 +0000"));
        assert_eq!(canonical("2024-01-15 12:00:00").as_deref(), Some("20240115120000 +0000"));
        assert_eq!(canonical("2024-01-15 12:00:00 +0100").as_deref(), Some("20240115120000 +0100"));
    }

    #[test]
    fn test_offset_is_preserved_not_converted() {
        let a = parse_timestamp("20240115120000 +0100").unwrap();
        let b = parse_timestamp("20240115110000 +0000").unwrap();
        assert_eq!(a, b);
        assert_ne!(format_timestamp(&a), format_timestamp(&b));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("tomorrow").is_none());
        assert!(parse_timestamp("20241315120000 +0000").is_none());
        assert!(parse_timestamp("20240115120000 +2500").is_none());
        assert!(parse_timestamp("20240115120000 CET").is_none());
        assert!(parse_timestamp("2024011512").is_some());
        assert!(parse_timestamp("202401151").is_none());
    }
}
