//! Timestamp conversion between the two platforms.
//!
//! Bitbucket exports RFC 3339 timestamps with microseconds and an offset;
//! GitHub wants whole seconds in UTC. A timestamp that does not parse means
//! the export is broken, so conversion is fallible and callers treat a
//! failure as fatal.

use chrono::{DateTime, Utc};

use crate::error::{MigrateError, Result};

/// Parse a Bitbucket timestamp, e.g. `2019-05-02T10:21:39.320003+00:00`.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|date| date.with_timezone(&Utc))
        .map_err(|e| MigrateError::InvalidTimestamp(format!("'{value}': {e}")))
}

/// Format a timestamp for display in migrated text, minute precision.
pub fn display_date(date: &DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_bitbucket_timestamp() {
        let date = parse_timestamp("2019-05-02T10:21:39.320003+00:00").unwrap();
        let expected = Utc.with_ymd_and_hms(2019, 5, 2, 10, 21, 39).unwrap()
            + chrono::Duration::microseconds(320003);
        assert_eq!(date, expected);
    }

    #[test]
    fn test_parse_normalizes_offset() {
        let date = parse_timestamp("2019-05-02T12:21:39+02:00").unwrap();
        assert_eq!(display_date(&date), "2019-05-02 10:21");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("yesterday").is_err());
        assert!(parse_timestamp("").is_err());
    }

    #[test]
    fn test_display_date() {
        let date = Utc.with_ymd_and_hms(2020, 2, 2, 12, 30, 45).unwrap();
        assert_eq!(display_date(&date), "2020-02-02 12:30");
    }
}
