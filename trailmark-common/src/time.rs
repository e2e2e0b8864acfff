//! Timestamp utilities
//!
//! Timestamps are stored as fixed-width RFC3339 text (millisecond precision,
//! `Z` suffix) so stored values compare lexicographically in SQL.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for storage
pub fn to_db(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp
pub fn from_db(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", s, e)))
}

/// Parse an optional stored timestamp
pub fn from_db_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.map(|v| from_db(&v)).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_round_trip() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        let stored = to_db(ts);
        assert_eq!(from_db(&stored).unwrap(), ts);
    }

    #[test]
    fn test_fixed_width_sorts_chronologically() {
        let early = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1);
        assert!(to_db(early) < to_db(late));
        assert_eq!(to_db(early).len(), to_db(late).len());
    }

    #[test]
    fn test_parse_failure_is_internal_error() {
        assert!(from_db("not-a-timestamp").is_err());
    }
}
