//! Checkpoint timestamp parsing.
//!
//! Timestamps are written as RFC 3339 in UTC. Checkpoints produced by older
//! tooling carry naive ISO 8601 values with no offset; those are read as UTC.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

/// Parse an RFC 3339 or offset-less ISO 8601 timestamp.
pub(crate) fn parse(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", raw)))
}

pub(crate) fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse(&raw)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", raw))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_rfc3339() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        assert_eq!(parse("2024-01-15T10:30:00Z"), Some(expected));
        assert_eq!(parse("2024-01-15T12:30:00+02:00"), Some(expected));
    }

    #[test]
    fn test_parse_naive_as_utc() {
        let whole = parse("2024-01-15T10:30:00").unwrap();
        assert_eq!(whole, Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap());

        let micros = parse("2024-01-15T10:30:00.123456").unwrap();
        assert_eq!(micros.timestamp_subsec_micros(), 123456);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse("yesterday"), None);
        assert_eq!(parse(""), None);
    }
}
