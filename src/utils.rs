use chrono::{DateTime, DurationRound, NaiveDateTime, TimeDelta, Timelike, Utc};
use serde::de::DeserializeOwned;

use crate::source::SourceError;

/// Decode JSON, reporting the path of the field that failed.
pub fn decode_json<T: DeserializeOwned>(body: &str) -> Result<T, serde_path_to_error::Error<serde_json::Error>> {
    let de = &mut serde_json::Deserializer::from_str(body);
    serde_path_to_error::deserialize(de)
}

impl From<serde_path_to_error::Error<serde_json::Error>> for SourceError {
    fn from(value: serde_path_to_error::Error<serde_json::Error>) -> Self {
        SourceError::Decode {
            path: value.path().to_string(),
            message: value.inner().to_string(),
        }
    }
}

/// Parse the network's timestamps: RFC 3339, or a naive `...T..` form with a
/// trailing `Z` and up to nanosecond fractions.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    let trimmed = raw.trim().trim_end_matches('Z');
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(|e| format!("could not parse timestamp {:?}: {}", raw, e))
}

/// Round to the nearest minute; exactly :30 rounds down.
pub fn round_to_nearest_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    let floor = ts.duration_trunc(TimeDelta::minutes(1)).unwrap_or(ts);
    if ts.second() > 30 {
        floor + TimeDelta::minutes(1)
    } else {
        floor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_network_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 5).unwrap();
        assert_eq!(parse_timestamp("2024-01-15T12:00:05Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-01-15T12:00:05+00:00").unwrap(), expected);
        assert_eq!(
            parse_timestamp("2024-01-15T12:00:05.250Z").unwrap(),
            expected + TimeDelta::milliseconds(250)
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn rounding_to_minute() {
        let base = Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap();
        assert_eq!(round_to_nearest_minute(base + TimeDelta::seconds(30)), base);
        assert_eq!(
            round_to_nearest_minute(base + TimeDelta::seconds(31)),
            base + TimeDelta::minutes(1)
        );
        assert_eq!(round_to_nearest_minute(base + TimeDelta::milliseconds(900)), base);
    }

    #[test]
    fn decode_errors_carry_the_field_path() {
        let err = decode_json::<Vec<crate::models::shed::SiteDoc>>(r#"[{"id":"gh1","lat":"north"}]"#)
            .expect_err("lat is not a number");
        let err = SourceError::from(err);
        match err {
            SourceError::Decode { path, .. } => assert_eq!(path, "[0].lat"),
            other => panic!("unexpected error: {}", other),
        }
    }
}
