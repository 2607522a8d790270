//! Millisecond-precision timestamps as the API expects them.
//!
//! Outgoing instants are truncated to whole milliseconds and written as
//! RFC 3339 with exactly three fractional digits and a `Z` suffix. Incoming
//! values accept any RFC 3339 offset.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Deserializer, Serializer};

/// Drop everything below one millisecond.
pub fn truncate_to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    instant.trunc_subsecs(3)
}

pub fn format(instant: &DateTime<Utc>) -> String {
    truncate_to_millis(*instant).to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `#[serde(with = "crate::timestamp::millis")]` for `DateTime<Utc>` fields.
pub mod millis {
    use super::*;

    pub fn serialize<S: Serializer>(instant: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(instant))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        DateTime::<Utc>::deserialize(deserializer)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Timelike};

    use super::*;

    #[test]
    fn truncation_zeroes_sub_millisecond_part() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 30).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        let truncated = truncate_to_millis(instant);
        assert_eq!(truncated.nanosecond(), 123_000_000);
    }

    #[test]
    fn format_always_has_three_fraction_digits() {
        let instant = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_nano_opt(10, 15, 30, 500_999)
            .unwrap()
            .and_utc();
        assert_eq!(format(&instant), "2024-03-01T10:15:30.000Z");
    }

    #[test]
    fn deserialize_accepts_offsets() {
        #[derive(serde::Deserialize)]
        struct Probe {
            #[serde(with = "super::millis")]
            at: DateTime<Utc>,
        }
        let probe: Probe = serde_json::from_str(r#"{"at":"2024-03-01T13:15:30.123+03:00"}"#).unwrap();
        assert_eq!(format(&probe.at), "2024-03-01T10:15:30.123Z");
    }
}
