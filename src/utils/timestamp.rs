//! Message timestamps on the wire.
//!
//! Timestamps are written in UTC with millisecond precision
//! (`2024-05-01T12:00:00.000Z`), the shape browsers produce. On input any
//! RFC 3339 string or a count of milliseconds since the Unix epoch is accepted.

use serde::{Deserialize, Deserializer, Serializer};
use time::format_description::FormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

const WIRE_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z");

#[derive(Deserialize)]
#[serde(untagged)]
enum Raw {
    Text(String),
    EpochMillis(i64),
}

/// Truncate to whole milliseconds in UTC, the precision the wire keeps.
pub fn normalize(timestamp: OffsetDateTime) -> OffsetDateTime {
    let utc = timestamp.to_offset(UtcOffset::UTC);
    utc.replace_nanosecond(u32::from(utc.millisecond()) * 1_000_000)
        .unwrap_or(utc)
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<OffsetDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let parsed = match Raw::deserialize(deserializer)? {
        Raw::Text(text) => OffsetDateTime::parse(&text, &Rfc3339).map_err(serde::de::Error::custom)?,
        Raw::EpochMillis(millis) => {
            OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
                .map_err(serde::de::Error::custom)?
        }
    };
    Ok(normalize(parsed))
}

pub fn serialize<S>(timestamp: &OffsetDateTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let formatted = timestamp
        .to_offset(UtcOffset::UTC)
        .format(WIRE_FORMAT)
        .map_err(serde::ser::Error::custom)?;
    serializer.serialize_str(&formatted)
}
