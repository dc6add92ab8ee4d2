//! Custom scalar registration and temporal canonicalization.
//!
//! Temporal scalars accept a few lenient textual forms and are
//! rewritten into one canonical form on both input and output, so the
//! same instant always serializes identically regardless of the
//! machine the process runs on:
//!
//! - `Date`: `YYYY-MM-DD`
//! - `DateTime`: `YYYY-MM-DDTHH:MM:SS`, seconds padded in; a value
//!   carrying an offset is converted to UTC and suffixed with `Z`
//! - `DateTimeOffset`: RFC 3339 with explicit offset; offset-less
//!   values are assumed UTC
//!
//! Canonicalization is lenient: a value that does not parse is passed
//! through unchanged and left to the engine's scalar validation.

use async_graphql::Value;
use async_graphql::dynamic::{Scalar, SchemaBuilder};
use time::format_description::FormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::model::ScalarKind;

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const DATE_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// Registers every custom scalar the mapper can emit.
pub fn register_scalars(mut builder: SchemaBuilder) -> SchemaBuilder {
    let scalars = [
        ("Date", "A calendar date in YYYY-MM-DD form"),
        (
            "DateTime",
            "A timestamp in YYYY-MM-DDTHH:MM:SS form; offset-carrying values are normalized to UTC",
        ),
        (
            "DateTimeOffset",
            "An RFC 3339 timestamp with an explicit UTC offset",
        ),
        ("Decimal", "An arbitrary-precision decimal number"),
        ("Duration", "An elapsed time span"),
        ("Base64", "Binary data encoded as base64 text"),
        ("Long", "A 64-bit signed integer"),
    ];

    for (name, description) in scalars {
        builder = builder.register(Scalar::new(name).description(description));
    }

    builder
}

/// Canonicalizes a scalar value where the kind calls for it.
pub fn canonicalize(kind: ScalarKind, value: Value) -> Value {
    if !kind.is_temporal() {
        return value;
    }
    let Value::String(text) = &value else {
        return value;
    };
    let canonical = match kind {
        ScalarKind::Date => canonical_date(text),
        ScalarKind::DateTime => canonical_date_time(text),
        ScalarKind::DateTimeOffset => canonical_date_time_offset(text),
        _ => None,
    };
    match canonical {
        Some(text) => Value::String(text),
        None => value,
    }
}

fn canonical_date(text: &str) -> Option<String> {
    let date = Date::parse(text.trim(), DATE_FORMAT).ok()?;
    date.format(DATE_FORMAT).ok()
}

fn canonical_date_time(text: &str) -> Option<String> {
    let text = text.trim();
    let (body, zone) = split_zone(text);
    let body = pad_seconds(body);
    let parsed = PrimitiveDateTime::parse(&body, DATE_TIME_FORMAT).ok()?;
    match zone {
        None => parsed.format(DATE_TIME_FORMAT).ok(),
        Some(zone) => {
            let offset = parse_zone(zone)?;
            let utc = parsed.assume_offset(offset).to_offset(UtcOffset::UTC);
            Some(format!("{}Z", utc.format(DATE_TIME_FORMAT).ok()?))
        }
    }
}

fn canonical_date_time_offset(text: &str) -> Option<String> {
    let text = text.trim();
    if let Ok(parsed) = OffsetDateTime::parse(text, &Rfc3339) {
        return parsed.format(&Rfc3339).ok();
    }
    let (body, zone) = split_zone(text);
    let body = pad_seconds(body);
    let parsed = PrimitiveDateTime::parse(&body, DATE_TIME_FORMAT).ok()?;
    let offset = match zone {
        None => UtcOffset::UTC,
        Some(zone) => parse_zone(zone)?,
    };
    parsed.assume_offset(offset).format(&Rfc3339).ok()
}

/// Splits a trailing zone designator (`Z` or `+HH:MM`/`-HH:MM`) off a
/// timestamp, if one is present.
fn split_zone(text: &str) -> (&str, Option<&str>) {
    if let Some(body) = text.strip_suffix('Z') {
        return (body, Some("Z"));
    }
    let bytes = text.as_bytes();
    if bytes.len() >= 6 {
        let sign = bytes[bytes.len() - 6];
        if (sign == b'+' || sign == b'-') && bytes[bytes.len() - 3] == b':' {
            // Require a time component so a bare date's day separator
            // is never mistaken for a negative offset.
            let (body, zone) = text.split_at(text.len() - 6);
            if body.contains('T') {
                return (body, Some(zone));
            }
        }
    }
    (text, None)
}

/// Appends `:00` seconds to a minutes-precision timestamp.
fn pad_seconds(body: &str) -> String {
    if body.len() == 16 && body.as_bytes()[10] == b'T' {
        format!("{body}:00")
    } else {
        body.to_string()
    }
}

fn parse_zone(zone: &str) -> Option<UtcOffset> {
    if zone == "Z" {
        return Some(UtcOffset::UTC);
    }
    let (sign, rest) = zone.split_at(1);
    let (hours, minutes) = rest.split_once(':')?;
    let hours: i8 = hours.parse().ok()?;
    let minutes: i8 = minutes.parse().ok()?;
    let (hours, minutes) = if sign == "-" {
        (-hours, -minutes)
    } else {
        (hours, minutes)
    };
    UtcOffset::from_hms(hours, minutes, 0).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canon(kind: ScalarKind, text: &str) -> String {
        match canonicalize(kind, Value::String(text.to_string())) {
            Value::String(s) => s,
            other => panic!("expected string, got {other:?}"),
        }
    }

    #[test]
    fn test_date_round_trips() {
        assert_eq!(canon(ScalarKind::Date, "2013-07-02"), "2013-07-02");
    }

    #[test]
    fn test_date_time_pads_missing_seconds() {
        assert_eq!(
            canon(ScalarKind::DateTime, "2013-07-02T09:00"),
            "2013-07-02T09:00:00"
        );
    }

    #[test]
    fn test_date_time_without_offset_is_unshifted() {
        assert_eq!(
            canon(ScalarKind::DateTime, "2013-07-02T09:00:00"),
            "2013-07-02T09:00:00"
        );
    }

    #[test]
    fn test_date_time_with_offset_converts_to_utc() {
        assert_eq!(
            canon(ScalarKind::DateTime, "2013-07-02T09:00:00+06:00"),
            "2013-07-02T03:00:00Z"
        );
        assert_eq!(
            canon(ScalarKind::DateTime, "2013-07-02T09:00:00Z"),
            "2013-07-02T09:00:00Z"
        );
    }

    #[test]
    fn test_date_time_offset_assumes_utc_when_absent() {
        assert_eq!(
            canon(ScalarKind::DateTimeOffset, "2013-07-02T09:00:00"),
            "2013-07-02T09:00:00Z"
        );
        assert_eq!(
            canon(ScalarKind::DateTimeOffset, "2013-07-02T09:00"),
            "2013-07-02T09:00:00Z"
        );
    }

    #[test]
    fn test_date_time_offset_preserves_explicit_offset() {
        assert_eq!(
            canon(ScalarKind::DateTimeOffset, "2013-07-02T09:00:00+06:00"),
            "2013-07-02T09:00:00+06:00"
        );
    }

    #[test]
    fn test_unparseable_values_pass_through() {
        assert_eq!(canon(ScalarKind::DateTime, "not a date"), "not a date");
        assert_eq!(
            canonicalize(ScalarKind::Date, Value::Number(3.into())),
            Value::Number(3.into())
        );
    }

    #[test]
    fn test_non_temporal_kinds_are_untouched() {
        assert_eq!(
            canonicalize(ScalarKind::Decimal, Value::String("1.50".into())),
            Value::String("1.50".into())
        );
    }
}
