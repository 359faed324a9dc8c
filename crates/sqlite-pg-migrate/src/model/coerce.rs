//! Field coercions applied while constructing entity records.
//!
//! Each function accepts the loosely typed value a store hands back (text from
//! SQLite, typed values from PostgreSQL) and returns the structured form the
//! entity stores. Nothing else in the crate converts these representations.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use uuid::Uuid;

use crate::core::value::{Row, SqlValue};

use super::RecordError;

/// Offset-carrying timestamp layouts, tried after RFC 3339.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

/// Naive timestamp layouts, read as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Remove a field from the row, failing if the column is absent.
pub fn take(row: &mut Row, field: &'static str) -> Result<SqlValue, RecordError> {
    row.remove(field).ok_or(RecordError::MissingField(field))
}

/// Fail if the row still carries columns no field consumed.
pub fn ensure_consumed(row: Row) -> Result<(), RecordError> {
    let mut leftover: Vec<String> = row.into_keys().collect();
    if leftover.is_empty() {
        return Ok(());
    }
    leftover.sort();
    Err(RecordError::UnexpectedField(leftover.join(", ")))
}

/// Apply `coerce` unless the value is NULL.
pub fn optional<T>(
    value: SqlValue,
    coerce: impl FnOnce(SqlValue) -> Result<T, RecordError>,
) -> Result<Option<T>, RecordError> {
    if value.is_null() {
        Ok(None)
    } else {
        coerce(value).map(Some)
    }
}

/// Coerce a UUID given as text, raw 16 bytes, or an already structured value.
pub fn coerce_uuid(field: &'static str, value: SqlValue) -> Result<Uuid, RecordError> {
    match value {
        SqlValue::Uuid(u) => Ok(u),
        SqlValue::Text(s) => Uuid::parse_str(s.trim()).map_err(|_| RecordError::InvalidUuid {
            field,
            value: s,
        }),
        SqlValue::Bytes(b) => Uuid::from_slice(&b).map_err(|_| RecordError::InvalidUuid {
            field,
            value: format!("{} raw bytes", b.len()),
        }),
        SqlValue::Null => Err(RecordError::NullField(field)),
        other => Err(RecordError::WrongKind {
            field,
            expected: "uuid",
            got: other.kind(),
        }),
    }
}

/// Coerce an ISO-8601 timestamp. Structured timestamps pass through unchanged.
pub fn coerce_timestamp(field: &'static str, value: SqlValue) -> Result<DateTime<Utc>, RecordError> {
    match value {
        SqlValue::Timestamp(ts) => Ok(ts),
        SqlValue::Text(s) => {
            parse_timestamp(&s).ok_or(RecordError::InvalidTimestamp { field, value: s })
        }
        SqlValue::Null => Err(RecordError::NullField(field)),
        other => Err(RecordError::WrongKind {
            field,
            expected: "timestamp",
            got: other.kind(),
        }),
    }
}

/// Coerce a calendar date given as `YYYY-MM-DD` text or a structured date.
pub fn coerce_date(field: &'static str, value: SqlValue) -> Result<NaiveDate, RecordError> {
    match value {
        SqlValue::Date(d) => Ok(d),
        SqlValue::Timestamp(ts) => Ok(ts.date_naive()),
        SqlValue::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .ok()
            .or_else(|| parse_timestamp(&s).map(|ts| ts.date_naive()))
            .ok_or(RecordError::InvalidDate { field, value: s }),
        SqlValue::Null => Err(RecordError::NullField(field)),
        other => Err(RecordError::WrongKind {
            field,
            expected: "date",
            got: other.kind(),
        }),
    }
}

/// Coerce an integer, real or numeric text into `f64`.
pub fn coerce_real(field: &'static str, value: SqlValue) -> Result<f64, RecordError> {
    match value {
        SqlValue::Real(n) => Ok(n),
        SqlValue::Integer(n) => Ok(n as f64),
        SqlValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or(RecordError::InvalidNumber { field, value: s }),
        SqlValue::Null => Err(RecordError::NullField(field)),
        other => Err(RecordError::WrongKind {
            field,
            expected: "real",
            got: other.kind(),
        }),
    }
}

/// Coerce a text value.
pub fn coerce_text(field: &'static str, value: SqlValue) -> Result<String, RecordError> {
    match value {
        SqlValue::Text(s) => Ok(s),
        SqlValue::Null => Err(RecordError::NullField(field)),
        other => Err(RecordError::WrongKind {
            field,
            expected: "text",
            got: other.kind(),
        }),
    }
}

/// Check that a number lies in `[min, max]`.
pub fn ensure_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<f64, RecordError> {
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(RecordError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

/// Parse an ISO-8601 timestamp into UTC at microsecond precision.
///
/// A value without an offset is taken to be UTC. Sub-microsecond digits are
/// dropped because `timestamptz` cannot store them.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();

    let parsed = DateTime::parse_from_rfc3339(text)
        .ok()
        .or_else(|| {
            OFFSET_FORMATS
                .iter()
                .find_map(|fmt| DateTime::parse_from_str(text, fmt).ok())
        })
        .map(|ts| ts.with_timezone(&Utc))
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .or_else(|| {
                    NaiveDate::parse_from_str(text, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
                .map(|naive| naive.and_utc())
        })?;

    truncate_to_micros(parsed)
}

fn truncate_to_micros(ts: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let nanos = ts.nanosecond();
    ts.with_nanosecond(nanos - nanos % 1_000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_parse_timestamp_variants() {
        let midnight = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2020-01-01T00:00:00"), Some(midnight));
        assert_eq!(parse_timestamp("2020-01-01 00:00:00"), Some(midnight));
        assert_eq!(parse_timestamp("2020-01-01T00:00:00Z"), Some(midnight));
        assert_eq!(parse_timestamp("2020-01-01 00:00:00+00"), Some(midnight));
        assert_eq!(parse_timestamp("2020-01-01T03:00:00+03:00"), Some(midnight));
        assert_eq!(parse_timestamp("2020-01-01"), Some(midnight));
    }

    #[test]
    fn test_parse_timestamp_keeps_microseconds() {
        let ts = parse_timestamp("2021-06-16 20:14:09.221838+00").unwrap();
        assert_eq!(ts.nanosecond(), 221_838_000);

        let truncated = parse_timestamp("2021-06-16T20:14:09.123456789Z").unwrap();
        assert_eq!(truncated.nanosecond(), 123_456_000);
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_coerce_uuid_accepts_text_and_structured() {
        let id = Uuid::parse_str("3d8d9bf5-0d90-4353-88ba-4ccc5d2c07ff").unwrap();
        assert_eq!(
            coerce_uuid("id", SqlValue::Text(id.to_string())).unwrap(),
            id
        );
        assert_eq!(coerce_uuid("id", SqlValue::Uuid(id)).unwrap(), id);
        assert_eq!(
            coerce_uuid("id", SqlValue::Bytes(id.as_bytes().to_vec())).unwrap(),
            id
        );
    }

    #[test]
    fn test_coerce_uuid_errors() {
        assert_eq!(
            coerce_uuid("id", SqlValue::Text("not-a-uuid".into())),
            Err(RecordError::InvalidUuid {
                field: "id",
                value: "not-a-uuid".into()
            })
        );
        assert_eq!(
            coerce_uuid("id", SqlValue::Null),
            Err(RecordError::NullField("id"))
        );
        assert!(matches!(
            coerce_uuid("id", SqlValue::Integer(7)),
            Err(RecordError::WrongKind { .. })
        ));
    }

    #[test]
    fn test_coerce_timestamp_passes_structured_through() {
        let ts = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();
        assert_eq!(
            coerce_timestamp("created", SqlValue::Timestamp(ts)).unwrap(),
            ts
        );
    }

    #[test]
    fn test_coerce_date() {
        let d = NaiveDate::from_ymd_opt(1999, 3, 31).unwrap();
        assert_eq!(
            coerce_date("creation_date", SqlValue::Text("1999-03-31".into())).unwrap(),
            d
        );
        assert!(coerce_date("creation_date", SqlValue::Text("31/03/1999".into())).is_err());
    }

    #[test]
    fn test_coerce_real() {
        assert_eq!(coerce_real("rating", SqlValue::Integer(8)).unwrap(), 8.0);
        assert_eq!(coerce_real("rating", SqlValue::Text("7.5".into())).unwrap(), 7.5);
        assert!(coerce_real("rating", SqlValue::Text("NaN".into())).is_err());
    }

    #[test]
    fn test_optional_maps_null_to_none() {
        assert_eq!(
            optional(SqlValue::Null, |v| coerce_real("rating", v)).unwrap(),
            None
        );
    }

    #[test]
    fn test_ensure_consumed_reports_leftovers() {
        let mut row = Row::new();
        row.insert("zeta".into(), SqlValue::Null);
        row.insert("alpha".into(), SqlValue::Null);
        assert_eq!(
            ensure_consumed(row),
            Err(RecordError::UnexpectedField("alpha, zeta".into()))
        );
    }
}
