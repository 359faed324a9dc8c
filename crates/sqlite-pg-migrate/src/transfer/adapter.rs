//! Column adapter between the source naming and the semantic naming.
//!
//! The source store calls two timestamp columns `created_at`/`updated_at`;
//! the entity model and the destination call them `created`/`modified`.
//! [`to_source_query`] rewrites a statement written with semantic names,
//! [`to_semantic_row`] renames and parses a raw source row back.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::value::{Row, SqlValue};
use crate::model::coerce::parse_timestamp;
use crate::model::{DivergentColumn, RecordError};

/// Whole-word matchers for each semantic name.
static SEMANTIC_PATTERNS: Lazy<Vec<(Regex, DivergentColumn)>> = Lazy::new(|| {
    DivergentColumn::ALL
        .iter()
        .filter_map(|column| {
            Regex::new(&format!(r"\b{}\b", regex::escape(column.semantic())))
                .ok()
                .map(|re| (re, *column))
        })
        .collect()
});

/// Rewrite semantic column names in `query` to their source names.
///
/// Only whole identifiers are replaced: `created` becomes `created_at`, but
/// `created_by` and `created_at` are left alone.
pub fn to_source_query(query: &str) -> String {
    SEMANTIC_PATTERNS
        .iter()
        .fold(query.to_string(), |acc, (re, column)| {
            re.replace_all(&acc, column.source()).into_owned()
        })
}

/// Move source-named columns of a raw row to their semantic names.
///
/// Text values are parsed as ISO-8601 timestamps; structured values pass
/// through unchanged. Columns absent from the row are skipped.
pub fn to_semantic_row(mut row: Row) -> Result<Row, RecordError> {
    for column in DivergentColumn::ALL {
        let Some(value) = row.remove(column.source()) else {
            continue;
        };
        let value = match value {
            SqlValue::Text(text) => match parse_timestamp(&text) {
                Some(ts) => SqlValue::Timestamp(ts),
                None => {
                    return Err(RecordError::InvalidTimestamp {
                        field: column.semantic(),
                        value: text,
                    })
                }
            },
            other => other,
        };
        row.insert(column.semantic().to_string(), value);
    }
    Ok(row)
}
