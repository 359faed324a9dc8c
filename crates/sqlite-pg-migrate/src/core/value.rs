//! SQL value types for moving rows between SQLite and PostgreSQL.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

/// A raw row keyed by column name, as read from either store.
pub type Row = HashMap<String, SqlValue>;

/// Cell value with enough type information to coerce it into an entity field.
///
/// SQLite hands back storage classes (`Integer`, `Real`, `Text`, `Bytes`);
/// PostgreSQL hands back typed values (`Uuid`, `Date`, `Timestamp`). Entity
/// construction accepts either shape for the same field.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL.
    Null,

    /// 64-bit signed integer.
    Integer(i64),

    /// Double precision float.
    Real(f64),

    /// Text data.
    Text(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// UUID value.
    Uuid(Uuid),

    /// Date without time component.
    Date(NaiveDate),

    /// Timestamp with time zone, normalised to UTC.
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Short name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Integer(_) => "integer",
            SqlValue::Real(_) => "real",
            SqlValue::Text(_) => "text",
            SqlValue::Bytes(_) => "bytes",
            SqlValue::Uuid(_) => "uuid",
            SqlValue::Date(_) => "date",
            SqlValue::Timestamp(_) => "timestamp",
        }
    }

    /// Render the value as PostgreSQL text input, `None` for NULL.
    ///
    /// Paired with an explicit cast in the statement, this lets every bind
    /// parameter travel as text.
    pub fn to_pg_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Integer(n) => Some(n.to_string()),
            SqlValue::Real(n) => Some(n.to_string()),
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Bytes(b) => {
                let mut out = String::with_capacity(2 + b.len() * 2);
                out.push_str("\\x");
                for byte in b {
                    out.push_str(&format!("{:02x}", byte));
                }
                Some(out)
            }
            SqlValue::Uuid(u) => Some(u.to_string()),
            SqlValue::Date(d) => Some(d.to_string()),
            SqlValue::Timestamp(ts) => {
                Some(ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true))
            }
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_pg_text() {
            Some(text) => write!(f, "{}", text),
            None => write!(f, "NULL"),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Integer(value)
    }
}

impl From<f64> for SqlValue {
    fn from(value: f64) -> Self {
        SqlValue::Real(value)
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<Uuid> for SqlValue {
    fn from(value: Uuid) -> Self {
        SqlValue::Uuid(value)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(value: NaiveDate) -> Self {
        SqlValue::Date(value)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(value: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(value)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SqlValue::Null)
    }
}
