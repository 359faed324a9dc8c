//! Entity model for the movies catalog.
//!
//! Five record kinds are migrated. Three top-level entities carry an `id`
//! plus `created`/`modified` timestamps ([`FilmWork`], [`Genre`],
//! [`Person`]); two association entities carry an `id` plus `created`
//! ([`GenreFilmWork`], [`PersonFilmWork`]).
//!
//! Every entity lists its fields explicitly in [`Entity::FIELDS`]. That order
//! is the column order of both the source SELECT and the destination INSERT,
//! and the order of [`Entity::to_values`].
//!
//! [`TableKind`] is the table-name dispatch: a closed set of five names, any
//! other name is a configuration error.

pub mod coerce;
mod entities;

pub use entities::{FilmWork, FilmWorkType, Genre, GenreFilmWork, Person, PersonFilmWork, PersonRole};

use std::fmt;

use thiserror::Error;
use uuid::Uuid;

use crate::core::value::{Row, SqlValue};
use crate::error::{MigrateError, Result};

/// Why a raw row could not become a typed record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("unexpected field(s): {0}")]
    UnexpectedField(String),

    #[error("field '{0}' must not be null")]
    NullField(&'static str),

    #[error("field '{field}' is not a valid UUID: {value:?}")]
    InvalidUuid { field: &'static str, value: String },

    #[error("field '{field}' is not a valid ISO-8601 timestamp: {value:?}")]
    InvalidTimestamp { field: &'static str, value: String },

    #[error("field '{field}' is not a valid date: {value:?}")]
    InvalidDate { field: &'static str, value: String },

    #[error("field '{field}' is not a valid number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("field '{field}' value {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("field '{field}' has unknown value {value:?} (expected one of: {expected})")]
    UnknownVariant {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("field '{field}' expected {expected}, got {got}")]
    WrongKind {
        field: &'static str,
        expected: &'static str,
        got: &'static str,
    },
}

/// Destination type of an entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Uuid,
    Text,
    Date,
    Real,
    Timestamp,
}

impl FieldKind {
    /// PostgreSQL cast applied to the text-encoded bind parameter.
    pub fn pg_cast(&self) -> &'static str {
        match self {
            FieldKind::Uuid => "::uuid",
            FieldKind::Text => "::text",
            FieldKind::Date => "::date",
            FieldKind::Real => "::double precision",
            FieldKind::Timestamp => "::timestamptz",
        }
    }
}

/// A named, typed entity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl Field {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

/// Columns whose source name differs from the semantic/destination name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivergentColumn {
    Created,
    Modified,
}

impl DivergentColumn {
    pub const ALL: [DivergentColumn; 2] = [DivergentColumn::Created, DivergentColumn::Modified];

    /// Name used by the entity model and the destination.
    pub fn semantic(&self) -> &'static str {
        match self {
            DivergentColumn::Created => "created",
            DivergentColumn::Modified => "modified",
        }
    }

    /// Name used by the source store.
    pub fn source(&self) -> &'static str {
        match self {
            DivergentColumn::Created => "created_at",
            DivergentColumn::Modified => "updated_at",
        }
    }
}

/// A typed record of one table.
pub trait Entity: Sized + Clone + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Table name, shared by source and destination.
    const TABLE: &'static str;

    /// Fields in declared order.
    const FIELDS: &'static [Field];

    /// Primary key.
    fn id(&self) -> Uuid;

    /// Build a record from a row keyed by semantic field names.
    ///
    /// The row must hold exactly [`Self::FIELDS`]; missing and extra columns
    /// are both errors.
    fn from_row(row: Row) -> std::result::Result<Self, RecordError>;

    /// Field values in [`Self::FIELDS`] order.
    fn to_values(&self) -> Vec<SqlValue>;
}

/// The five migratable tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableKind {
    FilmWork,
    Genre,
    GenreFilmWork,
    Person,
    PersonFilmWork,
}

impl TableKind {
    pub const ALL: [TableKind; 5] = [
        TableKind::FilmWork,
        TableKind::Genre,
        TableKind::GenreFilmWork,
        TableKind::Person,
        TableKind::PersonFilmWork,
    ];

    /// Resolve a table name. Unknown names are a configuration error.
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|k| k.name()).collect();
                MigrateError::Config(format!(
                    "Unknown table '{}'. Supported tables: {}",
                    name,
                    known.join(", ")
                ))
            })
    }

    pub fn name(&self) -> &'static str {
        match self {
            TableKind::FilmWork => FilmWork::TABLE,
            TableKind::Genre => Genre::TABLE,
            TableKind::GenreFilmWork => GenreFilmWork::TABLE,
            TableKind::Person => Person::TABLE,
            TableKind::PersonFilmWork => PersonFilmWork::TABLE,
        }
    }

    pub fn fields(&self) -> &'static [Field] {
        match self {
            TableKind::FilmWork => FilmWork::FIELDS,
            TableKind::Genre => Genre::FIELDS,
            TableKind::GenreFilmWork => GenreFilmWork::FIELDS,
            TableKind::Person => Person::FIELDS,
            TableKind::PersonFilmWork => PersonFilmWork::FIELDS,
        }
    }

    /// Field names joined with `", "`, ready for a SELECT list.
    pub fn column_list(&self) -> String {
        self.fields()
            .iter()
            .map(|f| f.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Build the record kind for this table from a semantic row.
    pub fn hydrate(&self, row: Row) -> std::result::Result<Record, RecordError> {
        Ok(match self {
            TableKind::FilmWork => Record::FilmWork(FilmWork::from_row(row)?),
            TableKind::Genre => Record::Genre(Genre::from_row(row)?),
            TableKind::GenreFilmWork => Record::GenreFilmWork(GenreFilmWork::from_row(row)?),
            TableKind::Person => Record::Person(Person::from_row(row)?),
            TableKind::PersonFilmWork => Record::PersonFilmWork(PersonFilmWork::from_row(row)?),
        })
    }

    /// Widest field count across all tables.
    pub fn max_field_count() -> usize {
        Self::ALL.iter().map(|k| k.fields().len()).max().unwrap_or(0)
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A record of any table kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    FilmWork(FilmWork),
    Genre(Genre),
    GenreFilmWork(GenreFilmWork),
    Person(Person),
    PersonFilmWork(PersonFilmWork),
}

impl Record {
    pub fn kind(&self) -> TableKind {
        match self {
            Record::FilmWork(_) => TableKind::FilmWork,
            Record::Genre(_) => TableKind::Genre,
            Record::GenreFilmWork(_) => TableKind::GenreFilmWork,
            Record::Person(_) => TableKind::Person,
            Record::PersonFilmWork(_) => TableKind::PersonFilmWork,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Record::FilmWork(r) => r.id(),
            Record::Genre(r) => r.id(),
            Record::GenreFilmWork(r) => r.id(),
            Record::Person(r) => r.id(),
            Record::PersonFilmWork(r) => r.id(),
        }
    }

    pub fn to_values(&self) -> Vec<SqlValue> {
        match self {
            Record::FilmWork(r) => r.to_values(),
            Record::Genre(r) => r.to_values(),
            Record::GenreFilmWork(r) => r.to_values(),
            Record::Person(r) => r.to_values(),
            Record::PersonFilmWork(r) => r.to_values(),
        }
    }
}
