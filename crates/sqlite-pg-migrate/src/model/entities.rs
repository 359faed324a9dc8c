//! The five concrete record kinds.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::core::value::{Row, SqlValue};

use super::coerce::{
    coerce_date, coerce_real, coerce_text, coerce_timestamp, coerce_uuid, ensure_consumed,
    ensure_range, optional, take,
};
use super::{Entity, Field, FieldKind, RecordError};

const RATING_MIN: f64 = 0.0;
const RATING_MAX: f64 = 100.0;

/// Kind of film work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilmWorkType {
    Movie,
    TvShow,
}

impl FilmWorkType {
    const EXPECTED: &'static str = "movie, tv_show";

    pub fn as_str(&self) -> &'static str {
        match self {
            FilmWorkType::Movie => "movie",
            FilmWorkType::TvShow => "tv_show",
        }
    }

    fn coerce(field: &'static str, value: SqlValue) -> Result<Self, RecordError> {
        let text = coerce_text(field, value)?;
        match text.as_str() {
            "movie" => Ok(FilmWorkType::Movie),
            "tv_show" => Ok(FilmWorkType::TvShow),
            _ => Err(RecordError::UnknownVariant {
                field,
                value: text,
                expected: Self::EXPECTED,
            }),
        }
    }
}

impl fmt::Display for FilmWorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role a person plays in a film work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonRole {
    Actor,
    Writer,
    Director,
}

impl PersonRole {
    const EXPECTED: &'static str = "actor, writer, director";

    pub fn as_str(&self) -> &'static str {
        match self {
            PersonRole::Actor => "actor",
            PersonRole::Writer => "writer",
            PersonRole::Director => "director",
        }
    }

    fn coerce(field: &'static str, value: SqlValue) -> Result<Self, RecordError> {
        let text = coerce_text(field, value)?;
        match text.as_str() {
            "actor" => Ok(PersonRole::Actor),
            "writer" => Ok(PersonRole::Writer),
            "director" => Ok(PersonRole::Director),
            _ => Err(RecordError::UnknownVariant {
                field,
                value: text,
                expected: Self::EXPECTED,
            }),
        }
    }
}

impl fmt::Display for PersonRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilmWork {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub creation_date: Option<NaiveDate>,
    pub rating: Option<f64>,
    #[serde(rename = "type")]
    pub kind: FilmWorkType,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Entity for FilmWork {
    const TABLE: &'static str = "film_work";

    const FIELDS: &'static [Field] = &[
        Field::new("id", FieldKind::Uuid),
        Field::new("title", FieldKind::Text),
        Field::new("description", FieldKind::Text),
        Field::new("creation_date", FieldKind::Date),
        Field::new("rating", FieldKind::Real),
        Field::new("type", FieldKind::Text),
        Field::new("created", FieldKind::Timestamp),
        Field::new("modified", FieldKind::Timestamp),
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_row(mut row: Row) -> Result<Self, RecordError> {
        let record = Self {
            id: coerce_uuid("id", take(&mut row, "id")?)?,
            title: coerce_text("title", take(&mut row, "title")?)?,
            description: optional(take(&mut row, "description")?, |v| {
                coerce_text("description", v)
            })?,
            creation_date: optional(take(&mut row, "creation_date")?, |v| {
                coerce_date("creation_date", v)
            })?,
            rating: optional(take(&mut row, "rating")?, |v| {
                ensure_range("rating", coerce_real("rating", v)?, RATING_MIN, RATING_MAX)
            })?,
            kind: FilmWorkType::coerce("type", take(&mut row, "type")?)?,
            created: coerce_timestamp("created", take(&mut row, "created")?)?,
            modified: coerce_timestamp("modified", take(&mut row, "modified")?)?,
        };
        ensure_consumed(row)?;
        Ok(record)
    }

    fn to_values(&self) -> Vec<SqlValue> {
        vec![
            self.id.into(),
            self.title.clone().into(),
            self.description.clone().into(),
            self.creation_date.into(),
            self.rating.into(),
            self.kind.as_str().into(),
            self.created.into(),
            self.modified.into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Genre {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Entity for Genre {
    const TABLE: &'static str = "genre";

    const FIELDS: &'static [Field] = &[
        Field::new("id", FieldKind::Uuid),
        Field::new("name", FieldKind::Text),
        Field::new("description", FieldKind::Text),
        Field::new("created", FieldKind::Timestamp),
        Field::new("modified", FieldKind::Timestamp),
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_row(mut row: Row) -> Result<Self, RecordError> {
        let record = Self {
            id: coerce_uuid("id", take(&mut row, "id")?)?,
            name: coerce_text("name", take(&mut row, "name")?)?,
            description: optional(take(&mut row, "description")?, |v| {
                coerce_text("description", v)
            })?,
            created: coerce_timestamp("created", take(&mut row, "created")?)?,
            modified: coerce_timestamp("modified", take(&mut row, "modified")?)?,
        };
        ensure_consumed(row)?;
        Ok(record)
    }

    fn to_values(&self) -> Vec<SqlValue> {
        vec![
            self.id.into(),
            self.name.clone().into(),
            self.description.clone().into(),
            self.created.into(),
            self.modified.into(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Person {
    pub id: Uuid,
    pub full_name: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Entity for Person {
    const TABLE: &'static str = "person";

    const FIELDS: &'static [Field] = &[
        Field::new("id", FieldKind::Uuid),
        Field::new("full_name", FieldKind::Text),
        Field::new("created", FieldKind::Timestamp),
        Field::new("modified", FieldKind::Timestamp),
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_row(mut row: Row) -> Result<Self, RecordError> {
        let record = Self {
            id: coerce_uuid("id", take(&mut row, "id")?)?,
            full_name: coerce_text("full_name", take(&mut row, "full_name")?)?,
            created: coerce_timestamp("created", take(&mut row, "created")?)?,
            modified: coerce_timestamp("modified", take(&mut row, "modified")?)?,
        };
        ensure_consumed(row)?;
        Ok(record)
    }

    fn to_values(&self) -> Vec<SqlValue> {
        vec![
            self.id.into(),
            self.full_name.clone().into(),
            self.created.into(),
            self.modified.into(),
        ]
    }
}

/// Link between a genre and a film work.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenreFilmWork {
    pub id: Uuid,
    pub genre_id: Uuid,
    pub film_work_id: Uuid,
    pub created: DateTime<Utc>,
}

impl Entity for GenreFilmWork {
    const TABLE: &'static str = "genre_film_work";

    const FIELDS: &'static [Field] = &[
        Field::new("id", FieldKind::Uuid),
        Field::new("genre_id", FieldKind::Uuid),
        Field::new("film_work_id", FieldKind::Uuid),
        Field::new("created", FieldKind::Timestamp),
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_row(mut row: Row) -> Result<Self, RecordError> {
        let record = Self {
            id: coerce_uuid("id", take(&mut row, "id")?)?,
            genre_id: coerce_uuid("genre_id", take(&mut row, "genre_id")?)?,
            film_work_id: coerce_uuid("film_work_id", take(&mut row, "film_work_id")?)?,
            created: coerce_timestamp("created", take(&mut row, "created")?)?,
        };
        ensure_consumed(row)?;
        Ok(record)
    }

    fn to_values(&self) -> Vec<SqlValue> {
        vec![
            self.id.into(),
            self.genre_id.into(),
            self.film_work_id.into(),
            self.created.into(),
        ]
    }
}

/// Link between a person and a film work, with the person's role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonFilmWork {
    pub id: Uuid,
    pub person_id: Uuid,
    pub film_work_id: Uuid,
    pub role: PersonRole,
    pub created: DateTime<Utc>,
}

impl Entity for PersonFilmWork {
    const TABLE: &'static str = "person_film_work";

    const FIELDS: &'static [Field] = &[
        Field::new("id", FieldKind::Uuid),
        Field::new("person_id", FieldKind::Uuid),
        Field::new("film_work_id", FieldKind::Uuid),
        Field::new("role", FieldKind::Text),
        Field::new("created", FieldKind::Timestamp),
    ];

    fn id(&self) -> Uuid {
        self.id
    }

    fn from_row(mut row: Row) -> Result<Self, RecordError> {
        let record = Self {
            id: coerce_uuid("id", take(&mut row, "id")?)?,
            person_id: coerce_uuid("person_id", take(&mut row, "person_id")?)?,
            film_work_id: coerce_uuid("film_work_id", take(&mut row, "film_work_id")?)?,
            role: PersonRole::coerce("role", take(&mut row, "role")?)?,
            created: coerce_timestamp("created", take(&mut row, "created")?)?,
        };
        ensure_consumed(row)?;
        Ok(record)
    }

    fn to_values(&self) -> Vec<SqlValue> {
        vec![
            self.id.into(),
            self.person_id.into(),
            self.film_work_id.into(),
            self.role.as_str().into(),
            self.created.into(),
        ]
    }
}
