//! Test fixtures: an in-memory SQLite source and an in-memory destination.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::core::traits::{SourceReader, TargetWriter};
use crate::core::value::{Row, SqlValue};
use crate::drivers::SqliteReader;
use crate::error::{MigrateError, Result};
use crate::model::{Field, Record, TableKind};
use crate::transfer::transform_batch;

/// Source schema as the legacy SQLite file lays it out.
pub const SOURCE_DDL: &[&str] = &[
    "CREATE TABLE film_work (id TEXT PRIMARY KEY, title TEXT NOT NULL, description TEXT, \
     creation_date DATE, file_path TEXT, rating FLOAT, type TEXT NOT NULL, \
     created_at timestamp with time zone, updated_at timestamp with time zone)",
    "CREATE TABLE genre (id TEXT PRIMARY KEY, name TEXT NOT NULL, description TEXT, \
     created_at timestamp with time zone, updated_at timestamp with time zone)",
    "CREATE TABLE person (id TEXT PRIMARY KEY, full_name TEXT NOT NULL, \
     created_at timestamp with time zone, updated_at timestamp with time zone)",
    "CREATE TABLE genre_film_work (id TEXT PRIMARY KEY, film_work_id TEXT NOT NULL, \
     genre_id TEXT NOT NULL, created_at timestamp with time zone)",
    "CREATE TABLE person_film_work (id TEXT PRIMARY KEY, film_work_id TEXT NOT NULL, \
     person_id TEXT NOT NULL, role TEXT NOT NULL, created_at timestamp with time zone)",
];

/// One connection to a private in-memory database, kept open for the pool's life.
pub async fn memory_pool() -> SqlitePool {
    let options: SqliteConnectOptions = "sqlite::memory:".parse().unwrap();
    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap()
}

/// Run `statements` against a fresh in-memory database.
pub async fn sqlite_source(statements: &[&str]) -> SqliteReader {
    let pool = memory_pool().await;
    for stmt in statements {
        sqlx::query(stmt).execute(&pool).await.unwrap();
    }
    SqliteReader::from_pool(pool)
}

#[derive(Debug, Clone)]
pub struct GenreSeed {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// `n` valid genre rows with deterministic ids.
pub fn genre_rows(n: usize) -> Vec<GenreSeed> {
    (0..n)
        .map(|i| GenreSeed {
            id: Uuid::from_u128(0x1000 + i as u128).to_string(),
            name: format!("Genre {i}"),
            description: (i % 2 == 0).then(|| format!("About genre {i}")),
            created_at: "2021-06-16 20:14:09.221838+00".to_string(),
            updated_at: format!("2021-06-16 20:14:{:02}.5+00", i % 60),
        })
        .collect()
}

/// Source with the full schema and the given genre rows.
pub async fn sqlite_source_with_genres(rows: &[GenreSeed]) -> SqliteReader {
    let pool = memory_pool().await;
    for stmt in SOURCE_DDL {
        sqlx::query(stmt).execute(&pool).await.unwrap();
    }
    for row in rows {
        sqlx::query(
            "INSERT INTO genre (id, name, description, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.name)
        .bind(&row.description)
        .bind(&row.created_at)
        .bind(&row.updated_at)
        .execute(&pool)
        .await
        .unwrap();
    }
    SqliteReader::from_pool(pool)
}

/// Statements seeding one film with a genre, a person and both links.
pub const CATALOG_SEED: &[&str] = &[
    "INSERT INTO film_work VALUES ('3d8d9bf5-0d90-4353-88ba-4ccc5d2c07ff', 'Star Wars', \
     'A long time ago', '1977-05-25', NULL, 8.6, 'movie', \
     '2021-06-16 20:14:09.221838+00', '2021-06-16 20:14:09.221855+00')",
    "INSERT INTO film_work VALUES ('0312ed51-8833-413f-bff5-0e139c11264a', 'Star Trek', \
     NULL, NULL, NULL, NULL, 'tv_show', \
     '2021-06-16 20:14:09.222016+00', '2021-06-16 20:14:09.222031+00')",
    "INSERT INTO genre VALUES ('3d8d9bf5-0d90-4353-88ba-4ccc5d2c07ff', 'Action', '', \
     '2021-06-16 20:14:09.309735+00', '2021-06-16 20:14:09.309751+00')",
    "INSERT INTO person VALUES ('26e83050-29ef-4163-a99d-b546cac208f8', 'Mark Hamill', \
     '2021-06-16 20:14:09.309735+00', '2021-06-16 20:14:09.309751+00')",
    "INSERT INTO genre_film_work VALUES ('b1a4ff09-8fac-4cf4-a4c8-3a36ec4d5c0a', \
     '3d8d9bf5-0d90-4353-88ba-4ccc5d2c07ff', '3d8d9bf5-0d90-4353-88ba-4ccc5d2c07ff', \
     '2021-06-16 20:14:09.310195+00')",
    "INSERT INTO person_film_work VALUES ('3c4bd2de-4437-42b4-82ac-d53b1e33a1d5', \
     '3d8d9bf5-0d90-4353-88ba-4ccc5d2c07ff', '26e83050-29ef-4163-a99d-b546cac208f8', \
     'actor', '2021-06-16 20:14:09.310195+00')",
];

/// Source with all five tables populated.
pub async fn sqlite_source_with_catalog() -> SqliteReader {
    let statements: Vec<&str> = SOURCE_DDL.iter().chain(CATALOG_SEED).copied().collect();
    sqlite_source(&statements).await
}

/// A genre row as the source hands it back (source column names, text values).
pub fn raw_genre_row(id: &str, name: &str) -> Row {
    let mut row = Row::new();
    row.insert("id".into(), SqlValue::Text(id.into()));
    row.insert("name".into(), SqlValue::Text(name.into()));
    row.insert("description".into(), SqlValue::Null);
    row.insert("created_at".into(), "2020-01-01T00:00:00".into());
    row.insert("updated_at".into(), "2020-01-02T00:00:00".into());
    row
}

/// `n` genre records hydrated from [`genre_rows`].
pub fn genre_records(n: usize) -> Vec<Record> {
    let rows = genre_rows(n)
        .into_iter()
        .map(|g| {
            let mut row = raw_genre_row(&g.id, &g.name);
            row.insert("description".into(), g.description.into());
            row
        })
        .collect();
    transform_batch(TableKind::Genre, rows).unwrap()
}

/// Error shaped like a driver error: generic Display, server text in `source()`.
#[derive(Debug, thiserror::Error)]
#[error("db error")]
pub struct OpaqueDriverError {
    #[source]
    cause: std::io::Error,
}

/// A [`MigrateError`] whose Display hides `cause`; only the chain carries it.
pub fn opaque_driver_error(cause: &str) -> MigrateError {
    MigrateError::Io(std::io::Error::other(OpaqueDriverError {
        cause: std::io::Error::other(cause.to_string()),
    }))
}

type Tables = HashMap<(String, String), BTreeMap<Uuid, Row>>;
type FailInsert = Box<dyn Fn() -> MigrateError + Send>;

#[derive(Default)]
struct MemoryState {
    committed: Tables,
    pending: Option<Tables>,
    events: Vec<String>,
    insert_calls: usize,
    fail_inserts: Option<FailInsert>,
    closed: bool,
}

impl MemoryState {
    fn visible(&self) -> &Tables {
        self.pending.as_ref().unwrap_or(&self.committed)
    }

    fn writable(&mut self) -> &mut Tables {
        self.pending.as_mut().unwrap_or(&mut self.committed)
    }
}

/// In-memory destination with PostgreSQL-like transaction visibility.
///
/// Writes inside `begin`..`commit` are visible to the same writer and only
/// become committed on `commit`; `rollback` discards them.
#[derive(Default)]
pub struct MemoryTarget {
    state: Mutex<MemoryState>,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(schema: &str, table: &str) -> (String, String) {
        (schema.to_string(), table.to_string())
    }

    /// Committed row count.
    pub fn row_count(&self, schema: &str, table: &str) -> usize {
        let state = self.state.lock().unwrap();
        state
            .committed
            .get(&Self::key(schema, table))
            .map_or(0, BTreeMap::len)
    }

    /// Committed ids in ascending order.
    pub fn ids(&self, schema: &str, table: &str) -> Vec<Uuid> {
        let state = self.state.lock().unwrap();
        state
            .committed
            .get(&Self::key(schema, table))
            .map(|rows| rows.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Committed row by id.
    pub fn row(&self, schema: &str, table: &str, id: Uuid) -> Option<Row> {
        let state = self.state.lock().unwrap();
        state
            .committed
            .get(&Self::key(schema, table))
            .and_then(|rows| rows.get(&id).cloned())
    }

    pub fn set_field(&self, schema: &str, table: &str, id: Uuid, field: &str, value: SqlValue) {
        let mut state = self.state.lock().unwrap();
        let row = state
            .writable()
            .get_mut(&Self::key(schema, table))
            .and_then(|rows| rows.get_mut(&id))
            .unwrap();
        row.insert(field.to_string(), value);
    }

    pub fn delete_row(&self, schema: &str, table: &str, id: Uuid) {
        let mut state = self.state.lock().unwrap();
        if let Some(rows) = state.writable().get_mut(&Self::key(schema, table)) {
            rows.remove(&id);
        }
    }

    /// Make every following insert fail with `message`.
    pub fn fail_inserts(&self, message: &str) {
        let message = message.to_string();
        self.fail_inserts_with(move || MigrateError::pool(message.clone(), "inserting rows"));
    }

    /// Make every following insert fail with the error `make` builds.
    pub fn fail_inserts_with(&self, make: impl Fn() -> MigrateError + Send + 'static) {
        self.state.lock().unwrap().fail_inserts = Some(Box::new(make));
    }

    pub fn insert_calls(&self) -> usize {
        self.state.lock().unwrap().insert_calls
    }

    /// Calls seen so far, e.g. `["begin", "insert genre", "commit", "fetch genre"]`.
    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }
}

#[async_trait]
impl TargetWriter for MemoryTarget {
    async fn begin(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push("begin".into());
        state.pending = Some(state.committed.clone());
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push("commit".into());
        if let Some(pending) = state.pending.take() {
            state.committed = pending;
        }
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.events.push("rollback".into());
        state.pending = None;
        Ok(())
    }

    async fn insert_ignore_existing(
        &self,
        schema: &str,
        table: &str,
        fields: &[Field],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.events.push(format!("insert {table}"));
        state.insert_calls += 1;
        if let Some(make) = &state.fail_inserts {
            return Err(make());
        }

        let stored = state.writable().entry(Self::key(schema, table)).or_default();
        let mut inserted = 0;
        for values in rows {
            let row: Row = fields
                .iter()
                .zip(values)
                .map(|(f, v)| (f.name.to_string(), v.clone()))
                .collect();
            let id = match row.get("id") {
                Some(SqlValue::Uuid(id)) => *id,
                other => panic!("insert without uuid id: {other:?}"),
            };
            if let std::collections::btree_map::Entry::Vacant(slot) = stored.entry(id) {
                slot.insert(row);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn fetch_by_ids(
        &self,
        schema: &str,
        table: &str,
        fields: &[Field],
        ids: &[Uuid],
    ) -> Result<Vec<Row>> {
        let mut state = self.state.lock().unwrap();
        state.events.push(format!("fetch {table}"));
        let Some(rows) = state.visible().get(&Self::key(schema, table)) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| rows.get(id))
            .map(|row| {
                fields
                    .iter()
                    .filter_map(|f| row.get(f.name).map(|v| (f.name.to_string(), v.clone())))
                    .collect()
            })
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.events.push("close".into());
        state.closed = true;
    }
}

/// Source that fails every call; for exercising error paths.
pub struct BrokenSource;

#[async_trait]
impl SourceReader for BrokenSource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        Err(MigrateError::pool("source unavailable", "listing tables"))
    }

    fn read_query(&self, _sql: String, _batch_size: usize) -> mpsc::Receiver<Result<Vec<Row>>> {
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.try_send(Err(MigrateError::pool("source unavailable", "reading rows")));
        rx
    }

    async fn ping(&self) -> Result<()> {
        Err(MigrateError::pool("source unavailable", "ping"))
    }

    fn db_type(&self) -> &str {
        "broken"
    }

    async fn close(&self) {}
}
