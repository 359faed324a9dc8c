//! SQLite source reader implementation.
//!
//! Implements the `SourceReader` trait for a SQLite database file using SQLx.
//! The file is opened read-only through a pool of exactly one connection, so
//! every query of a run goes through the same connection.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column as _, Row as _, TypeInfo as _, ValueRef as _};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::SourceConfig;
use crate::core::traits::SourceReader;
use crate::core::value::{Row, SqlValue};
use crate::error::{MigrateError, Result};

/// Connection pool timeout.
const POOL_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Pages buffered ahead of the consumer.
const READ_AHEAD: usize = 1;

const LIST_TABLES_SQL: &str = "SELECT name FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
     ORDER BY name";

/// SQLite source reader.
pub struct SqliteReader {
    pool: SqlitePool,
}

impl SqliteReader {
    /// Open the database file named in the configuration.
    pub async fn new(config: &SourceConfig) -> Result<Self> {
        let reader = Self::open(&config.path).await?;
        info!("Connected to SQLite source: {}", config.path.display());
        Ok(reader)
    }

    async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .read_only(true)
            .create_if_missing(false);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(POOL_CONNECTION_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| {
                MigrateError::pool(e, format!("opening SQLite source {}", path.display()))
            })?;

        Ok(Self::from_pool(pool))
    }

    /// Wrap an already configured pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn read_query_impl(
        pool: SqlitePool,
        sql: String,
        batch_size: usize,
        tx: mpsc::Sender<Result<Vec<Row>>>,
    ) -> Result<()> {
        let mut rows = sqlx::query(&sql).fetch(&pool);
        let mut batch = Vec::with_capacity(batch_size);
        let mut pages = 0usize;

        while let Some(row) = rows.try_next().await? {
            batch.push(row_to_values(&row)?);
            if batch.len() == batch_size {
                pages += 1;
                let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                if tx.send(Ok(full)).await.is_err() {
                    debug!("reader stopped after {} pages: consumer went away", pages);
                    return Ok(());
                }
            }
        }

        if !batch.is_empty() {
            pages += 1;
            let _ = tx.send(Ok(batch)).await;
        }
        debug!("reader finished: {} pages", pages);
        Ok(())
    }
}

/// Convert a SQLite row by each value's storage class.
fn row_to_values(row: &SqliteRow) -> Result<Row> {
    let mut values = Row::with_capacity(row.len());

    for (idx, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(idx)?;
        let value = if raw.is_null() {
            SqlValue::Null
        } else {
            match raw.type_info().name() {
                "INTEGER" => SqlValue::Integer(row.try_get_unchecked::<i64, _>(idx)?),
                "REAL" => SqlValue::Real(row.try_get_unchecked::<f64, _>(idx)?),
                "BLOB" => SqlValue::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
                _ => SqlValue::Text(row.try_get_unchecked::<String, _>(idx)?),
            }
        };
        values.insert(column.name().to_string(), value);
    }

    Ok(values)
}

#[async_trait]
impl SourceReader for SqliteReader {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let mut tables: Vec<String> = sqlx::query_scalar(LIST_TABLES_SQL)
            .fetch_all(&self.pool)
            .await?;
        tables.sort();
        Ok(tables)
    }

    fn read_query(&self, sql: String, batch_size: usize) -> mpsc::Receiver<Result<Vec<Row>>> {
        let (tx, rx) = mpsc::channel(READ_AHEAD);
        let pool = self.pool.clone();
        let batch_size = batch_size.max(1);

        tokio::spawn(async move {
            let result = Self::read_query_impl(pool, sql, batch_size, tx.clone()).await;
            if let Err(e) = result {
                let _ = tx.send(Err(e)).await;
            }
        });

        rx
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| MigrateError::pool(e, "testing SQLite source connection"))?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "sqlite"
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
