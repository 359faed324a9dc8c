//! PostgreSQL target writer implementation.
//!
//! Implements the `TargetWriter` trait using deadpool-postgres. The pool is
//! sized to one connection, which is checked out at startup and held until
//! [`TargetWriter::close`]; transactions are issued on it explicitly.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, RecyclingMethod};
use tokio::sync::Mutex;
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::Config as PgConfig;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::TargetConfig;
use crate::core::identifier::{qualify, quote_ident};
use crate::core::traits::TargetWriter;
use crate::core::value::{Row, SqlValue};
use crate::drivers::common::SslMode;
use crate::error::{MigrateError, Result};
use crate::model::{Field, FieldKind};

/// Connection timeout.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// PostgreSQL target writer.
pub struct PostgresWriter {
    pool: Pool,
    client: Mutex<Option<Object>>,
}

impl PostgresWriter {
    /// Connect using the target configuration.
    pub async fn new(config: &TargetConfig) -> Result<Self> {
        let mut pg_config = PgConfig::new();
        pg_config.host(&config.host);
        pg_config.port(config.port);
        pg_config.dbname(&config.database);
        pg_config.user(&config.user);
        pg_config.password(&config.password);
        pg_config.keepalives(true);
        pg_config.connect_timeout(CONNECTION_TIMEOUT);

        let mgr_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let ssl_mode = SslMode::parse(&config.ssl_mode)?;
        if ssl_mode.verifies_hostname() {
            debug!("Server certificate must be valid for host '{}'", config.host);
        }
        let mgr = match ssl_mode.connector()? {
            None => Manager::from_config(pg_config, tokio_postgres::NoTls, mgr_config),
            Some(tls) => Manager::from_config(pg_config, tls, mgr_config),
        };
        let pool = Pool::builder(mgr)
            .max_size(1)
            .build()
            .map_err(|e| MigrateError::pool(e, "creating PostgreSQL target pool"))?;

        let client = pool
            .get()
            .await
            .map_err(|e| MigrateError::pool(e, "connecting to PostgreSQL target"))?;
        client.simple_query("SELECT 1").await?;

        info!(
            "Connected to PostgreSQL target: {}:{}/{}",
            config.host, config.port, config.database
        );

        Ok(Self {
            pool,
            client: Mutex::new(Some(client)),
        })
    }

    async fn batch_execute(&self, sql: &str) -> Result<()> {
        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(closed)?;
        client.batch_execute(sql).await?;
        Ok(())
    }
}

fn closed() -> MigrateError {
    MigrateError::pool("connection already closed", "using PostgreSQL target")
}

/// Placeholder for parameter `idx`, bound as text and cast to the field type.
fn placeholder(idx: usize, kind: FieldKind) -> String {
    match kind {
        FieldKind::Text => format!("${}::text", idx),
        other => format!("${}::text{}", idx, other.pg_cast()),
    }
}

/// Build a multi-row INSERT that skips rows whose id already exists.
///
/// Every value travels as text; the cast on each placeholder converts it.
pub fn build_insert_sql(
    schema: &str,
    table: &str,
    fields: &[Field],
    rows: &[Vec<SqlValue>],
) -> Result<(String, Vec<Box<dyn ToSql + Sync + Send>>)> {
    let col_list = fields
        .iter()
        .map(|f| quote_ident(f.name))
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    let mut tuples = Vec::with_capacity(rows.len());
    let mut params: Vec<Box<dyn ToSql + Sync + Send>> =
        Vec::with_capacity(rows.len() * fields.len());
    let mut idx = 1;

    for row in rows {
        if row.len() != fields.len() {
            return Err(MigrateError::load(
                table,
                format!("row has {} values for {} columns", row.len(), fields.len()),
            ));
        }
        let row_placeholders: Vec<String> = fields
            .iter()
            .map(|f| {
                let p = placeholder(idx, f.kind);
                idx += 1;
                p
            })
            .collect();
        tuples.push(format!("({})", row_placeholders.join(", ")));
        params.extend(row.iter().map(|v| Box::new(v.to_pg_text()) as Box<dyn ToSql + Sync + Send>));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES {} ON CONFLICT ({}) DO NOTHING",
        qualify(schema, table)?,
        col_list,
        tuples.join(", "),
        quote_ident("id")?
    );

    Ok((sql, params))
}

/// Build the id-set lookup used by verification.
///
/// Real fields are read back as `double precision` whatever their column type.
pub fn build_fetch_sql(schema: &str, table: &str, fields: &[Field]) -> Result<String> {
    let select_list = fields
        .iter()
        .map(|f| {
            let col = quote_ident(f.name)?;
            Ok(match f.kind {
                FieldKind::Real => format!("{}::double precision AS {}", col, col),
                _ => col,
            })
        })
        .collect::<Result<Vec<_>>>()?
        .join(", ");

    Ok(format!(
        "SELECT {} FROM {} WHERE {} = ANY($1)",
        select_list,
        qualify(schema, table)?,
        quote_ident("id")?
    ))
}

/// Decode one column of a PostgreSQL row by its wire type.
fn convert_pg_row_value(row: &tokio_postgres::Row, idx: usize) -> Result<SqlValue> {
    let ty = row.columns()[idx].type_().clone();

    let value = if ty == Type::UUID {
        row.try_get::<_, Option<Uuid>>(idx)?.map(SqlValue::Uuid)
    } else if ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(SqlValue::Timestamp)
    } else if ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|ts| SqlValue::Timestamp(ts.and_utc()))
    } else if ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(idx)?.map(SqlValue::Date)
    } else if ty == Type::FLOAT8 {
        // real fields are always selected as double precision
        row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::Real)
    } else {
        // text, varchar and bpchar; any other type fails to decode here
        row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text)
    };

    Ok(value.unwrap_or(SqlValue::Null))
}

#[async_trait]
impl TargetWriter for PostgresWriter {
    async fn begin(&self) -> Result<()> {
        self.batch_execute("BEGIN").await
    }

    async fn commit(&self) -> Result<()> {
        self.batch_execute("COMMIT").await
    }

    async fn rollback(&self) -> Result<()> {
        self.batch_execute("ROLLBACK").await
    }

    async fn insert_ignore_existing(
        &self,
        schema: &str,
        table: &str,
        fields: &[Field],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let (sql, params) = build_insert_sql(schema, table, fields, rows)?;
        let param_refs: Vec<&(dyn ToSql + Sync)> = params
            .iter()
            .map(|p| p.as_ref() as &(dyn ToSql + Sync))
            .collect();

        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(closed)?;
        let inserted = client.execute(sql.as_str(), &param_refs).await?;
        debug!("{}.{}: inserted {} of {} rows", schema, table, inserted, rows.len());
        Ok(inserted)
    }

    async fn fetch_by_ids(
        &self,
        schema: &str,
        table: &str,
        fields: &[Field],
        ids: &[Uuid],
    ) -> Result<Vec<Row>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = build_fetch_sql(schema, table, fields)?;
        let ids = ids.to_vec();

        let guard = self.client.lock().await;
        let client = guard.as_ref().ok_or_else(closed)?;
        let rows = client.query(sql.as_str(), &[&ids]).await?;

        rows.iter()
            .map(|row| {
                let mut values = Row::with_capacity(row.len());
                for (idx, column) in row.columns().iter().enumerate() {
                    values.insert(column.name().to_string(), convert_pg_row_value(row, idx)?);
                }
                Ok(values)
            })
            .collect()
    }

    async fn ping(&self) -> Result<()> {
        self.batch_execute("SELECT 1").await
    }

    fn db_type(&self) -> &str {
        "postgres"
    }

    async fn close(&self) {
        // Return the held connection before shutting the pool down.
        self.client.lock().await.take();
        self.pool.close();
    }
}
