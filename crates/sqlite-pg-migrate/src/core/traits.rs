//! Core traits for the two stores taking part in a migration.
//!
//! - [`SourceReader`]: lists tables and streams pages of raw rows
//! - [`TargetWriter`]: idempotent batch inserts, id lookups, transactions
//!
//! Both sides hold a single connection for the whole run; implementations
//! release it in [`SourceReader::close`] / [`TargetWriter::close`].

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;
use crate::model::Field;

use super::value::{Row, SqlValue};

/// Read tables and rows from the source database.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// List user table names, sorted lexicographically.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Start streaming the rows of a SELECT statement in pages.
    ///
    /// Every page but the last holds exactly `batch_size` rows; the channel
    /// closes once the result set is exhausted, so an empty result yields no
    /// pages at all. Calling this again re-issues the query from the start.
    fn read_query(&self, sql: String, batch_size: usize) -> mpsc::Receiver<Result<Vec<Row>>>;

    /// Round-trip a trivial query to check the connection.
    async fn ping(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "sqlite").
    fn db_type(&self) -> &str;

    /// Close the connection.
    async fn close(&self);
}

/// Write and read back rows in the destination database.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Open a transaction on the held connection.
    async fn begin(&self) -> Result<()>;

    /// Commit the open transaction.
    async fn commit(&self) -> Result<()>;

    /// Roll back the open transaction.
    async fn rollback(&self) -> Result<()>;

    /// Insert rows in one statement, leaving rows whose `id` already exists
    /// untouched.
    ///
    /// Values in each row follow `fields` order. Returns the number of rows
    /// actually inserted.
    async fn insert_ignore_existing(
        &self,
        schema: &str,
        table: &str,
        fields: &[Field],
        rows: &[Vec<SqlValue>],
    ) -> Result<u64>;

    /// Fetch the rows whose `id` is in `ids`, keyed by field name.
    async fn fetch_by_ids(
        &self,
        schema: &str,
        table: &str,
        fields: &[Field],
        ids: &[Uuid],
    ) -> Result<Vec<Row>>;

    /// Round-trip a trivial query to check the connection.
    async fn ping(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "postgres").
    fn db_type(&self) -> &str;

    /// Close the connection.
    async fn close(&self);
}
