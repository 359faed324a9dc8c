//! Bulk loader: one idempotent multi-row INSERT per record batch.

use tracing::{debug, error};

use crate::core::traits::TargetWriter;
use crate::core::value::SqlValue;
use crate::error::{MigrateError, Result};
use crate::model::{Record, TableKind};

use super::transform::RecordStream;

/// Counters for one table load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub batches: usize,
    pub rows_read: u64,
    pub rows_inserted: u64,
}

impl LoadStats {
    /// Rows already present in the destination.
    pub fn rows_skipped(&self) -> u64 {
        self.rows_read.saturating_sub(self.rows_inserted)
    }
}

/// Writes record batches into `schema` on the destination.
pub struct BulkLoader<'a> {
    target: &'a dyn TargetWriter,
    schema: &'a str,
}

impl<'a> BulkLoader<'a> {
    pub fn new(target: &'a dyn TargetWriter, schema: &'a str) -> Self {
        Self { target, schema }
    }

    /// Drain `records` into the destination table.
    ///
    /// Stops at the first failing batch; nothing is retried.
    pub async fn load(&self, mut records: RecordStream) -> Result<LoadStats> {
        let table = records.table();
        let mut stats = LoadStats::default();

        while let Some(batch) = records.next_batch().await {
            let batch = batch?;
            let inserted = self.load_batch(table, &batch).await?;

            stats.batches += 1;
            stats.rows_read += batch.len() as u64;
            stats.rows_inserted += inserted;
            debug!(
                "{}: batch {} wrote {}/{} rows",
                table,
                stats.batches,
                inserted,
                batch.len()
            );
        }

        Ok(stats)
    }

    /// Insert one batch, leaving existing ids untouched.
    pub async fn load_batch(&self, table: TableKind, records: &[Record]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let rows: Vec<Vec<SqlValue>> = records.iter().map(Record::to_values).collect();
        match self
            .target
            .insert_ignore_existing(self.schema, table.name(), table.fields(), &rows)
            .await
        {
            Ok(inserted) => Ok(inserted),
            Err(e) => {
                let cause = e.cause_chain();
                error!("{}: failed to load batch of {} rows: {}", table, rows.len(), cause);
                Err(MigrateError::load(table.name(), cause))
            }
        }
    }
}
