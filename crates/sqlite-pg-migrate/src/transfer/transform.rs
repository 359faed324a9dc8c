//! Record transformer: raw source pages into typed records.

use crate::core::value::Row;
use crate::error::{MigrateError, Result};
use crate::model::{Record, TableKind};

use super::adapter::to_semantic_row;
use super::extract::BatchStream;

/// Adapt and hydrate every row of a source page.
///
/// The first row that fails aborts the whole page with a coercion error.
pub fn transform_batch(table: TableKind, rows: Vec<Row>) -> Result<Vec<Record>> {
    rows.into_iter()
        .map(|row| {
            to_semantic_row(row)
                .and_then(|row| table.hydrate(row))
                .map_err(|e| MigrateError::coercion(table.name(), e))
        })
        .collect()
}

/// Typed view over a [`BatchStream`].
pub struct RecordStream {
    batches: BatchStream,
}

impl RecordStream {
    pub fn new(batches: BatchStream) -> Self {
        Self { batches }
    }

    pub fn table(&self) -> TableKind {
        self.batches.table()
    }

    /// Next page of records; `None` once the source is exhausted.
    pub async fn next_batch(&mut self) -> Option<Result<Vec<Record>>> {
        let table = self.batches.table();
        let rows = match self.batches.next_batch().await? {
            Ok(rows) => rows,
            Err(e) => return Some(Err(e)),
        };
        Some(transform_batch(table, rows))
    }
}
