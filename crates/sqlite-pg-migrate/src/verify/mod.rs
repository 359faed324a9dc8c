//! Round-trip verification of a migrated table.
//!
//! The source table is re-extracted page by page and hydrated exactly as the
//! loader saw it. For each page the destination rows with the same ids are
//! fetched and hydrated directly (destination names already match the
//! model). A page passes when both sides hold the same number of records and
//! the two record lists, sorted by id, are equal element by element.

use tracing::{debug, info};
use uuid::Uuid;

use crate::core::traits::{SourceReader, TargetWriter};
use crate::error::{MigrateError, Result};
use crate::model::{Record, TableKind};
use crate::transfer::{BatchExtractor, RecordStream};

/// Counters for one verified table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifyStats {
    pub batches: usize,
    pub rows_verified: u64,
}

/// Compares a table between source and destination.
pub struct TransferVerifier<'a> {
    source: &'a dyn SourceReader,
    target: &'a dyn TargetWriter,
    schema: &'a str,
    batch_size: usize,
}

impl<'a> TransferVerifier<'a> {
    pub fn new(
        source: &'a dyn SourceReader,
        target: &'a dyn TargetWriter,
        schema: &'a str,
        batch_size: usize,
    ) -> Self {
        Self {
            source,
            target,
            schema,
            batch_size,
        }
    }

    /// Verify every page of `table`, failing on the first mismatch.
    pub async fn verify(&self, table: TableKind) -> Result<VerifyStats> {
        info!("{}: verifying", table);

        let extractor = BatchExtractor::new(self.source, self.batch_size);
        let mut records = RecordStream::new(extractor.extract(table)?);
        let mut stats = VerifyStats::default();

        while let Some(batch) = records.next_batch().await {
            let expected = batch?;
            stats.batches += 1;
            self.verify_batch(table, stats.batches, expected, &mut stats)
                .await?;
        }

        info!("{}: verified ({} rows)", table, stats.rows_verified);
        Ok(stats)
    }

    async fn verify_batch(
        &self,
        table: TableKind,
        batch_no: usize,
        mut expected: Vec<Record>,
        stats: &mut VerifyStats,
    ) -> Result<()> {
        let ids: Vec<Uuid> = expected.iter().map(Record::id).collect();
        let rows = self
            .target
            .fetch_by_ids(self.schema, table.name(), table.fields(), &ids)
            .await?;

        let mut actual = rows
            .into_iter()
            .map(|row| table.hydrate(row))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| {
                MigrateError::verification(
                    table.name(),
                    format!("destination row in batch {} is malformed: {}", batch_no, e),
                )
            })?;

        if expected.len() != actual.len() {
            return Err(MigrateError::verification(
                table.name(),
                format!(
                    "row count mismatch in batch {}: source has {}, destination has {}",
                    batch_no,
                    expected.len(),
                    actual.len()
                ),
            ));
        }

        expected.sort_by_key(Record::id);
        actual.sort_by_key(Record::id);

        if let Some((src, dst)) = expected.iter().zip(&actual).find(|(s, d)| s != d) {
            return Err(MigrateError::verification(
                table.name(),
                format!(
                    "record mismatch in batch {}:\n  source:      {:?}\n  destination: {:?}",
                    batch_no, src, dst
                ),
            ));
        }

        stats.rows_verified += expected.len() as u64;
        debug!("{}: batch {} matches ({} rows)", table, batch_no, expected.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::SqlValue;
    use crate::testing::{genre_rows, sqlite_source_with_genres, MemoryTarget};
    use crate::transfer::BulkLoader;

    async fn loaded(rows: usize, batch_size: usize) -> (crate::drivers::SqliteReader, MemoryTarget) {
        let source = sqlite_source_with_genres(&genre_rows(rows)).await;
        let target = MemoryTarget::new();
        {
            let extractor = BatchExtractor::new(&source, batch_size);
            let records = RecordStream::new(extractor.extract(TableKind::Genre).unwrap());
            BulkLoader::new(&target, "content")
                .load(records)
                .await
                .unwrap();
        }
        (source, target)
    }

    #[tokio::test]
    async fn test_verify_after_load_succeeds() {
        let (source, target) = loaded(25, 10).await;
        let stats = TransferVerifier::new(&source, &target, "content", 10)
            .verify(TableKind::Genre)
            .await
            .unwrap();
        assert_eq!(stats.batches, 3);
        assert_eq!(stats.rows_verified, 25);
    }

    #[tokio::test]
    async fn test_verify_empty_table_succeeds() {
        let (source, target) = loaded(0, 10).await;
        let stats = TransferVerifier::new(&source, &target, "content", 10)
            .verify(TableKind::Genre)
            .await
            .unwrap();
        assert_eq!(stats, VerifyStats::default());
    }

    #[tokio::test]
    async fn test_verify_detects_mutated_row() {
        let (source, target) = loaded(5, 10).await;
        let victim = target.ids("content", "genre")[2];
        target.set_field("content", "genre", victim, "name", SqlValue::Text("Tampered".into()));

        let err = TransferVerifier::new(&source, &target, "content", 10)
            .verify(TableKind::Genre)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Verification { .. }));
        assert!(err.to_string().contains("Tampered"));
    }

    #[tokio::test]
    async fn test_verify_detects_missing_row() {
        let (source, target) = loaded(5, 10).await;
        let victim = target.ids("content", "genre")[0];
        target.delete_row("content", "genre", victim);

        let err = TransferVerifier::new(&source, &target, "content", 10)
            .verify(TableKind::Genre)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("row count mismatch"));
    }

    #[tokio::test]
    async fn test_verify_against_empty_destination_fails() {
        let source = sqlite_source_with_genres(&genre_rows(3)).await;
        let target = MemoryTarget::new();
        let err = TransferVerifier::new(&source, &target, "content", 10)
            .verify(TableKind::Genre)
            .await
            .unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_VERIFICATION_ERROR);
    }
}
