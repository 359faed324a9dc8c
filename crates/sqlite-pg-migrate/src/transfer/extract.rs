//! Batch extractor: pages of raw source rows for one table.

use tokio::sync::mpsc;
use tracing::debug;

use crate::core::identifier::quote_ident;
use crate::core::traits::SourceReader;
use crate::core::value::Row;
use crate::error::Result;
use crate::model::TableKind;

use super::adapter::to_source_query;

/// Default number of rows per page.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Build the source SELECT for a table, with source column names.
pub fn select_statement(table: TableKind) -> Result<String> {
    let semantic = format!(
        "SELECT {} FROM {}",
        table.column_list(),
        quote_ident(table.name())?
    );
    Ok(to_source_query(&semantic))
}

/// Issues extraction queries against a source.
pub struct BatchExtractor<'a> {
    source: &'a dyn SourceReader,
    batch_size: usize,
}

impl<'a> BatchExtractor<'a> {
    pub fn new(source: &'a dyn SourceReader, batch_size: usize) -> Self {
        Self {
            source,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Start a fresh pass over `table`.
    ///
    /// Each call re-issues the query, so the returned stream always begins at
    /// the first row.
    pub fn extract(&self, table: TableKind) -> Result<BatchStream> {
        let sql = select_statement(table)?;
        debug!("{}: extracting with \"{}\"", table, sql);
        Ok(BatchStream {
            table,
            rx: self.source.read_query(sql, self.batch_size),
            yielded: 0,
        })
    }
}

/// Lazy, finite sequence of raw row pages for one table.
pub struct BatchStream {
    table: TableKind,
    rx: mpsc::Receiver<Result<Vec<Row>>>,
    yielded: usize,
}

impl BatchStream {
    pub fn table(&self) -> TableKind {
        self.table
    }

    /// Number of pages handed out so far.
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Wait for the next page; `None` once the table is exhausted.
    pub async fn next_batch(&mut self) -> Option<Result<Vec<Row>>> {
        let batch = self.rx.recv().await?;
        if batch.is_ok() {
            self.yielded += 1;
        }
        Some(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{genre_rows, sqlite_source_with_genres};

    #[test]
    fn test_select_statement_uses_source_names() {
        assert_eq!(
            select_statement(TableKind::Genre).unwrap(),
            "SELECT id, name, description, created_at, updated_at FROM \"genre\""
        );
        assert_eq!(
            select_statement(TableKind::GenreFilmWork).unwrap(),
            "SELECT id, genre_id, film_work_id, created_at FROM \"genre_film_work\""
        );
    }

    async fn page_sizes(rows: usize, batch_size: usize) -> Vec<usize> {
        let source = sqlite_source_with_genres(&genre_rows(rows)).await;
        let extractor = BatchExtractor::new(&source, batch_size);
        let mut stream = extractor.extract(TableKind::Genre).unwrap();

        let mut sizes = Vec::new();
        while let Some(batch) = stream.next_batch().await {
            sizes.push(batch.unwrap().len());
        }
        assert_eq!(stream.yielded(), sizes.len());
        sizes
    }

    #[tokio::test]
    async fn test_batch_counts() {
        assert_eq!(page_sizes(0, 100).await, Vec::<usize>::new());
        assert_eq!(page_sizes(1, 100).await, vec![1]);
        assert_eq!(page_sizes(250, 100).await, vec![100, 100, 50]);
        assert_eq!(page_sizes(200, 100).await, vec![100, 100]);
        assert_eq!(page_sizes(7, 3).await, vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn test_extract_is_restartable() {
        let source = sqlite_source_with_genres(&genre_rows(5)).await;
        let extractor = BatchExtractor::new(&source, 2);

        for _ in 0..2 {
            let mut stream = extractor.extract(TableKind::Genre).unwrap();
            let mut total = 0;
            while let Some(batch) = stream.next_batch().await {
                total += batch.unwrap().len();
            }
            assert_eq!(total, 5);
        }
    }

    #[tokio::test]
    async fn test_rows_carry_source_column_names() {
        let source = sqlite_source_with_genres(&genre_rows(1)).await;
        let extractor = BatchExtractor::new(&source, 10);
        let mut stream = extractor.extract(TableKind::Genre).unwrap();

        let batch = stream.next_batch().await.unwrap().unwrap();
        assert!(batch[0].contains_key("created_at"));
        assert!(batch[0].contains_key("updated_at"));
        assert!(!batch[0].contains_key("created"));
    }
}
