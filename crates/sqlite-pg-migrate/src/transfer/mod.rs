//! One-way data path for a single table.
//!
//! ```text
//! source ──► BatchExtractor ──► RecordStream ──► BulkLoader ──► destination
//!            (raw pages)        (adapt + hydrate) (INSERT .. ON CONFLICT DO NOTHING)
//! ```
//!
//! Pages are pulled on demand: at most one page is buffered ahead of the
//! loader, so memory stays bounded by the batch size.

pub mod adapter;
pub mod extract;
pub mod load;
pub mod transform;

pub use adapter::{to_semantic_row, to_source_query};
pub use extract::{select_statement, BatchExtractor, BatchStream, DEFAULT_BATCH_SIZE};
pub use load::{BulkLoader, LoadStats};
pub use transform::{transform_batch, RecordStream};
