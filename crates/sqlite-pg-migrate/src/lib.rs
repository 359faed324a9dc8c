//! # sqlite-pg-migrate
//!
//! Moves the movies catalog from a legacy SQLite file into PostgreSQL.
//!
//! Five tables are supported: `film_work`, `genre`, `person` and the two link
//! tables `genre_film_work` and `person_film_work`. Each table is:
//!
//! - **Extracted** in fixed-size batches, with legacy column names
//!   (`created_at`, `updated_at`) rewritten to the model's names
//! - **Coerced** into typed records, rejecting malformed rows
//! - **Loaded** idempotently: rows whose id already exists are left alone
//! - **Verified** by re-reading both sides and comparing record by record
//!
//! ## Example
//!
//! ```rust,no_run
//! use sqlite_pg_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> sqlite_pg_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config).await?;
//!     let result = orchestrator.run().await?;
//!     println!("Migrated {} rows", result.rows_inserted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod transfer;
pub mod verify;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{CommitPolicy, Config, MigrationConfig, SourceConfig, TargetConfig};
pub use crate::core::{Row, SourceReader, SqlValue, TargetWriter};
pub use drivers::{PostgresWriter, SqliteReader, SslMode};
pub use error::{MigrateError, Result};
pub use model::{Record, TableKind};
pub use orchestrator::{HealthCheckResult, MigrationResult, Orchestrator, TableReport};
