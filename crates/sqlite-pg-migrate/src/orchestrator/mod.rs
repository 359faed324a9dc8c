//! Migration orchestrator - main workflow coordinator.
//!
//! A run is one sequential pass:
//!
//! 1. **Discover** source tables (sorted, minus `exclude_tables`). No tables
//!    is a configuration error; so is any name outside the five known ones.
//! 2. Per table: open a destination transaction, **load**, then commit and
//!    **verify** in the order the [`CommitPolicy`] dictates.
//! 3. Stop at the first error. Tables committed before it stay committed.
//!
//! Both stores are closed before `run`, `verify` and `health_check` return,
//! whatever the outcome.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::{CommitPolicy, Config};
use crate::core::traits::{SourceReader, TargetWriter};
use crate::drivers::{PostgresWriter, SqliteReader};
use crate::error::{MigrateError, Result};
use crate::model::TableKind;
use crate::transfer::{BatchExtractor, BulkLoader, LoadStats, RecordStream};
use crate::verify::{TransferVerifier, VerifyStats};

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    source: Arc<dyn SourceReader>,
    target: Arc<dyn TargetWriter>,
}

/// Result of a migration or verification run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// Tables processed.
    pub tables_total: usize,

    /// Per-table outcome, in processing order.
    pub tables: Vec<TableReport>,

    /// Rows read from the source across all tables.
    pub rows_read: u64,

    /// Rows newly written to the destination across all tables.
    pub rows_inserted: u64,
}

impl MigrationResult {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Outcome for a single table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub batches: usize,
    pub rows_read: u64,
    pub rows_inserted: u64,
    /// Rows left untouched because their id already existed.
    pub rows_skipped: u64,
    pub verified: bool,
    pub rows_verified: u64,
}

impl TableReport {
    fn new(table: TableKind) -> Self {
        Self {
            table: table.name().to_string(),
            ..Self::default()
        }
    }

    fn record_load(&mut self, stats: LoadStats) {
        self.batches = stats.batches;
        self.rows_read = stats.rows_read;
        self.rows_inserted = stats.rows_inserted;
        self.rows_skipped = stats.rows_skipped();
    }

    fn record_verify(&mut self, stats: VerifyStats) {
        self.verified = true;
        self.rows_verified = stats.rows_verified;
    }
}

/// Result of a connectivity check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    /// Migratable tables found in the source.
    pub source_tables: Vec<String>,
    pub target_connected: bool,
    pub target_latency_ms: u64,
    pub target_error: Option<String>,
}

impl Orchestrator {
    /// Open both stores described by `config`.
    pub async fn new(config: Config) -> Result<Self> {
        let source = SqliteReader::new(&config.source).await?;
        let target = match PostgresWriter::new(&config.target).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };

        Ok(Self::with_stores(config, Arc::new(source), Arc::new(target)))
    }

    /// Build an orchestrator over already opened stores.
    pub fn with_stores(
        config: Config,
        source: Arc<dyn SourceReader>,
        target: Arc<dyn TargetWriter>,
    ) -> Self {
        Self {
            config,
            source,
            target,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the migration.
    pub async fn run(self) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting migration run: {}", run_id);

        let mut reports = Vec::new();
        let outcome = self.migrate_all(&mut reports).await;
        self.close().await;

        match outcome {
            Ok(()) => {
                let result = build_result(run_id, "completed", started_at, reports);
                info!(
                    "Migration {}: {} tables, {} rows read, {} inserted in {:.1}s",
                    result.status,
                    result.tables_total,
                    result.rows_read,
                    result.rows_inserted,
                    result.duration_seconds
                );
                Ok(result)
            }
            Err(e) => {
                let completed: Vec<&str> = reports
                    .iter()
                    .filter(|r| !self.config.migration.verify || r.verified)
                    .map(|r| r.table.as_str())
                    .collect();
                error!(
                    "Migration {} failed: {} (tables completed: [{}])",
                    run_id,
                    e.cause_chain(),
                    completed.join(", ")
                );
                Err(e)
            }
        }
    }

    /// Verify every source table against the destination without loading.
    pub async fn verify(self) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting verification run: {}", run_id);

        let mut reports = Vec::new();
        let outcome = self.verify_all(&mut reports).await;
        self.close().await;

        outcome?;
        let result = build_result(run_id, "verified", started_at, reports);
        info!(
            "Verification passed: {} tables, {} rows in {:.1}s",
            result.tables_total,
            result.tables.iter().map(|t| t.rows_verified).sum::<u64>(),
            result.duration_seconds
        );
        Ok(result)
    }

    /// Check both connections and list the source tables.
    pub async fn health_check(self) -> Result<HealthCheckResult> {
        let start = Instant::now();
        let source_outcome = match self.source.ping().await {
            Ok(()) => self.discover().await,
            Err(e) => Err(e),
        };
        let source_latency_ms = start.elapsed().as_millis() as u64;

        let start = Instant::now();
        let target_outcome = self.target.ping().await;
        let target_latency_ms = start.elapsed().as_millis() as u64;

        self.close().await;

        let (source_tables, source_error) = match source_outcome {
            Ok(tables) => (tables.iter().map(|t| t.name().to_string()).collect(), None),
            Err(e) => (Vec::new(), Some(e.cause_chain())),
        };
        let target_error = target_outcome.err().map(|e| e.cause_chain());

        Ok(HealthCheckResult {
            healthy: source_error.is_none() && target_error.is_none(),
            source_connected: source_error.is_none(),
            source_latency_ms,
            source_error,
            source_tables,
            target_connected: target_error.is_none(),
            target_latency_ms,
            target_error,
        })
    }

    /// List source tables, drop excluded ones and resolve the rest.
    async fn discover(&self) -> Result<Vec<TableKind>> {
        let mut names = self.source.list_tables().await?;
        names.sort();
        names.retain(|name| !self.config.migration.exclude_tables.contains(name));

        if names.is_empty() {
            return Err(MigrateError::Config(
                "no tables found in the source database to migrate".to_string(),
            ));
        }

        names.iter().map(|name| TableKind::from_name(name)).collect()
    }

    async fn migrate_all(&self, reports: &mut Vec<TableReport>) -> Result<()> {
        let tables = self.discover().await?;
        info!(
            "Found {} tables to migrate: {}",
            tables.len(),
            tables
                .iter()
                .map(|t| t.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        for table in tables {
            reports.push(TableReport::new(table));
            if let Some(report) = reports.last_mut() {
                self.migrate_table(table, report).await?;
            }
        }
        Ok(())
    }

    async fn migrate_table(&self, table: TableKind, report: &mut TableReport) -> Result<()> {
        let migration = &self.config.migration;
        let schema = self.config.target.schema.as_str();
        let batch_size = migration.get_batch_size();

        self.target.begin().await?;

        let extractor = BatchExtractor::new(self.source.as_ref(), batch_size);
        let loaded = match extractor.extract(table) {
            Ok(batches) => {
                BulkLoader::new(self.target.as_ref(), schema)
                    .load(RecordStream::new(batches))
                    .await
            }
            Err(e) => Err(e),
        };
        let stats = match loaded {
            Ok(stats) => stats,
            Err(e) => {
                self.rollback(table).await;
                return Err(e);
            }
        };
        report.record_load(stats);
        info!(
            "{}: loaded ({} rows, {} new, {} already present)",
            table,
            stats.rows_read,
            stats.rows_inserted,
            stats.rows_skipped()
        );

        let verifier = TransferVerifier::new(
            self.source.as_ref(),
            self.target.as_ref(),
            schema,
            batch_size,
        );

        match (migration.commit_policy, migration.verify) {
            (_, false) => {
                self.target.commit().await?;
            }
            (CommitPolicy::BeforeVerify, true) => {
                self.target.commit().await?;
                report.record_verify(verifier.verify(table).await?);
            }
            (CommitPolicy::AfterVerify, true) => match verifier.verify(table).await {
                Ok(verified) => {
                    self.target.commit().await?;
                    report.record_verify(verified);
                }
                Err(e) => {
                    warn!("{}: verification failed, rolling back the load", table);
                    self.rollback(table).await;
                    return Err(e);
                }
            },
        }

        Ok(())
    }

    async fn verify_all(&self, reports: &mut Vec<TableReport>) -> Result<()> {
        let tables = self.discover().await?;
        let verifier = TransferVerifier::new(
            self.source.as_ref(),
            self.target.as_ref(),
            &self.config.target.schema,
            self.config.migration.get_batch_size(),
        );

        for table in tables {
            let stats = verifier.verify(table).await?;
            let mut report = TableReport::new(table);
            report.record_verify(stats);
            report.batches = stats.batches;
            reports.push(report);
        }
        Ok(())
    }

    async fn rollback(&self, table: TableKind) {
        if let Err(e) = self.target.rollback().await {
            warn!("{}: rollback failed: {}", table, e.cause_chain());
        }
    }

    async fn close(&self) {
        self.source.close().await;
        self.target.close().await;
    }
}

fn build_result(
    run_id: String,
    status: &str,
    started_at: DateTime<Utc>,
    tables: Vec<TableReport>,
) -> MigrationResult {
    let completed_at = Utc::now();
    let duration_seconds = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

    MigrationResult {
        run_id,
        status: status.to_string(),
        started_at,
        completed_at,
        duration_seconds,
        tables_total: tables.len(),
        rows_read: tables.iter().map(|t| t.rows_read).sum(),
        rows_inserted: tables.iter().map(|t| t.rows_inserted).sum(),
        tables,
    }
}
