//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::transfer::DEFAULT_BATCH_SIZE;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (SQLite).
    pub source: SourceConfig,

    /// Target database configuration (PostgreSQL).
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Source database (SQLite) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database type (always "sqlite").
    #[serde(default = "default_sqlite")]
    pub r#type: String,

    /// Path to the database file.
    pub path: PathBuf,
}

/// Target database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Database type (always "postgres").
    #[serde(default = "default_postgres")]
    pub r#type: String,

    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Target schema (default: "content").
    #[serde(default = "default_content_schema")]
    pub schema: String,

    /// SSL mode (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,
}

impl fmt::Debug for TargetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TargetConfig")
            .field("type", &self.r#type)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("schema", &self.schema)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Rows per page read from the source and per INSERT statement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,

    /// When each table's destination transaction is committed.
    #[serde(default)]
    pub commit_policy: CommitPolicy,

    /// Verify each table after loading it (default: true).
    #[serde(default = "default_true")]
    pub verify: bool,

    /// Source tables to leave out (exact names).
    #[serde(default)]
    pub exclude_tables: Vec<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            batch_size: None,
            commit_policy: CommitPolicy::default(),
            verify: true,
            exclude_tables: Vec::new(),
        }
    }
}

impl MigrationConfig {
    pub fn get_batch_size(&self) -> usize {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }
}

/// Commit point of a table's destination transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Commit once the load finishes, then verify. A failed verification
    /// leaves the table's rows committed.
    #[default]
    BeforeVerify,

    /// Verify inside the open transaction; commit only if it passes,
    /// roll back otherwise.
    AfterVerify,
}

impl CommitPolicy {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "before_verify" => Some(CommitPolicy::BeforeVerify),
            "after_verify" => Some(CommitPolicy::AfterVerify),
            _ => None,
        }
    }
}

// Default value functions for serde
fn default_sqlite() -> String {
    "sqlite".to_string()
}

fn default_postgres() -> String {
    "postgres".to_string()
}

pub(crate) fn default_pg_port() -> u16 {
    5432
}

pub(crate) fn default_content_schema() -> String {
    "content".to_string()
}

pub(crate) fn default_disable() -> String {
    "disable".to_string()
}

fn default_true() -> bool {
    true
}
