//! Configuration loading and validation.
//!
//! Two sources are supported: a YAML file ([`Config::load`]) or process
//! environment variables ([`Config::from_env`]), the latter seeded from a
//! `.env` file in the working directory when one exists.

mod types;
mod validation;

pub use types::*;

use std::path::{Path, PathBuf};

use crate::error::{MigrateError, Result};

/// Environment variable names read by [`Config::from_env`].
pub mod env_keys {
    pub const SQLITE_PATH: &str = "SQLITE_PATH";
    pub const POSTGRES_DB: &str = "POSTGRES_DB";
    pub const POSTGRES_USER: &str = "POSTGRES_USER";
    pub const POSTGRES_PASSWORD: &str = "POSTGRES_PASSWORD";
    pub const POSTGRES_HOST: &str = "POSTGRES_HOST";
    pub const POSTGRES_PORT: &str = "POSTGRES_PORT";
    pub const POSTGRES_SCHEMA: &str = "POSTGRES_SCHEMA";
    pub const POSTGRES_SSLMODE: &str = "POSTGRES_SSLMODE";
    pub const MIGRATION_BATCH_SIZE: &str = "MIGRATION_BATCH_SIZE";
    pub const MIGRATION_COMMIT_POLICY: &str = "MIGRATION_COMMIT_POLICY";
    pub const MIGRATION_VERIFY: &str = "MIGRATION_VERIFY";
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from the environment, after loading `.env`.
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine; variables may come from the shell.
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup (the environment in practice).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        use env_keys::*;

        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| {
                    MigrateError::Config(format!("environment variable {} is required", key))
                })
        };

        let port = match lookup(POSTGRES_PORT) {
            Some(v) => v.trim().parse::<u16>().map_err(|_| {
                MigrateError::Config(format!("{} must be a port number, got '{}'", POSTGRES_PORT, v))
            })?,
            None => default_pg_port(),
        };

        let batch_size = match lookup(MIGRATION_BATCH_SIZE) {
            Some(v) => Some(v.trim().parse::<usize>().map_err(|_| {
                MigrateError::Config(format!(
                    "{} must be a positive integer, got '{}'",
                    MIGRATION_BATCH_SIZE, v
                ))
            })?),
            None => None,
        };

        let commit_policy = match lookup(MIGRATION_COMMIT_POLICY) {
            Some(v) => CommitPolicy::parse(&v).ok_or_else(|| {
                MigrateError::Config(format!(
                    "{} must be 'before_verify' or 'after_verify', got '{}'",
                    MIGRATION_COMMIT_POLICY, v
                ))
            })?,
            None => CommitPolicy::default(),
        };

        let verify = match lookup(MIGRATION_VERIFY) {
            Some(v) => parse_bool(&v).ok_or_else(|| {
                MigrateError::Config(format!(
                    "{} must be true or false, got '{}'",
                    MIGRATION_VERIFY, v
                ))
            })?,
            None => true,
        };

        let config = Config {
            source: SourceConfig {
                r#type: "sqlite".to_string(),
                path: PathBuf::from(required(SQLITE_PATH)?),
            },
            target: TargetConfig {
                r#type: "postgres".to_string(),
                host: required(POSTGRES_HOST)?,
                port,
                database: required(POSTGRES_DB)?,
                user: required(POSTGRES_USER)?,
                password: lookup(POSTGRES_PASSWORD).unwrap_or_default(),
                schema: lookup(POSTGRES_SCHEMA)
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(default_content_schema),
                ssl_mode: lookup(POSTGRES_SSLMODE)
                    .filter(|v| !v.is_empty())
                    .unwrap_or_else(default_disable),
            },
            migration: MigrationConfig {
                batch_size,
                commit_policy,
                verify,
                exclude_tables: Vec::new(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" | "on" => Some(true),
        "false" | "no" | "0" | "off" => Some(false),
        _ => None,
    }
}
