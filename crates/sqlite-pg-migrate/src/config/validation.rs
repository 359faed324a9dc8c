//! Configuration validation.

use super::Config;
use crate::core::identifier::validate_identifier;
use crate::drivers::SslMode;
use crate::error::{MigrateError, Result};
use crate::model::TableKind;

/// PostgreSQL's limit on bind parameters in one statement.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Largest batch whose INSERT fits in one statement for every table.
pub fn max_batch_size() -> usize {
    MAX_BIND_PARAMS / TableKind::max_field_count().max(1)
}

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.r#type != "sqlite" {
        return Err(MigrateError::Config(format!(
            "source.type must be 'sqlite', got '{}'",
            config.source.r#type
        )));
    }
    if config.source.path.as_os_str().is_empty() {
        return Err(MigrateError::Config("source.path is required".into()));
    }

    // Target validation
    if config.target.r#type != "postgres" {
        return Err(MigrateError::Config(format!(
            "target.type must be 'postgres', got '{}'",
            config.target.r#type
        )));
    }
    if config.target.host.is_empty() {
        return Err(MigrateError::Config("target.host is required".into()));
    }
    if config.target.database.is_empty() {
        return Err(MigrateError::Config("target.database is required".into()));
    }
    if config.target.user.is_empty() {
        return Err(MigrateError::Config("target.user is required".into()));
    }
    validate_identifier(&config.target.schema)
        .map_err(|e| MigrateError::Config(format!("target.schema is invalid: {}", e)))?;
    SslMode::parse(&config.target.ssl_mode)?;

    // Migration config validation - only check if explicitly set
    if let Some(batch_size) = config.migration.batch_size {
        if batch_size == 0 {
            return Err(MigrateError::Config(
                "migration.batch_size must be at least 1".into(),
            ));
        }
        if batch_size > max_batch_size() {
            return Err(MigrateError::Config(format!(
                "migration.batch_size {} exceeds {} (PostgreSQL allows {} parameters per statement)",
                batch_size,
                max_batch_size(),
                MAX_BIND_PARAMS
            )));
        }
    }

    Ok(())
}
