//! Identifier validation and quoting.
//!
//! Table, schema and column names cannot be bound as statement parameters,
//! so every identifier spliced into SQL goes through [`quote_ident`] or
//! [`qualify`] first. SQLite and PostgreSQL share the double-quote syntax.

use crate::error::{MigrateError, Result};

/// PostgreSQL truncates identifiers past this many bytes.
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validate an identifier for security issues.
///
/// Rejects empty names, names containing null bytes, and names longer than
/// PostgreSQL accepts.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote an identifier with double quotes, doubling embedded quotes.
pub fn quote_ident(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", name.replace('"', "\"\"")))
}

/// Qualify a table name with its schema.
pub fn qualify(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote_ident(schema)?, quote_ident(table)?))
}
