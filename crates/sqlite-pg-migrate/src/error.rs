//! Error types for the migration library.

use thiserror::Error;

use crate::model::RecordError;

/// Exit code for configuration errors (invalid YAML, missing fields, no tables).
pub const EXIT_CONFIG_ERROR: u8 = 1;
/// Exit code for connection and driver errors outside a table load.
pub const EXIT_CONNECTION_ERROR: u8 = 2;
/// Exit code for rows that could not be coerced into entity records.
pub const EXIT_COERCION_ERROR: u8 = 3;
/// Exit code for destination write failures.
pub const EXIT_LOAD_ERROR: u8 = 4;
/// Exit code for verification mismatches.
pub const EXIT_VERIFICATION_ERROR: u8 = 5;
/// Exit code for file system errors.
pub const EXIT_IO_ERROR: u8 = 7;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, no source tables, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Target database connection or query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// A source row could not be turned into a typed record
    #[error("Coercion failed for table {table}: {source}")]
    Coercion {
        table: String,
        #[source]
        source: RecordError,
    },

    /// Writing a batch to the destination failed
    #[error("Load failed for table {table}: {message}")]
    Load { table: String, message: String },

    /// Source and destination disagree after the load
    #[error("Verification failed for table {table}: {message}")]
    Verification { table: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a Coercion error
    pub fn coercion(table: impl Into<String>, source: RecordError) -> Self {
        MigrateError::Coercion {
            table: table.into(),
            source,
        }
    }

    /// Create a Load error
    pub fn load(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Load {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Verification error
    pub fn verification(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Verification {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Json(_) => {
                EXIT_CONFIG_ERROR
            }
            MigrateError::Source(_) | MigrateError::Target(_) | MigrateError::Pool { .. } => {
                EXIT_CONNECTION_ERROR
            }
            MigrateError::Coercion { .. } => EXIT_COERCION_ERROR,
            MigrateError::Load { .. } => EXIT_LOAD_ERROR,
            MigrateError::Verification { .. } => EXIT_VERIFICATION_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// One-line message: this error followed by each cause not already shown.
    ///
    /// Driver errors display a generic summary ("db error") and keep the
    /// server's message in their source, so callers that flatten an error
    /// into text must use this rather than `to_string()`.
    pub fn cause_chain(&self) -> String {
        let mut output = self.to_string();

        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            let text = err.to_string();
            if !output.contains(&text) {
                output.push_str(": ");
                output.push_str(&text);
            }
            source = err.source();
        }

        output
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
