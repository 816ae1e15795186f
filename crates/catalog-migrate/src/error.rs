//! Error types for the catalog migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source database could not be reached at startup.
    #[error("Source database unavailable: {0}")]
    SourceUnavailable(String),

    /// Target database could not be reached at startup.
    #[error("Target database unavailable: {0}")]
    TargetUnavailable(String),

    /// A legacy table is missing a column the migration depends on.
    #[error("Schema mismatch: table {table} has no usable column {column}")]
    SchemaMismatch { table: String, column: String },

    /// Source database query error
    #[error("Source database error: {0}")]
    Source(#[from] sqlx::Error),

    /// Target database query error
    #[error("Target database error: {0}")]
    Target(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,
}

impl MigrateError {
    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl ToString, context: impl Into<String>) -> Self {
        MigrateError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Create a SchemaMismatch error
    pub fn schema_mismatch(table: impl Into<String>, column: impl Into<String>) -> Self {
        MigrateError::SchemaMismatch {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 1,
            MigrateError::SourceUnavailable(_)
            | MigrateError::TargetUnavailable(_)
            | MigrateError::Pool { .. } => 2,
            MigrateError::SchemaMismatch { .. } => 3,
            MigrateError::Source(_) | MigrateError::Target(_) => 4,
            MigrateError::Json(_) => 5,
            MigrateError::Cancelled => 6,
            MigrateError::Io(_) => 7,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        // Add error chain for wrapped errors
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
