//! Error types for the migration library.

use std::time::Duration;

use thiserror::Error;

/// Main error type for migration operations.
///
/// Only [`MigrateError::Connection`] is fatal to a run. Schema and creation
/// errors are recorded against their table, and row-level errors are recorded
/// as skipped rows.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A database endpoint is unreachable or its connection was lost.
    #[error("Connection error ({endpoint}): {message}")]
    Connection { endpoint: String, message: String },

    /// A database call did not complete within the configured timeout.
    #[error("Timed out after {}s: {operation}", .after.as_secs_f64())]
    Timeout { operation: String, after: Duration },

    /// Table metadata could not be read (missing table, bad introspection).
    #[error("Schema error for table {table}: {message}")]
    Schema { table: String, message: String },

    /// The target table already exists.
    #[error("Table {0} already exists")]
    DuplicateTable(String),

    /// An insert violated a uniqueness or other integrity constraint.
    #[error("Constraint violation on table {table}: {message}")]
    ConstraintViolation { table: String, message: String },

    /// A query failed for a reason that is not connection-level.
    #[error("Query failed ({context}): {message}")]
    Query { context: String, message: String },

    /// A source value could not be decoded.
    #[error("Cannot decode column {column}: {message}")]
    Decode { column: String, message: String },

    /// Migration was cancelled (SIGINT, etc.)
    #[error("Migration cancelled")]
    Cancelled,

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
    /// Create a Connection error for the named endpoint.
    pub fn connection(endpoint: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Connection {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// Create a Schema error.
    pub fn schema(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::Schema {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a Query error with context about where it occurred.
    pub fn query(context: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Query {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Create a Timeout error.
    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        MigrateError::Timeout {
            operation: operation.into(),
            after,
        }
    }

    /// Whether this error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, MigrateError::Connection { .. })
    }

    /// Process exit code used by the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => 2,
            MigrateError::Connection { .. } => 3,
            MigrateError::Timeout { .. } => 4,
            MigrateError::Cancelled => 130,
            _ => 1,
        }
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
