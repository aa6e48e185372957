//! Core traits for the migration engine.
//!
//! - [`SourceReader`]: lists tables, describes columns and streams rows
//! - [`TargetWriter`]: hands out sessions on the target database
//! - [`TargetSession`]: one connection with explicit unit-of-work control
//! - [`Dialect`]: SQL syntax strategy for a database engine
//!
//! The engine only talks to these traits, so the inspector, creator, copier
//! and orchestrator can all be exercised with in-memory implementations.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

use super::schema::{ColumnDeclaration, ColumnDescriptor};
use super::value::{Batch, SqlValue};

/// Read schema and data from a source database.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// Names of the base tables in the source database.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Columns of `table` in declared order.
    ///
    /// Returns an empty list when the table does not exist; the inspector
    /// turns that into a schema error.
    async fn describe_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>>;

    /// Start streaming rows from a table.
    ///
    /// The reader spawns a background task that fills a bounded channel with
    /// batches of at most `batch_size` rows, in source read order. A row
    /// that cannot be decoded is sent as a [`MigrateError::Decode`] in its
    /// place and streaming continues. The channel closes once the table is
    /// exhausted or after any other error.
    ///
    /// [`MigrateError::Decode`]: crate::error::MigrateError::Decode
    fn read_rows(
        &self,
        table: &str,
        columns: &[ColumnDescriptor],
        batch_size: usize,
    ) -> mpsc::Receiver<Result<Batch>>;

    /// Database type identifier (e.g. "mysql").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}

/// Write schema and data to a target database.
#[async_trait]
pub trait TargetWriter: Send + Sync {
    /// Acquire a dedicated session.
    ///
    /// Each table copy runs on its own session so that concurrent tables
    /// never share a transaction.
    async fn session(&self) -> Result<Box<dyn TargetSession>>;

    /// SQL syntax of the target.
    fn dialect(&self) -> &dyn Dialect;

    /// Schema new tables are created in.
    fn schema(&self) -> &str;

    /// Database type identifier (e.g. "postgres").
    fn db_type(&self) -> &str;

    /// Close the connection pool.
    async fn close(&self);
}

/// A single target connection with explicit transaction control.
///
/// Errors are classified by the implementation: duplicate tables surface as
/// `DuplicateTable`, integrity violations as `ConstraintViolation`, lost
/// connections as `Connection`.
#[async_trait]
pub trait TargetSession: Send {
    async fn begin(&mut self) -> Result<()>;

    /// Execute a statement with positional parameters, returning the number
    /// of affected rows.
    async fn execute(&mut self, statement: &str, params: &[SqlValue]) -> Result<u64>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}

/// SQL syntax strategy for different database engines.
pub trait Dialect: Send + Sync {
    /// Dialect identifier (e.g. "mysql", "postgres").
    fn name(&self) -> &str;

    /// Quote an identifier (table name, column name, etc.).
    fn quote_ident(&self, name: &str) -> String;

    /// Parameter placeholder for the given 1-based index.
    fn param_placeholder(&self, index: usize) -> String;

    /// Qualify a table with its schema, when there is one.
    fn qualify(&self, schema: &str, table: &str) -> String {
        if schema.is_empty() {
            self.quote_ident(table)
        } else {
            format!("{}.{}", self.quote_ident(schema), self.quote_ident(table))
        }
    }

    /// `SELECT <columns> FROM <table>` in declared column order.
    fn build_select_all(&self, schema: &str, table: &str, columns: &[ColumnDescriptor]) -> String {
        let cols = if columns.is_empty() {
            "*".to_string()
        } else {
            columns
                .iter()
                .map(|c| self.quote_ident(&c.name))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!("SELECT {} FROM {}", cols, self.qualify(schema, table))
    }

    /// `CREATE TABLE` statement for the mapped columns.
    fn build_create_table(&self, schema: &str, table: &str, columns: &[ColumnDeclaration]) -> String {
        let col_defs = columns
            .iter()
            .map(|c| format!("{} {}", self.quote_ident(&c.name), c.target_type))
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({})", self.qualify(schema, table), col_defs)
    }

    /// Single-row `INSERT` with one positional placeholder per column.
    fn build_insert(&self, schema: &str, table: &str, columns: &[String]) -> String {
        let col_list = columns
            .iter()
            .map(|c| self.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (1..=columns.len())
            .map(|i| self.param_placeholder(i))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualify(schema, table),
            col_list,
            placeholders
        )
    }
}
