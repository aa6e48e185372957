//! In-memory endpoints for engine tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::config::Config;
use crate::core::catalog::Connector;
use crate::core::schema::ColumnDescriptor;
use crate::core::traits::{Dialect, SourceReader, TargetSession, TargetWriter};
use crate::core::value::{Batch, Row, SqlValue};
use crate::drivers::PostgresDialect;
use crate::error::{MigrateError, Result};

/// A source row, or a row the source cannot decode.
#[derive(Clone)]
pub enum SourceRow {
    Values(Row),
    Undecodable(&'static str),
}

#[derive(Clone, Default)]
struct SourceTable {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<SourceRow>,
    read_error: Option<String>,
}

#[derive(Default)]
pub struct MemorySource {
    tables: Vec<(String, SourceTable)>,
    pub describe_delay: Option<Duration>,
    pub list_error: Option<fn() -> MigrateError>,
    pub closed: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: &str, columns: &[(&str, &str)], rows: Vec<Row>) -> Self {
        let columns = columns
            .iter()
            .enumerate()
            .map(|(i, (n, t))| ColumnDescriptor::new(*n, *t, i as u32 + 1))
            .collect();
        self.tables.push((
            name.to_string(),
            SourceTable {
                columns,
                rows: rows.into_iter().map(SourceRow::Values).collect(),
                read_error: None,
            },
        ));
        self
    }

    /// Listed by `list_tables` but reports no columns.
    pub fn missing_table(mut self, name: &str) -> Self {
        self.tables.push((name.to_string(), SourceTable::default()));
        self
    }

    pub fn push_row(mut self, table: &str, row: SourceRow) -> Self {
        if let Some((_, t)) = self.tables.iter_mut().find(|(n, _)| n == table) {
            t.rows.push(row);
        }
        self
    }

    /// Stream the rows of `table`, then fail with a query error.
    pub fn fail_reading(mut self, table: &str, message: &str) -> Self {
        if let Some((_, t)) = self.tables.iter_mut().find(|(n, _)| n == table) {
            t.read_error = Some(message.to_string());
        }
        self
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceReader for MemorySource {
    async fn list_tables(&self) -> Result<Vec<String>> {
        if let Some(make_error) = self.list_error {
            return Err(make_error());
        }
        Ok(self.tables.iter().map(|(n, _)| n.clone()).collect())
    }

    async fn describe_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        if let Some(delay) = self.describe_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self
            .tables
            .iter()
            .find(|(n, _)| n == table)
            .map(|(_, t)| t.columns.clone())
            .unwrap_or_default())
    }

    fn read_rows(
        &self,
        table: &str,
        _columns: &[ColumnDescriptor],
        batch_size: usize,
    ) -> mpsc::Receiver<Result<Batch>> {
        let (tx, rx) = mpsc::channel(2);
        let source = self
            .tables
            .iter()
            .find(|(n, _)| n == table)
            .map(|(_, t)| t.clone())
            .unwrap_or_default();

        tokio::spawn(async move {
            let mut batch = Vec::new();
            for row in source.rows {
                match row {
                    SourceRow::Values(values) => batch.push(values),
                    SourceRow::Undecodable(column) => {
                        if !batch.is_empty() {
                            let _ = tx.send(Ok(Batch::new(std::mem::take(&mut batch)))).await;
                        }
                        let err = MigrateError::Decode {
                            column: column.to_string(),
                            message: "invalid value".into(),
                        };
                        let _ = tx.send(Err(err)).await;
                    }
                }
                if batch.len() >= batch_size {
                    let _ = tx.send(Ok(Batch::new(std::mem::take(&mut batch)))).await;
                }
            }
            if !batch.is_empty() {
                let _ = tx.send(Ok(Batch::new(batch))).await;
            }
            if let Some(message) = source.read_error {
                let _ = tx.send(Err(MigrateError::query("reading rows", message))).await;
            }
        });

        rx
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Committed target state, shared by all sessions.
#[derive(Default)]
pub struct TargetState {
    pub tables: HashMap<String, Vec<Row>>,
    pub statements: Vec<String>,
}

/// PostgreSQL-flavoured target kept in memory.
///
/// The first column of every table is treated as unique, inserting the text
/// `"boom"` fails with a generic error, and tables listed in `broken_tables`
/// cannot be created.
#[derive(Default)]
pub struct MemoryTarget {
    pub state: Arc<Mutex<TargetState>>,
    pub broken_tables: HashSet<String>,
    pub slow_values: HashSet<String>,
    pub timeout: Option<Duration>,
    pub unavailable: bool,
    /// The next this-many `session()` calls time out.
    pub session_timeouts: AtomicUsize,
    pub closed: AtomicUsize,
    dialect: PostgresDialect,
}

impl MemoryTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(self, name: &str, rows: Vec<Row>) -> Self {
        self.lock().tables.insert(name.to_string(), rows);
        self
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.lock().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.lock().tables.contains_key(table)
    }

    pub fn statements(&self) -> Vec<String> {
        self.lock().statements.clone()
    }

    pub fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TargetState> {
        self.state.lock().unwrap()
    }
}

#[async_trait]
impl TargetWriter for MemoryTarget {
    async fn session(&self) -> Result<Box<dyn TargetSession>> {
        if self.unavailable {
            return Err(MigrateError::connection("memory target", "connection refused"));
        }
        let timeouts_left = self
            .session_timeouts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if timeouts_left.is_ok() {
            return Err(MigrateError::timeout(
                "acquiring PostgreSQL session",
                Duration::from_secs(1),
            ));
        }
        Ok(Box::new(MemorySession {
            state: self.state.clone(),
            broken_tables: self.broken_tables.clone(),
            slow_values: self.slow_values.clone(),
            timeout: self.timeout,
            pending: Vec::new(),
            in_transaction: false,
        }))
    }

    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    fn schema(&self) -> &str {
        "public"
    }

    fn db_type(&self) -> &str {
        "memory"
    }

    async fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

enum Pending {
    Create(String),
    Insert(String, Row),
}

struct MemorySession {
    state: Arc<Mutex<TargetState>>,
    broken_tables: HashSet<String>,
    slow_values: HashSet<String>,
    timeout: Option<Duration>,
    pending: Vec<Pending>,
    in_transaction: bool,
}

/// Unquoted table name following `prefix` in a generated statement.
fn table_after(statement: &str, prefix: &str) -> String {
    let rest = &statement[prefix.len()..];
    let qualified = rest.split(" (").next().unwrap_or_default();
    let name = qualified.rsplit("\".\"").next().unwrap_or(qualified);
    name.trim_matches('"').replace("\"\"", "\"")
}

#[async_trait]
impl TargetSession for MemorySession {
    async fn begin(&mut self) -> Result<()> {
        assert!(!self.in_transaction, "nested BEGIN");
        self.in_transaction = true;
        Ok(())
    }

    async fn execute(&mut self, statement: &str, params: &[SqlValue]) -> Result<u64> {
        assert!(self.in_transaction, "statement outside a unit of work");
        let mut state = self.state.lock().unwrap();
        state.statements.push(statement.to_string());

        if statement.starts_with("CREATE TABLE ") {
            let table = table_after(statement, "CREATE TABLE ");
            if self.broken_tables.contains(&table) {
                return Err(MigrateError::query("CREATE TABLE", "syntax error at or near \"(\""));
            }
            let exists = state.tables.contains_key(&table)
                || self.pending.iter().any(|p| matches!(p, Pending::Create(t) if *t == table));
            if exists {
                return Err(MigrateError::DuplicateTable(table));
            }
            self.pending.push(Pending::Create(table));
            return Ok(0);
        }

        if statement.starts_with("INSERT INTO ") {
            let table = table_after(statement, "INSERT INTO ");
            let Some(existing) = state.tables.get(&table) else {
                return Err(MigrateError::query("INSERT", format!("relation \"{}\" does not exist", table)));
            };
            if let Some(SqlValue::Text(text)) = params.first() {
                if self.slow_values.contains(text) {
                    let limit = self.timeout.unwrap_or(Duration::from_secs(1));
                    return Err(MigrateError::timeout(statement, limit));
                }
            }
            if params.iter().any(|p| matches!(p, SqlValue::Text(t) if t == "boom")) {
                return Err(MigrateError::query("INSERT", "invalid input syntax for type integer"));
            }
            let key = params.first();
            let duplicate = existing.iter().any(|r| r.first() == key)
                || self.pending.iter().any(
                    |p| matches!(p, Pending::Insert(t, r) if *t == table && r.first() == key),
                );
            if duplicate {
                return Err(MigrateError::ConstraintViolation {
                    table,
                    message: "duplicate key value violates unique constraint".into(),
                });
            }
            self.pending.push(Pending::Insert(table, params.to_vec()));
            return Ok(1);
        }

        Err(MigrateError::query("execute", format!("unsupported statement: {}", statement)))
    }

    async fn commit(&mut self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for pending in self.pending.drain(..) {
            match pending {
                Pending::Create(table) => {
                    state.tables.insert(table, Vec::new());
                }
                Pending::Insert(table, row) => {
                    state.tables.entry(table).or_default().push(row);
                }
            }
        }
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.pending.clear();
        self.in_transaction = false;
        Ok(())
    }
}

/// Connector handing out prepared in-memory endpoints.
pub struct MemoryConnector {
    pub source: Arc<MemorySource>,
    pub target: Arc<MemoryTarget>,
    pub target_unreachable: bool,
}

impl MemoryConnector {
    pub fn new(source: MemorySource, target: MemoryTarget) -> Self {
        Self {
            source: Arc::new(source),
            target: Arc::new(target),
            target_unreachable: false,
        }
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn open_source(&self, _config: &Config) -> Result<Arc<dyn SourceReader>> {
        Ok(self.source.clone())
    }

    async fn open_target(&self, _config: &Config) -> Result<Arc<dyn TargetWriter>> {
        if self.target_unreachable {
            return Err(MigrateError::connection(
                "postgres://pg.internal:5432/patlu",
                "connection refused",
            ));
        }
        Ok(self.target.clone())
    }
}

pub fn int(v: i32) -> SqlValue {
    SqlValue::I32(v)
}

pub fn text(v: &str) -> SqlValue {
    SqlValue::Text(v.to_string())
}
