//! Schema inspection of the source database.
//!
//! Wraps a [`SourceReader`] with table filtering, timeouts and the error
//! policy of the engine: a table with no columns is a schema error, and a
//! failure to list tables is always fatal.

use std::time::Duration;

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::core::schema::ColumnDescriptor;
use crate::core::timeout::with_timeout;
use crate::core::traits::SourceReader;
use crate::error::{MigrateError, Result};

/// Include/exclude table filter with `*` and `?` wildcards.
///
/// Matching is case-insensitive. An empty include list admits every table;
/// a table matching any exclude pattern is always dropped.
#[derive(Debug, Clone, Default)]
pub struct TableFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl TableFilter {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        let compile = |patterns: &[String]| -> Result<Vec<Regex>> {
            patterns.iter().map(|p| wildcard_regex(p)).collect()
        };
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    pub fn matches(&self, table: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|r| r.is_match(table));
        included && !self.exclude.iter().any(|r| r.is_match(table))
    }
}

/// Anchored, case-insensitive regex for a `*`/`?` table pattern.
fn wildcard_regex(pattern: &str) -> Result<Regex> {
    let mut expr = String::with_capacity(pattern.len() + 2);
    expr.push('^');
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    expr.push('$');

    RegexBuilder::new(&expr)
        .case_insensitive(true)
        .build()
        .map_err(|e| MigrateError::Config(format!("invalid table pattern '{}': {}", pattern, e)))
}

/// Lists and describes source tables.
pub struct SchemaInspector<'a> {
    source: &'a dyn SourceReader,
    filter: TableFilter,
    timeout: Duration,
}

impl<'a> SchemaInspector<'a> {
    pub fn new(source: &'a dyn SourceReader, filter: TableFilter, timeout: Duration) -> Self {
        Self {
            source,
            filter,
            timeout,
        }
    }

    /// Base tables of the source database that pass the filter.
    ///
    /// Every error here is fatal to the run; query failures are reported as
    /// connection errors on the source.
    pub async fn list_tables(&self) -> Result<Vec<String>> {
        let tables = with_timeout(self.timeout, "listing source tables", self.source.list_tables())
            .await
            .map_err(|e| match e {
                MigrateError::Query { context, message } => MigrateError::connection(
                    format!("{} source", self.source.db_type()),
                    format!("{}: {}", context, message),
                ),
                other => other,
            })?;

        let total = tables.len();
        let selected: Vec<String> = tables.into_iter().filter(|t| self.filter.matches(t)).collect();
        debug!("Selected {} of {} source tables", selected.len(), total);
        Ok(selected)
    }

    /// Columns of `table` in declared order.
    pub async fn describe_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        let operation = format!("describing table {}", table);
        let mut columns =
            with_timeout(self.timeout, operation, self.source.describe_columns(table)).await?;

        if columns.is_empty() {
            return Err(MigrateError::schema(
                table,
                "table has no columns or does not exist",
            ));
        }
        columns.sort_by_key(|c| c.ordinal);
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{int, MemorySource};

    fn source() -> MemorySource {
        MemorySource::new()
            .table("users", &[("id", "int(11)"), ("name", "varchar(50)")], vec![vec![int(1)]])
            .table("orders", &[("id", "bigint(20)")], vec![])
            .table("tmp_users", &[("id", "int(11)")], vec![])
            .missing_table("ghost")
    }

    fn wildcard_match(pattern: &str, name: &str) -> bool {
        wildcard_regex(pattern).unwrap().is_match(name)
    }

    #[test]
    fn test_wildcard_match() {
        assert!(wildcard_match("users", "USERS"));
        assert!(wildcard_match("tmp_*", "tmp_users"));
        assert!(wildcard_match("*", ""));
        assert!(wildcard_match("user?", "users"));
        assert!(wildcard_match("*_log*", "audit_log_2024"));
        assert!(!wildcard_match("user?", "user"));
        assert!(!wildcard_match("tmp_*", "users"));
        assert!(!wildcard_match("a*b", "acbd"));
        // Regex metacharacters in table names are literal.
        assert!(wildcard_match("log.v1", "LOG.V1"));
        assert!(!wildcard_match("log.v1", "logxv1"));
        assert!(wildcard_match("t+(1)", "t+(1)"));
    }

    #[test]
    fn test_filter_exclusion_wins() {
        let filter = TableFilter::new(&["*users".to_string()], &["tmp_*".to_string()]).unwrap();
        assert!(filter.matches("users"));
        assert!(!filter.matches("tmp_users"));
        assert!(!filter.matches("orders"));
        assert!(TableFilter::default().matches("anything"));
    }

    #[tokio::test]
    async fn test_list_tables_applies_filter() {
        let source = source();
        let filter = TableFilter::new(&[], &["tmp_*".to_string(), "ghost".to_string()]).unwrap();
        let inspector = SchemaInspector::new(&source, filter, Duration::from_secs(5));
        assert_eq!(inspector.list_tables().await.unwrap(), vec!["users", "orders"]);
    }

    #[tokio::test]
    async fn test_list_tables_query_failure_is_fatal() {
        let mut source = source();
        source.list_error = Some(|| MigrateError::query("listing MySQL tables", "access denied"));
        let inspector = SchemaInspector::new(&source, TableFilter::default(), Duration::from_secs(5));
        let err = inspector.list_tables().await.unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("access denied"));
    }

    #[tokio::test]
    async fn test_describe_columns_in_declared_order() {
        let source = source();
        let inspector = SchemaInspector::new(&source, TableFilter::default(), Duration::from_secs(5));
        let columns = inspector.describe_columns("users").await.unwrap();
        let names: Vec<_> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name"]);
        assert_eq!(columns[1].type_signature, "varchar(50)");
    }

    #[tokio::test]
    async fn test_missing_table_is_schema_error() {
        let source = source();
        let inspector = SchemaInspector::new(&source, TableFilter::default(), Duration::from_secs(5));
        let err = inspector.describe_columns("ghost").await.unwrap_err();
        assert!(matches!(err, MigrateError::Schema { ref table, .. } if table == "ghost"));
        assert!(!err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_describe_times_out() {
        let mut source = source();
        source.describe_delay = Some(Duration::from_secs(60));
        let inspector = SchemaInspector::new(&source, TableFilter::default(), Duration::from_secs(1));
        let err = inspector.describe_columns("users").await.unwrap_err();
        assert!(matches!(err, MigrateError::Timeout { .. }));
    }
}
