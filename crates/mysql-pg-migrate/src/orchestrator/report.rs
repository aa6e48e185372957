//! Migration report types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::schema::ColumnDeclaration;
use crate::creator::CreationOutcome;
use crate::error::Result;
use crate::transfer::{CopyOutcome, SkippedRow};

/// Final status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    /// Stopped at a table boundary; the report covers finished tables only.
    Cancelled,
}

/// What happened to one source table.
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    pub source_table: String,
    pub target_table: String,

    /// Mapped column declarations, empty if the table could not be described.
    pub columns: Vec<ColumnDeclaration>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_statement: Option<String>,

    /// Absent when the table failed before creation was attempted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub creation: Option<CreationOutcome>,

    pub rows_attempted: u64,
    pub rows_inserted: u64,
    pub rows_skipped: Vec<SkippedRow>,

    /// Schema or source read error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub duration_seconds: f64,
}

impl TableReport {
    pub fn new(source_table: impl Into<String>, target_table: impl Into<String>) -> Self {
        Self {
            source_table: source_table.into(),
            target_table: target_table.into(),
            columns: Vec::new(),
            create_statement: None,
            creation: None,
            rows_attempted: 0,
            rows_inserted: 0,
            rows_skipped: Vec::new(),
            error: None,
            duration_seconds: 0.0,
        }
    }

    pub(crate) fn record_copy(&mut self, outcome: CopyOutcome) {
        self.rows_attempted = outcome.attempted;
        self.rows_inserted = outcome.inserted;
        self.rows_skipped = outcome.skipped;
        if outcome.read_error.is_some() {
            self.error = outcome.read_error;
        }
    }

    /// A table failed if it could not be described, created or fully read.
    /// Skipped rows alone do not fail a table.
    pub fn is_failed(&self) -> bool {
        self.error.is_some() || matches!(self.creation, Some(CreationOutcome::Failed { .. }))
    }
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub run_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,

    /// Source tables selected for the run.
    pub tables_total: usize,

    /// One entry per processed table, in source table order.
    pub tables: Vec<TableReport>,

    pub rows_attempted: u64,
    pub rows_inserted: u64,
    pub rows_skipped: u64,
    pub failed_tables: Vec<String>,
}

impl MigrationReport {
    pub(crate) fn finish(
        run_id: String,
        status: RunStatus,
        started_at: DateTime<Utc>,
        tables_total: usize,
        tables: Vec<TableReport>,
    ) -> Self {
        let completed_at = Utc::now();
        let duration_seconds =
            (completed_at - started_at).num_milliseconds().max(0) as f64 / 1000.0;

        Self {
            run_id,
            status,
            started_at,
            completed_at,
            duration_seconds,
            tables_total,
            rows_attempted: tables.iter().map(|t| t.rows_attempted).sum(),
            rows_inserted: tables.iter().map(|t| t.rows_inserted).sum(),
            rows_skipped: tables.iter().map(|t| t.rows_skipped.len() as u64).sum(),
            failed_tables: tables
                .iter()
                .filter(|t| t.is_failed())
                .map(|t| t.source_table.clone())
                .collect(),
            tables,
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::SqlValue;
    use crate::transfer::{SkipKind, SkipReason};

    fn copied(name: &str, attempted: u64, inserted: u64) -> TableReport {
        let mut report = TableReport::new(name, name);
        report.creation = Some(CreationOutcome::Created);
        report.record_copy(CopyOutcome {
            attempted,
            inserted,
            skipped: (inserted..attempted)
                .map(|i| SkippedRow {
                    row: vec![SqlValue::I64(i as i64)],
                    reason: SkipReason {
                        kind: SkipKind::ConstraintViolation,
                        message: "duplicate key".into(),
                    },
                })
                .collect(),
            read_error: None,
        });
        report
    }

    #[test]
    fn test_totals_and_failed_tables() {
        let mut broken = TableReport::new("ghost", "ghost");
        broken.error = Some("Schema error for table ghost: missing".into());

        let report = MigrationReport::finish(
            "run".into(),
            RunStatus::Completed,
            Utc::now(),
            3,
            vec![copied("users", 3, 2), copied("orders", 5, 5), broken],
        );
        assert_eq!(report.rows_attempted, 8);
        assert_eq!(report.rows_inserted, 7);
        assert_eq!(report.rows_skipped, 1);
        assert_eq!(report.failed_tables, vec!["ghost"]);
    }

    #[test]
    fn test_to_json() {
        let report = MigrationReport::finish(
            "run-1".into(),
            RunStatus::Cancelled,
            Utc::now(),
            2,
            vec![copied("users", 2, 1)],
        );
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["status"], "cancelled");
        assert_eq!(json["tables"][0]["creation"]["outcome"], "created");
        assert_eq!(json["tables"][0]["rows_skipped"][0]["row"][0], "1");
        assert_eq!(
            json["tables"][0]["rows_skipped"][0]["reason"]["kind"],
            "constraint_violation"
        );
        assert!(json["tables"][0].get("error").is_none());
    }
}
