//! Row copy with per-row failure isolation.
//!
//! Rows are streamed from the source through a bounded channel and inserted
//! one at a time, each in its own unit of work. A failing row is rolled back
//! and recorded; the copy moves on to the next row. Only connection-level
//! errors stop a copy.

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::schema::ColumnDescriptor;
use crate::core::traits::{SourceReader, TargetSession, TargetWriter};
use crate::core::value::Row;
use crate::error::{MigrateError, Result};

/// Why a row was not inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipKind {
    /// Unique, foreign key, not-null or check violation.
    ConstraintViolation,
    /// Any other insert-time or decode failure.
    InsertError,
    /// The insert did not finish within the statement timeout.
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkipReason {
    pub kind: SkipKind,
    pub message: String,
}

impl SkipReason {
    pub fn from_error(err: &MigrateError) -> Self {
        let kind = match err {
            MigrateError::ConstraintViolation { .. } => SkipKind::ConstraintViolation,
            MigrateError::Timeout { .. } => SkipKind::Timeout,
            _ => SkipKind::InsertError,
        };
        let message = match err {
            MigrateError::ConstraintViolation { message, .. }
            | MigrateError::Query { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self { kind, message }
    }
}

/// A row that was not inserted, with its values in column order.
///
/// `row` is empty when the source could not decode the row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRow {
    pub row: Row,
    pub reason: SkipReason,
}

/// Result of copying one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CopyOutcome {
    pub attempted: u64,
    pub inserted: u64,
    pub skipped: Vec<SkippedRow>,
    /// Set when the copy stopped early: the source could not be read to the
    /// end, or no target session could be obtained.
    pub read_error: Option<String>,
}

impl CopyOutcome {
    fn skip(&mut self, row: Row, reason: SkipReason) {
        self.skipped.push(SkippedRow { row, reason });
    }
}

/// Copies rows from a source table into a target table.
pub struct RowCopier<'a> {
    source: &'a dyn SourceReader,
    target: &'a dyn TargetWriter,
    batch_size: usize,
}

impl<'a> RowCopier<'a> {
    pub fn new(source: &'a dyn SourceReader, target: &'a dyn TargetWriter, batch_size: usize) -> Self {
        Self {
            source,
            target,
            batch_size,
        }
    }

    /// Copy every row of `source_table` into `target_table`.
    ///
    /// Values are bound positionally in the order of `columns`. The copy
    /// runs on a session of its own.
    pub async fn copy_rows(
        &self,
        source_table: &str,
        target_table: &str,
        columns: &[ColumnDescriptor],
    ) -> Result<CopyOutcome> {
        let start = Instant::now();
        let names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();
        let insert = self
            .target
            .dialect()
            .build_insert(self.target.schema(), target_table, &names);
        debug!("{}", insert);

        let mut outcome = CopyOutcome::default();
        let mut session = match self.target.session().await {
            Ok(session) => session,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("No target session for {}: {}", target_table, e);
                outcome.read_error = Some(e.to_string());
                return Ok(outcome);
            }
        };
        let mut rx = self.source.read_rows(source_table, columns, self.batch_size);

        while let Some(item) = rx.recv().await {
            match item {
                Ok(batch) => {
                    for row in batch.rows {
                        self.copy_row(session.as_mut(), &insert, row, &mut outcome)
                            .await?;
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e @ MigrateError::Decode { .. }) => {
                    outcome.attempted += 1;
                    debug!("Skipping undecodable row in {}: {}", source_table, e);
                    outcome.skip(Vec::new(), SkipReason::from_error(&e));
                }
                Err(e) => {
                    warn!("Reading {} stopped early: {}", source_table, e);
                    outcome.read_error = Some(e.to_string());
                    break;
                }
            }
        }

        info!(
            "{} -> {}: {} inserted, {} skipped of {} rows in {:.1}s",
            source_table,
            target_table,
            outcome.inserted,
            outcome.skipped.len(),
            outcome.attempted,
            start.elapsed().as_secs_f64()
        );
        Ok(outcome)
    }

    async fn copy_row(
        &self,
        session: &mut dyn TargetSession,
        insert: &str,
        row: Row,
        outcome: &mut CopyOutcome,
    ) -> Result<()> {
        outcome.attempted += 1;
        match insert_row(session, insert, &row).await {
            Ok(()) => outcome.inserted += 1,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                debug!("Row skipped: {}", e);
                outcome.skip(row, SkipReason::from_error(&e));
            }
        }
        Ok(())
    }
}

/// `BEGIN`, insert, `COMMIT`; `ROLLBACK` when any step fails.
async fn insert_row(session: &mut dyn TargetSession, insert: &str, row: &Row) -> Result<()> {
    let result = match session.begin().await {
        Ok(()) => match session.execute(insert, row).await {
            Ok(_) => session.commit().await,
            Err(e) => Err(e),
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        if e.is_fatal() {
            return Err(e);
        }
        if let Err(rollback_err) = session.rollback().await {
            if rollback_err.is_fatal() {
                return Err(rollback_err);
            }
            warn!("Rollback failed: {}", rollback_err);
        }
        return Err(e);
    }
    Ok(())
}
