//! Target table creation.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::core::schema::ColumnDeclaration;
use crate::core::traits::{TargetSession, TargetWriter};
use crate::error::{MigrateError, Result};

/// Result of a `CREATE TABLE` attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreationOutcome {
    Created,
    /// The table was already there; rows are still copied into it.
    AlreadyExisted,
    /// Creation failed for another reason; no rows are attempted.
    Failed { reason: String },
}

impl CreationOutcome {
    /// Whether rows should be copied after this outcome.
    pub fn allows_copy(&self) -> bool {
        !matches!(self, CreationOutcome::Failed { .. })
    }
}

/// Creates target tables, each in its own unit of work.
pub struct TableCreator<'a> {
    target: &'a dyn TargetWriter,
}

impl<'a> TableCreator<'a> {
    pub fn new(target: &'a dyn TargetWriter) -> Self {
        Self { target }
    }

    /// The `CREATE TABLE` statement for `table` in the target schema.
    pub fn create_statement(&self, table: &str, columns: &[ColumnDeclaration]) -> String {
        self.target
            .dialect()
            .build_create_table(self.target.schema(), table, columns)
    }

    /// Create `table` and commit.
    ///
    /// Only connection-level errors are returned; everything else becomes a
    /// [`CreationOutcome`].
    pub async fn create_table(
        &self,
        table: &str,
        columns: &[ColumnDeclaration],
    ) -> Result<CreationOutcome> {
        let statement = self.create_statement(table, columns);
        debug!("{}", statement);

        let result = match self.target.session().await {
            Ok(mut session) => run_ddl(session.as_mut(), &statement).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                info!("Created table {}.{}", self.target.schema(), table);
                Ok(CreationOutcome::Created)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(MigrateError::DuplicateTable(_)) => {
                info!(
                    "Table {}.{} already exists, copying into it",
                    self.target.schema(),
                    table
                );
                Ok(CreationOutcome::AlreadyExisted)
            }
            Err(e) => {
                warn!("Failed to create table {}: {}", table, e);
                Ok(CreationOutcome::Failed {
                    reason: e.to_string(),
                })
            }
        }
    }
}

async fn run_ddl(session: &mut dyn TargetSession, statement: &str) -> Result<()> {
    session.begin().await?;
    let result = match session.execute(statement, &[]).await {
        Ok(_) => session.commit().await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        if let Err(rollback_err) = session.rollback().await {
            if rollback_err.is_fatal() {
                return Err(rollback_err);
            }
        }
        return Err(e);
    }
    Ok(())
}
