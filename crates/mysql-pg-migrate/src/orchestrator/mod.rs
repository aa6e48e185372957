//! Migration orchestrator - main workflow coordinator.

mod report;

pub use report::{MigrationReport, RunStatus, TableReport};

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::core::catalog::{Connector, DriverCatalog};
use crate::core::schema::ColumnDeclaration;
use crate::core::traits::{SourceReader, TargetWriter};
use crate::creator::TableCreator;
use crate::error::Result;
use crate::inspector::{SchemaInspector, TableFilter};
use crate::transfer::RowCopier;
use crate::typemap::TypeRules;

/// Migration orchestrator.
///
/// Owns both endpoints for the duration of [`Orchestrator::run`] and closes
/// them on every exit path.
pub struct Orchestrator {
    config: Config,
    connector: Arc<dyn Connector>,
    type_rules: TypeRules,
}

/// Result of a connectivity check.
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub source_connected: bool,
    pub source_tables: usize,
    pub target_connected: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl Orchestrator {
    /// Create an orchestrator using the built-in MySQL and PostgreSQL drivers.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::with_connector(config, Arc::new(DriverCatalog::new())))
    }

    /// Create an orchestrator that opens its endpoints through `connector`.
    pub fn with_connector(config: Config, connector: Arc<dyn Connector>) -> Self {
        let type_rules = config.type_rules();
        Self {
            config,
            connector,
            type_rules,
        }
    }

    /// Open both endpoints, migrate, and close both.
    ///
    /// Returns `Err` only when the run aborts (connection failure, failure to
    /// list source tables). A cancelled run still returns its report.
    pub async fn run(&self, cancel: CancellationToken) -> Result<MigrationReport> {
        let source = self.connector.open_source(&self.config).await?;
        let target = match self.connector.open_target(&self.config).await {
            Ok(target) => target,
            Err(e) => {
                source.close().await;
                return Err(e);
            }
        };

        let result = self.migrate(source.as_ref(), target.as_ref(), &cancel).await;

        source.close().await;
        target.close().await;
        result
    }

    /// Migrate every selected table from `source` to `target`.
    ///
    /// Tables are processed `migration.workers` at a time; the report keeps
    /// source table order. Cancellation is checked before each table starts.
    pub async fn migrate(
        &self,
        source: &dyn SourceReader,
        target: &dyn TargetWriter,
        cancel: &CancellationToken,
    ) -> Result<MigrationReport> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!("Starting migration run: {}", run_id);

        let migration = &self.config.migration;
        let filter = TableFilter::new(&migration.include_tables, &migration.exclude_tables)?;
        let inspector = SchemaInspector::new(source, filter, migration.statement_timeout());

        let tables = inspector.list_tables().await?;
        info!("Found {} tables to migrate", tables.len());

        let workers = migration.workers.max(1);
        let mut pending = stream::iter(
            tables
                .iter()
                .map(|table| self.migrate_table(&inspector, source, target, table, cancel)),
        )
        .buffered(workers);

        let mut reports = Vec::with_capacity(tables.len());
        while let Some(result) = pending.next().await {
            if let Some(report) = result? {
                reports.push(report);
            }
        }

        let status = if reports.len() < tables.len() {
            info!(
                "Migration cancelled after {} of {} tables",
                reports.len(),
                tables.len()
            );
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };

        let report = MigrationReport::finish(run_id, status, started_at, tables.len(), reports);
        info!(
            "Migration {:?}: {} rows inserted, {} skipped, {} failed tables in {:.1}s",
            report.status,
            report.rows_inserted,
            report.rows_skipped,
            report.failed_tables.len(),
            report.duration_seconds
        );
        Ok(report)
    }

    /// Describe, map, create and copy one table.
    ///
    /// `Ok(None)` means the run was cancelled before this table started.
    async fn migrate_table(
        &self,
        inspector: &SchemaInspector<'_>,
        source: &dyn SourceReader,
        target: &dyn TargetWriter,
        table: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<TableReport>> {
        if cancel.is_cancelled() {
            return Ok(None);
        }

        let start = Instant::now();
        let target_table = self.config.migration.table_mapping.resolve(table).to_string();
        let mut report = TableReport::new(table, &target_table);
        info!("{} -> {}.{}", table, target.schema(), target_table);

        let columns = match inspector.describe_columns(table).await {
            Ok(columns) => columns,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!("Skipping table {}: {}", table, e);
                report.error = Some(e.to_string());
                report.duration_seconds = start.elapsed().as_secs_f64();
                return Ok(Some(report));
            }
        };

        let declarations: Vec<ColumnDeclaration> = columns
            .iter()
            .map(|c| self.type_rules.map_column(c))
            .collect();

        let creator = TableCreator::new(target);
        report.create_statement = Some(creator.create_statement(&target_table, &declarations));
        let creation = creator.create_table(&target_table, &declarations).await?;
        report.columns = declarations;

        if creation.allows_copy() {
            let copier = RowCopier::new(source, target, self.config.migration.read_batch_size);
            let outcome = copier.copy_rows(table, &target_table, &columns).await?;
            report.record_copy(outcome);
        }
        report.creation = Some(creation);

        report.duration_seconds = start.elapsed().as_secs_f64();
        Ok(Some(report))
    }

    /// Open both endpoints, list the source tables, and open one target session.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let mut result = HealthCheckResult {
            healthy: false,
            source_connected: false,
            source_tables: 0,
            target_connected: false,
            errors: Vec::new(),
        };

        match self.connector.open_source(&self.config).await {
            Ok(source) => {
                result.source_connected = true;
                match source.list_tables().await {
                    Ok(tables) => result.source_tables = tables.len(),
                    Err(e) => result.errors.push(format!("source: {}", e)),
                }
                source.close().await;
            }
            Err(e) => result.errors.push(format!("source: {}", e)),
        }

        match self.connector.open_target(&self.config).await {
            Ok(target) => {
                match target.session().await {
                    Ok(_) => result.target_connected = true,
                    Err(e) => result.errors.push(format!("target: {}", e)),
                }
                target.close().await;
            }
            Err(e) => result.errors.push(format!("target: {}", e)),
        }

        result.healthy = result.source_connected && result.target_connected && result.errors.is_empty();
        Ok(result)
    }
}
