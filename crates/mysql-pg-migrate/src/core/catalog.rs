//! Driver catalog for explicit dependency injection.
//!
//! The orchestrator never constructs drivers itself; it asks a [`Connector`]
//! for the two endpoints. [`DriverCatalog`] is the production connector,
//! tests hand the orchestrator in-memory endpoints instead.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::config::Config;
use crate::drivers::{MysqlReader, PostgresWriter};
use crate::error::Result;

use super::traits::{SourceReader, TargetWriter};

/// Opens the source and target endpoints of a run.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open_source(&self, config: &Config) -> Result<Arc<dyn SourceReader>>;

    async fn open_target(&self, config: &Config) -> Result<Arc<dyn TargetWriter>>;
}

/// Built-in drivers: MySQL/MariaDB source, PostgreSQL target.
#[derive(Debug, Default, Clone)]
pub struct DriverCatalog;

impl DriverCatalog {
    pub fn new() -> Self {
        Self
    }

    /// Connections per pool: one per worker plus one for metadata queries
    /// issued while a table is streaming.
    fn pool_size(config: &Config) -> usize {
        config.migration.workers + 1
    }
}

#[async_trait]
impl Connector for DriverCatalog {
    async fn open_source(&self, config: &Config) -> Result<Arc<dyn SourceReader>> {
        let size = Self::pool_size(config);
        debug!("Opening MySQL source pool ({} connections)", size);
        let reader =
            MysqlReader::new(&config.source, size, config.migration.statement_timeout()).await?;
        Ok(Arc::new(reader))
    }

    async fn open_target(&self, config: &Config) -> Result<Arc<dyn TargetWriter>> {
        let size = Self::pool_size(config);
        debug!("Opening PostgreSQL target pool ({} connections)", size);
        let writer = PostgresWriter::new(
            &config.target,
            &config.migration.target_schema,
            size,
            config.migration.statement_timeout(),
        )
        .await?;
        Ok(Arc::new(writer))
    }
}
