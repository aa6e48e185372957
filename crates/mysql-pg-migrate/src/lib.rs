//! # mysql-pg-migrate
//!
//! One-shot MySQL/MariaDB to PostgreSQL migration library.
//!
//! For every source table the engine:
//!
//! - **Inspects** the columns and their full type signatures
//! - **Maps** each type through an ordered rule table to a PostgreSQL type
//! - **Creates** the target table, tolerating tables that already exist
//! - **Copies** rows one unit of work at a time, recording rows that fail
//!   instead of aborting the table
//!
//! ## Example
//!
//! ```rust,no_run
//! use mysql_pg_migrate::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> mysql_pg_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config)?;
//!     let report = orchestrator.run(CancellationToken::new()).await?;
//!     println!("Inserted {} rows", report.rows_inserted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod creator;
pub mod drivers;
pub mod error;
pub mod inspector;
pub mod orchestrator;
pub mod transfer;
pub mod typemap;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{Config, ConnectionConfig, MigrationConfig};
pub use core::{Connector, DriverCatalog, TableMapping};
pub use creator::CreationOutcome;
pub use error::{MigrateError, Result};
pub use orchestrator::{HealthCheckResult, MigrationReport, Orchestrator, RunStatus, TableReport};
pub use transfer::{CopyOutcome, SkipKind, SkipReason, SkippedRow};
pub use typemap::{TypeRule, TypeRules};
