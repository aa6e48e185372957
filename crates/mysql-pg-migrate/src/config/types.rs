//! Configuration type definitions.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::schema::TableMapping;
use crate::typemap::TypeRule;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database (MySQL/MariaDB).
    pub source: ConnectionConfig,

    /// Target database (PostgreSQL).
    pub target: ConnectionConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// Connection parameters for one endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Database host.
    pub host: String,

    /// Database port. Defaults to 3306 for the source and 5432 for the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password. Never serialized.
    #[serde(default, skip_serializing)]
    pub password: String,

    /// TLS mode: disable, require, verify-ca, verify-full (default: disable).
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
}

impl ConnectionConfig {
    /// Effective port, falling back to the engine default.
    pub fn port_or(&self, default: u16) -> u16 {
        self.port.unwrap_or(default)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Source table → target table renames. Unlisted tables keep their name.
    #[serde(default)]
    pub table_mapping: TableMapping,

    /// Tables to include (`*` and `?` wildcards). Empty means all tables.
    #[serde(default)]
    pub include_tables: Vec<String>,

    /// Tables to exclude (`*` and `?` wildcards). Exclusion wins.
    #[serde(default)]
    pub exclude_tables: Vec<String>,

    /// Tables processed concurrently (default: 1, sequential).
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Rows per batch read from the source (default: 1000).
    #[serde(default = "default_read_batch_size")]
    pub read_batch_size: usize,

    /// Upper bound for any single database call, in seconds (default: 30).
    #[serde(default = "default_statement_timeout_secs")]
    pub statement_timeout_secs: u64,

    /// Schema target tables are created in (default: public).
    #[serde(default = "default_target_schema")]
    pub target_schema: String,

    /// Extra type rules, evaluated before the built-in rules of the same family.
    #[serde(default)]
    pub type_rules: Vec<TypeRule>,

    /// Type used when no rule matches (default: TEXT).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_type: Option<String>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            table_mapping: TableMapping::default(),
            include_tables: Vec::new(),
            exclude_tables: Vec::new(),
            workers: default_workers(),
            read_batch_size: default_read_batch_size(),
            statement_timeout_secs: default_statement_timeout_secs(),
            target_schema: default_target_schema(),
            type_rules: Vec::new(),
            fallback_type: None,
        }
    }
}

impl MigrationConfig {
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_secs(self.statement_timeout_secs)
    }
}

// Default value functions for serde
fn default_ssl_mode() -> String {
    "disable".to_string()
}

fn default_workers() -> usize {
    1
}

fn default_read_batch_size() -> usize {
    1_000
}

fn default_statement_timeout_secs() -> u64 {
    30
}

fn default_target_schema() -> String {
    "public".to_string()
}
