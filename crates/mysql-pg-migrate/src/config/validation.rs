//! Configuration validation.

use super::{Config, ConnectionConfig, MYSQL_DEFAULT_PORT, PG_DEFAULT_PORT};
use crate::core::identifier::validate_identifier;
use crate::drivers::SslMode;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    validate_endpoint("source", &config.source)?;
    validate_endpoint("target", &config.target)?;

    // Cannot migrate to the same database
    if config.source.host == config.target.host
        && config.source.port_or(MYSQL_DEFAULT_PORT) == config.target.port_or(PG_DEFAULT_PORT)
        && config.source.database == config.target.database
    {
        return Err(MigrateError::Config(
            "source and target cannot be the same database".into(),
        ));
    }

    let migration = &config.migration;
    if migration.workers == 0 {
        return Err(MigrateError::Config(
            "migration.workers must be at least 1".into(),
        ));
    }
    if migration.read_batch_size == 0 {
        return Err(MigrateError::Config(
            "migration.read_batch_size must be at least 1".into(),
        ));
    }
    if migration.statement_timeout_secs == 0 {
        return Err(MigrateError::Config(
            "migration.statement_timeout_secs must be at least 1".into(),
        ));
    }
    validate_identifier(&migration.target_schema)
        .map_err(|e| MigrateError::Config(format!("migration.target_schema: {}", e)))?;

    for (source, target) in migration.table_mapping.iter() {
        validate_identifier(source)
            .and_then(|_| validate_identifier(target))
            .map_err(|e| {
                MigrateError::Config(format!(
                    "migration.table_mapping entry '{}' -> '{}': {}",
                    source, target, e
                ))
            })?;
    }

    for rule in &migration.type_rules {
        rule.validate()?;
    }

    Ok(())
}

fn validate_endpoint(name: &str, endpoint: &ConnectionConfig) -> Result<()> {
    if endpoint.host.is_empty() {
        return Err(MigrateError::Config(format!("{}.host is required", name)));
    }
    if endpoint.database.is_empty() {
        return Err(MigrateError::Config(format!("{}.database is required", name)));
    }
    if endpoint.user.is_empty() {
        return Err(MigrateError::Config(format!("{}.user is required", name)));
    }
    SslMode::parse(&endpoint.ssl_mode)
        .map_err(|e| MigrateError::Config(format!("{}.ssl_mode: {}", name, e)))?;
    Ok(())
}
