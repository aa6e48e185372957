//! Identifier validation and quoting.
//!
//! Table and column names cannot be bound as statement parameters, so every
//! name that ends up in generated SQL is validated and then quoted with the
//! dialect's quoting rules.

use crate::error::{MigrateError, Result};

/// Maximum identifier length accepted from configuration.
/// - PostgreSQL: 63 bytes (longer names are truncated by the server)
/// - MySQL: 64 characters
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Validate an identifier supplied by configuration.
///
/// Rejects empty names, names containing null bytes, and names longer than
/// PostgreSQL keeps.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(MigrateError::Config(
            "Identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Config(format!(
            "Identifier contains null byte: {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Config(format!(
            "Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote a PostgreSQL identifier, doubling embedded double quotes.
pub fn quote_pg(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a MySQL identifier with backticks, doubling embedded backticks.
pub fn quote_mysql(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}
