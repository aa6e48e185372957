//! PostgreSQL target driver.
//!
//! - [`PostgresDialect`]: double-quote identifiers and `$n` placeholders
//! - [`PostgresWriter`]: pooled target with per-table sessions

mod dialect;
mod writer;

pub use dialect::PostgresDialect;
pub use writer::PostgresWriter;
