//! Database drivers.
//!
//! - [`mysql`]: MySQL/MariaDB source reader and dialect
//! - [`postgres`]: PostgreSQL target writer and dialect
//! - [`common`]: TLS settings shared by both

pub mod common;
pub mod mysql;
pub mod postgres;

pub use common::{SslMode, TlsBuilder};
pub use mysql::{MysqlDialect, MysqlReader};
pub use postgres::{PostgresDialect, PostgresWriter};
