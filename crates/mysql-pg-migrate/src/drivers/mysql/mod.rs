//! MySQL/MariaDB source driver.
//!
//! - [`MysqlDialect`]: backtick quoting and `?` placeholders
//! - [`MysqlReader`]: lists, describes and streams source tables over sqlx
//!
//! Supported servers: MySQL 5.7+, 8.0+ and MariaDB 10.2+.

mod dialect;
mod reader;

pub use dialect::MysqlDialect;
pub use reader::MysqlReader;
