//! MySQL/MariaDB SQL dialect.

use crate::core::identifier::quote_mysql;
use crate::core::traits::Dialect;

/// Compatible with MySQL 5.7+, 8.0+ and MariaDB 10.2+.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_mysql(name)
    }

    fn param_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }
}
