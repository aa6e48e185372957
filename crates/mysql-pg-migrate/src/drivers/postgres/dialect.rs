//! PostgreSQL SQL dialect.

use crate::core::identifier::quote_pg;
use crate::core::traits::Dialect;

#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_ident(&self, name: &str) -> String {
        quote_pg(name)
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::ColumnDeclaration;

    #[test]
    fn test_quote_ident() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.quote_ident("users"), "\"users\"");
        assert_eq!(dialect.quote_ident("my\"table"), "\"my\"\"table\"");
    }

    #[test]
    fn test_param_placeholder() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.param_placeholder(1), "$1");
        assert_eq!(dialect.param_placeholder(12), "$12");
    }

    #[test]
    fn test_build_create_table() {
        let dialect = PostgresDialect::new();
        let columns = vec![
            ColumnDeclaration::new("id", "INTEGER"),
            ColumnDeclaration::new("name", "VARCHAR(50)"),
        ];
        assert_eq!(
            dialect.build_create_table("public", "users", &columns),
            "CREATE TABLE \"public\".\"users\" (\"id\" INTEGER, \"name\" VARCHAR(50))"
        );
    }

    #[test]
    fn test_build_insert() {
        let dialect = PostgresDialect::new();
        let sql = dialect.build_insert("public", "users", &["id".into(), "name".into()]);
        assert_eq!(
            sql,
            "INSERT INTO \"public\".\"users\" (\"id\", \"name\") VALUES ($1, $2)"
        );
    }

    #[test]
    fn test_unqualified_when_schema_empty() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.qualify("", "users"), "\"users\"");
    }
}
