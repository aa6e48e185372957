//! Schema metadata types shared by the inspector, type mapper and creator.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A source column as reported by the schema inspector.
///
/// Column order in a `Vec<ColumnDescriptor>` is the declared order of the
/// source table; inserts bind values positionally in that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name.
    pub name: String,

    /// Full source type signature, e.g. `varchar(255)` or `int unsigned`.
    pub type_signature: String,

    /// 1-based declared position.
    pub ordinal: u32,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, type_signature: impl Into<String>, ordinal: u32) -> Self {
        Self {
            name: name.into(),
            type_signature: type_signature.into(),
            ordinal,
        }
    }

    /// Lower-cased type name without arguments or modifiers.
    ///
    /// `decimal(10,2) unsigned` → `decimal`.
    pub fn base_type(&self) -> String {
        self.type_signature
            .trim()
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default()
            .to_lowercase()
    }

    /// Whether the signature carries the MySQL `unsigned` modifier.
    pub fn is_unsigned(&self) -> bool {
        self.type_signature.to_lowercase().contains("unsigned")
    }
}

/// A target column declaration produced by the type mapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDeclaration {
    pub name: String,
    pub target_type: String,
}

impl ColumnDeclaration {
    pub fn new(name: impl Into<String>, target_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target_type: target_type.into(),
        }
    }
}

impl fmt::Display for ColumnDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.target_type)
    }
}

/// Source table name → target table name.
///
/// Tables without an entry keep their source name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableMapping(HashMap<String, String>);

impl TableMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rename, replacing any previous entry for `source`.
    pub fn insert(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.0.insert(source.into(), target.into());
    }

    /// Resolve the target name for a source table.
    pub fn resolve<'a>(&'a self, source: &'a str) -> &'a str {
        self.0.get(source).map(String::as_str).unwrap_or(source)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TableMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_type() {
        assert_eq!(ColumnDescriptor::new("a", "varchar(255)", 1).base_type(), "varchar");
        assert_eq!(ColumnDescriptor::new("a", "INT unsigned", 1).base_type(), "int");
        assert_eq!(ColumnDescriptor::new("a", "datetime", 1).base_type(), "datetime");
        assert_eq!(
            ColumnDescriptor::new("a", "enum('a','b')", 1).base_type(),
            "enum"
        );
    }

    #[test]
    fn test_is_unsigned() {
        assert!(ColumnDescriptor::new("a", "int(10) unsigned", 1).is_unsigned());
        assert!(!ColumnDescriptor::new("a", "int(11)", 1).is_unsigned());
    }

    #[test]
    fn test_declaration_display() {
        assert_eq!(ColumnDeclaration::new("id", "INTEGER").to_string(), "id INTEGER");
    }

    #[test]
    fn test_mapping_defaults_to_identity() {
        let mapping: TableMapping = [("old_table_name", "new_table_name")].into_iter().collect();
        assert_eq!(mapping.resolve("old_table_name"), "new_table_name");
        assert_eq!(mapping.resolve("users"), "users");
        assert_eq!(TableMapping::new().resolve("users"), "users");
    }

    #[test]
    fn test_mapping_deserializes_from_yaml_map() {
        let mapping: TableMapping = serde_yaml::from_str("legacy_users: users\n").unwrap();
        assert_eq!(mapping.resolve("legacy_users"), "users");
    }
}
