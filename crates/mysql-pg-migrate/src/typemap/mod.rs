//! Type mapping between MySQL and PostgreSQL.
//!
//! Mapping is a case-insensitive substring search over an ordered rule table.
//! Rules are grouped into families that are always tried in the same order:
//!
//! 1. integer
//! 2. text
//! 3. timestamp
//! 4. date
//! 5. decimal
//!
//! Timestamp is tried before date so that `DATETIME` does not stop at the
//! `DATE` rule. Inside a family rules keep their declared order and the first
//! match wins. Anything unmatched gets the fallback type.
//!
//! The search covers the whole signature, enum and set literals included, so
//! `enum('print','x')` contains `INT` and maps to `INTEGER`. Add a rule ahead
//! of the built-ins to override such columns.

use serde::{Deserialize, Serialize};

use crate::core::schema::{ColumnDeclaration, ColumnDescriptor};
use crate::error::{MigrateError, Result};

/// Type used when nothing else applies.
pub const DEFAULT_FALLBACK: &str = "TEXT";

/// A single mapping rule.
///
/// `parameterized` rules copy the bracketed arguments of the source signature
/// onto the target type (`varchar(50)` → `VARCHAR(50)`). When the arguments
/// cannot be parsed the bare target type is emitted instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeRule {
    Integer {
        pattern: String,
        target: String,
        /// Only match signatures carrying the `unsigned` modifier.
        #[serde(default)]
        unsigned: bool,
    },
    Text {
        pattern: String,
        target: String,
        #[serde(default)]
        parameterized: bool,
    },
    Date {
        pattern: String,
        target: String,
    },
    Timestamp {
        pattern: String,
        target: String,
    },
    Decimal {
        pattern: String,
        target: String,
        #[serde(default)]
        parameterized: bool,
    },
    Fallback {
        target: String,
    },
}

impl TypeRule {
    pub fn integer(pattern: impl Into<String>, target: impl Into<String>) -> Self {
        TypeRule::Integer {
            pattern: pattern.into(),
            target: target.into(),
            unsigned: false,
        }
    }

    /// Integer rule limited to `unsigned` columns.
    pub fn integer_unsigned(pattern: impl Into<String>, target: impl Into<String>) -> Self {
        TypeRule::Integer {
            pattern: pattern.into(),
            target: target.into(),
            unsigned: true,
        }
    }

    pub fn text(pattern: impl Into<String>, target: impl Into<String>) -> Self {
        TypeRule::Text {
            pattern: pattern.into(),
            target: target.into(),
            parameterized: false,
        }
    }

    /// Text rule that carries the source length over.
    pub fn text_with_length(pattern: impl Into<String>, target: impl Into<String>) -> Self {
        TypeRule::Text {
            pattern: pattern.into(),
            target: target.into(),
            parameterized: true,
        }
    }

    pub fn date(pattern: impl Into<String>, target: impl Into<String>) -> Self {
        TypeRule::Date {
            pattern: pattern.into(),
            target: target.into(),
        }
    }

    pub fn timestamp(pattern: impl Into<String>, target: impl Into<String>) -> Self {
        TypeRule::Timestamp {
            pattern: pattern.into(),
            target: target.into(),
        }
    }

    /// Decimal rule that carries precision and scale over.
    pub fn decimal(pattern: impl Into<String>, target: impl Into<String>) -> Self {
        TypeRule::Decimal {
            pattern: pattern.into(),
            target: target.into(),
            parameterized: true,
        }
    }

    /// Evaluation rank of the rule's family. Fallback rules never match.
    fn family_rank(&self) -> u8 {
        match self {
            TypeRule::Integer { .. } => 0,
            TypeRule::Text { .. } => 1,
            TypeRule::Timestamp { .. } => 2,
            TypeRule::Date { .. } => 3,
            TypeRule::Decimal { .. } => 4,
            TypeRule::Fallback { .. } => u8::MAX,
        }
    }

    fn pattern(&self) -> Option<&str> {
        match self {
            TypeRule::Integer { pattern, .. }
            | TypeRule::Text { pattern, .. }
            | TypeRule::Date { pattern, .. }
            | TypeRule::Timestamp { pattern, .. }
            | TypeRule::Decimal { pattern, .. } => Some(pattern),
            TypeRule::Fallback { .. } => None,
        }
    }

    fn target(&self) -> &str {
        match self {
            TypeRule::Integer { target, .. }
            | TypeRule::Text { target, .. }
            | TypeRule::Date { target, .. }
            | TypeRule::Timestamp { target, .. }
            | TypeRule::Decimal { target, .. }
            | TypeRule::Fallback { target } => target,
        }
    }

    fn is_parameterized(&self) -> bool {
        matches!(
            self,
            TypeRule::Text { parameterized: true, .. } | TypeRule::Decimal { parameterized: true, .. }
        )
    }

    /// Check that a configured rule can ever produce a declaration.
    pub fn validate(&self) -> Result<()> {
        if self.pattern().is_some_and(|p| p.trim().is_empty()) {
            return Err(MigrateError::Config(format!(
                "type rule {:?} has an empty pattern",
                self
            )));
        }
        if self.target().trim().is_empty() {
            return Err(MigrateError::Config(format!(
                "type rule {:?} has an empty target",
                self
            )));
        }
        Ok(())
    }

    /// Target declaration if this rule matches the upper-cased signature.
    fn apply(&self, signature: &str) -> Option<String> {
        let pattern = self.pattern()?.trim().to_uppercase();
        if pattern.is_empty() || !signature.contains(&pattern) {
            return None;
        }
        if matches!(self, TypeRule::Integer { unsigned: true, .. }) && !signature.contains("UNSIGNED")
        {
            return None;
        }

        let target = self.target().trim();
        if self.is_parameterized() {
            if let Some(args) = bracket_args(signature) {
                return Some(format!("{}({})", target, args));
            }
        }
        Some(target.to_string())
    }
}

/// Parse the bracketed argument list of a type signature.
///
/// Accepts comma-separated unsigned integers only: `varchar(50)` → `50`,
/// `decimal(10, 2)` → `10,2`. Returns `None` for anything malformed.
fn bracket_args(signature: &str) -> Option<String> {
    let open = signature.find('(')?;
    let close = open + signature[open..].find(')')?;
    let args: Vec<&str> = signature[open + 1..close].split(',').map(str::trim).collect();

    let all_numeric = args
        .iter()
        .all(|a| !a.is_empty() && a.chars().all(|c| c.is_ascii_digit()));
    if !all_numeric {
        return None;
    }
    Some(args.join(","))
}

/// The ordered rule table plus its fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRules {
    rules: Vec<TypeRule>,
    fallback: String,
}

impl Default for TypeRules {
    fn default() -> Self {
        Self::new(default_rules(), DEFAULT_FALLBACK)
    }
}

impl TypeRules {
    /// Build a rule table, ordering rules by family.
    ///
    /// The sort is stable, so rules of one family keep their relative order.
    /// `Fallback` entries are not matched; the last one replaces `fallback`.
    /// Rules with an empty pattern or target are dropped.
    pub fn new(rules: Vec<TypeRule>, fallback: impl Into<String>) -> Self {
        let mut fallback = fallback.into();
        let mut ordered = Vec::with_capacity(rules.len());
        for rule in rules {
            match rule {
                TypeRule::Fallback { target } => fallback = target,
                other if other.validate().is_ok() => ordered.push(other),
                _ => {}
            }
        }
        ordered.sort_by_key(TypeRule::family_rank);

        let fallback = fallback.trim().to_string();
        Self {
            rules: ordered,
            fallback: if fallback.is_empty() {
                DEFAULT_FALLBACK.to_string()
            } else {
                fallback
            },
        }
    }

    /// Built-in rules extended by `extra`.
    ///
    /// Extra rules are placed ahead of the built-ins of their family. An
    /// explicit `fallback` wins over any `Fallback` rule in `extra`.
    pub fn with_rules(extra: Vec<TypeRule>, fallback: Option<String>) -> Self {
        let mut rules = extra;
        rules.extend(default_rules());
        let mut table = Self::new(rules, DEFAULT_FALLBACK);
        if let Some(fallback) = fallback.map(|f| f.trim().to_string()) {
            if !fallback.is_empty() {
                table.fallback = fallback;
            }
        }
        table
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[TypeRule] {
        &self.rules
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Map a source type signature to a target type declaration.
    ///
    /// Deterministic and total: every input yields a non-empty type.
    pub fn map_type(&self, signature: &str) -> String {
        let upper = signature.trim().to_uppercase();
        self.rules
            .iter()
            .find_map(|rule| rule.apply(&upper))
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Map a described column to its target declaration.
    pub fn map_column(&self, column: &ColumnDescriptor) -> ColumnDeclaration {
        ColumnDeclaration::new(&column.name, self.map_type(&column.type_signature))
    }
}

/// Built-in MySQL → PostgreSQL rules.
pub fn default_rules() -> Vec<TypeRule> {
    vec![
        // Unsigned columns get a type wide enough for their upper half.
        TypeRule::integer_unsigned("TINYINT", "INTEGER"),
        TypeRule::integer_unsigned("SMALLINT", "INTEGER"),
        TypeRule::integer_unsigned("MEDIUMINT", "INTEGER"),
        TypeRule::integer_unsigned("BIGINT", "NUMERIC(20)"),
        TypeRule::integer_unsigned("INT", "BIGINT"),
        TypeRule::integer("BIGINT", "BIGINT"),
        TypeRule::integer("INT", "INTEGER"),
        TypeRule::text_with_length("VARCHAR", "VARCHAR"),
        TypeRule::text_with_length("CHAR", "CHAR"),
        TypeRule::text("TEXT", "TEXT"),
        TypeRule::timestamp("DATETIME", "TIMESTAMP"),
        TypeRule::timestamp("TIMESTAMP", "TIMESTAMP"),
        TypeRule::date("DATE", "DATE"),
        TypeRule::decimal("DECIMAL", "NUMERIC"),
        TypeRule::decimal("NUMERIC", "NUMERIC"),
    ]
}
