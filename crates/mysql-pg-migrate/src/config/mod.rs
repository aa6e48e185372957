//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use crate::typemap::TypeRules;
use std::path::Path;

/// Default MySQL port.
pub const MYSQL_DEFAULT_PORT: u16 = 3306;

/// Default PostgreSQL port.
pub const PG_DEFAULT_PORT: u16 = 5432;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Type rules: built-in defaults extended by any configured rules.
    pub fn type_rules(&self) -> TypeRules {
        TypeRules::with_rules(
            self.migration.type_rules.clone(),
            self.migration.fallback_type.clone(),
        )
    }
}
