// src/codes/mapping.rs

use std::collections::HashMap;
use tracing::debug;

use super::catalog::resolve_code;
use crate::config::{Config, SuffixDefinition, VariableDefinition};
use crate::error::ConfigError;

/// Lowercase, with each whitespace run collapsed to `_`.
fn snake(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Readable column name for `variable_name` measured with `suffix`.
pub fn readable_name(variable_name: &str, suffix: &SuffixDefinition) -> String {
    if suffix.is_base_estimate() {
        snake(variable_name)
    } else {
        format!("{}_{}", snake(variable_name), snake(&suffix.mapping))
    }
}

/// Wire-level code → readable name, covering every year any chunk could request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    codes: HashMap<String, String>,
}

impl ColumnMapping {
    /// Walk identity columns, then every table, variable, override year and suffix.
    pub fn build(config: &Config) -> Result<Self, ConfigError> {
        let mut mapping = Self::default();

        for column in config.identity_columns() {
            mapping.insert(column.to_string(), column.to_lowercase());
        }

        for table in &config.tables {
            for variable in table.variables.values() {
                mapping.register_variable(variable, &config.suffixes)?;
            }
        }

        debug!(codes = mapping.len(), "built column mapping");
        Ok(mapping)
    }

    fn register_variable(
        &mut self,
        variable: &VariableDefinition,
        suffixes: &[SuffixDefinition],
    ) -> Result<(), ConfigError> {
        // historical codes first; the base code is registered last
        let years = variable.overrides.keys().copied().map(Some);
        for year in years.chain(std::iter::once(None)) {
            for suffix in suffixes {
                if let Some(code) = resolve_code(variable, &suffix.code, year)? {
                    self.insert(code, readable_name(&variable.name, suffix));
                }
            }
        }
        Ok(())
    }

    /// Last write wins on a colliding code.
    pub fn insert(&mut self, code: String, name: String) -> Option<String> {
        let previous = self.codes.insert(code.clone(), name);
        if let Some(prev) = &previous {
            if Some(prev) != self.codes.get(&code) {
                debug!(%code, replaced = %prev, "column code collision");
            }
        }
        previous
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.codes.get(code).map(String::as_str)
    }

    /// Mapped name, or `column` itself when the code is unknown.
    pub fn rename<'a>(&'a self, column: &'a str) -> &'a str {
        self.get(column).unwrap_or(column)
    }

    pub fn rename_all(&self, columns: &mut [String]) {
        for column in columns.iter_mut() {
            if let Some(name) = self.get(column) {
                *column = name.to_string();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

pub fn build_column_mapping(config: &Config) -> Result<ColumnMapping, ConfigError> {
    ColumnMapping::build(config)
}
