// src/config/mod.rs

pub mod types;

pub use types::{
    Constants, DefaultColumn, GeoLevel, SuffixDefinition, TableDefinition, VariableDefinition,
    YearOverride, YearRange,
};

use serde::Deserialize;
use std::{collections::HashSet, fs, path::Path};
use tracing::{debug, info};

use crate::codes::plan::per_variable_cap;
use crate::error::ConfigError;

/// The whole YAML document: what to request, for which geographies and years.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    pub default_columns: Vec<DefaultColumn>,
    pub suffixes: Vec<SuffixDefinition>,
    pub tables: Vec<TableDefinition>,
    pub geo_levels: Vec<GeoLevel>,
    pub constants: Constants,
}

impl Config {
    /// Read, parse and validate the YAML file at `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_yaml(&text)?;
        info!(
            path = %path.display(),
            tables = config.tables.len(),
            geo_levels = config.geo_levels.len(),
            "loaded config"
        );
        Ok(config)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(text)?;
        for table in &mut config.tables {
            for (name, variable) in table.variables.iter_mut() {
                variable.name = name.clone();
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Check every invariant the planner and mapper rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 1) suffixes
        if self.suffixes.is_empty() {
            return Err(ConfigError::NoSuffixes);
        }
        let base: Vec<String> = self
            .suffixes
            .iter()
            .filter(|s| s.is_base_estimate())
            .map(|s| s.code.clone())
            .collect();
        if base.len() > 1 {
            return Err(ConfigError::MultipleBaseSuffixes(base));
        }
        per_variable_cap(
            self.constants.column_cap,
            self.identity_count(),
            self.suffixes.len(),
        )?;

        // 2) identity columns must carry the join key
        let key = &self.constants.geo_id_column;
        if !self.identity_columns().any(|c| c == key) {
            return Err(ConfigError::MissingJoinKey(key.clone()));
        }

        // 3) tables and their variables
        let mut seen = HashSet::new();
        for table in &self.tables {
            if !seen.insert(table.name.as_str()) {
                return Err(ConfigError::DuplicateTable(table.name.clone()));
            }
            for variable in table.variables.values() {
                if variable.table.as_deref().map_or(true, str::is_empty) {
                    return Err(ConfigError::MissingTable {
                        variable: variable.name.clone(),
                        year: None,
                    });
                }
            }
            debug!(table = %table.name, variables = table.variables.len(), "table ok");
        }

        // 4) geographies
        if self.geo_levels.is_empty() {
            return Err(ConfigError::NoGeoLevels);
        }
        for geo in &self.geo_levels {
            let p = geo.for_parameter.trim();
            if p.is_empty() || p.contains(':') || p.contains('&') {
                return Err(ConfigError::InvalidGeoLevel(geo.for_parameter.clone()));
            }
        }

        // 5) constants
        let c = &self.constants;
        if !c.base_url_template.contains("{year}") {
            return Err(ConfigError::MissingYearPlaceholder(
                c.base_url_template.clone(),
            ));
        }
        let YearRange { start, end } = c.year_range;
        if start > end {
            return Err(ConfigError::InvalidYearRange {
                start,
                end,
                reason: "first year is after last year".into(),
            });
        }
        if start < c.min_year {
            return Err(ConfigError::InvalidYearRange {
                start,
                end,
                reason: format!("data is not available before {}", c.min_year),
            });
        }
        Ok(())
    }

    pub fn table(&self, name: &str) -> Result<&TableDefinition, ConfigError> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| ConfigError::UnknownTable(name.to_string()))
    }

    pub fn identity_columns(&self) -> impl Iterator<Item = &str> {
        self.default_columns.iter().map(|c| c.name.as_str())
    }

    pub fn identity_count(&self) -> usize {
        self.default_columns.len()
    }

    pub fn years(&self) -> impl Iterator<Item = u16> {
        self.constants.year_range.years()
    }
}
