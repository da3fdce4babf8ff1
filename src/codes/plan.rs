// src/codes/plan.rs

use std::ops::Range;
use tracing::debug;

use super::catalog::resolve_code;
use super::generate::expand_variables;
use crate::config::{Config, TableDefinition, VariableDefinition};
use crate::error::{ConfigError, PlanError};

/// How many logical variables fit in one request next to the identity columns.
pub fn per_variable_cap(
    column_cap: usize,
    identity_count: usize,
    suffix_count: usize,
) -> Result<usize, ConfigError> {
    let cap = match suffix_count {
        0 => return Err(ConfigError::NoSuffixes),
        n => column_cap.saturating_sub(identity_count) / n,
    };
    if cap == 0 {
        return Err(ConfigError::SuffixesExceedCap {
            suffixes: suffix_count,
            identity: identity_count,
            cap: column_cap,
        });
    }
    Ok(cap)
}

/// Half-open slice bounds of chunk `index`.
pub fn chunk_range(index: usize, per_chunk: usize, total: usize) -> Range<usize> {
    let start = (index * per_chunk).min(total);
    let end = ((index + 1) * per_chunk).min(total);
    start..end
}

/// Variables of `table` that produce at least one code in `year`, in declared order.
pub fn active_variables<'a>(
    config: &Config,
    table: &'a TableDefinition,
    year: Option<u16>,
) -> Result<Vec<&'a VariableDefinition>, ConfigError> {
    let mut active = Vec::with_capacity(table.variables.len());
    for variable in table.variables.values() {
        let mut present = false;
        for suffix in &config.suffixes {
            if resolve_code(variable, &suffix.code, year)?.is_some() {
                present = true;
                break;
            }
        }
        if present {
            active.push(variable);
        }
    }
    Ok(active)
}

/// The request plan for one table and year.
#[derive(Debug, Clone)]
pub struct ChunkPlan<'a> {
    config: &'a Config,
    table: &'a TableDefinition,
    year: Option<u16>,
    active: Vec<&'a VariableDefinition>,
    per_chunk: usize,
}

impl<'a> ChunkPlan<'a> {
    pub fn new(config: &'a Config, table_name: &str, year: Option<u16>) -> Result<Self, PlanError> {
        let table = config.table(table_name)?;
        let per_chunk = per_variable_cap(
            config.constants.column_cap,
            config.identity_count(),
            config.suffixes.len(),
        )?;
        let active = active_variables(config, table, year)?;
        debug!(
            table = %table.name,
            ?year,
            active = active.len(),
            declared = table.variables.len(),
            per_chunk,
            "planned chunks"
        );
        Ok(Self {
            config,
            table,
            year,
            active,
            per_chunk,
        })
    }

    pub fn table(&self) -> &'a TableDefinition {
        self.table
    }

    pub fn year(&self) -> Option<u16> {
        self.year
    }

    pub fn per_chunk(&self) -> usize {
        self.per_chunk
    }

    pub fn active_variables(&self) -> &[&'a VariableDefinition] {
        &self.active
    }

    pub fn num_chunks(&self) -> usize {
        self.active.len().div_ceil(self.per_chunk)
    }

    pub fn chunk_variables(&self, index: usize) -> Result<&[&'a VariableDefinition], PlanError> {
        if index >= self.num_chunks() {
            return Err(PlanError::ChunkOutOfRange {
                table: self.table.name.clone(),
                chunk: index,
                num_chunks: self.num_chunks(),
            });
        }
        Ok(&self.active[chunk_range(index, self.per_chunk, self.active.len())])
    }

    /// The `get=` list for chunk `index`, checked against the column cap.
    pub fn chunk_columns(&self, index: usize) -> Result<Vec<String>, PlanError> {
        let variables = self.chunk_variables(index)?;
        let columns = expand_variables(self.config, variables.iter().copied(), self.year)?;
        let cap = self.config.constants.column_cap;
        if columns.len() > cap {
            return Err(PlanError::CapExceeded {
                table: self.table.name.clone(),
                chunk: index,
                columns: columns.len(),
                cap,
            });
        }
        Ok(columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::{sample, SAMPLE};
    use crate::config::YearOverride;
    use std::collections::HashSet;

    /// A table with `n` variables, every third one missing in 2020.
    fn wide_config(n: usize, suffixes: usize) -> Config {
        let mut config = sample();
        config.suffixes.truncate(1);
        for i in 1..suffixes {
            config.suffixes.push(crate::config::SuffixDefinition {
                code: format!("S{i}"),
                mapping: format!("variant_{i}"),
            });
        }
        let table = &mut config.tables[0];
        table.variables.clear();
        for i in 0..n {
            let name = format!("v{i:03}");
            let mut v = VariableDefinition {
                name: name.clone(),
                table: Some("B99999".into()),
                column: None,
                row: Some(format!("{i:03}")),
                ..Default::default()
            };
            if i % 3 == 2 {
                v.overrides.insert(
                    2020,
                    YearOverride {
                        missing: true,
                        ..Default::default()
                    },
                );
            }
            table.variables.insert(name, v);
        }
        config
    }

    #[test]
    fn cap_arithmetic() {
        assert_eq!(per_variable_cap(50, 2, 4).unwrap(), 12);
        assert_eq!(per_variable_cap(50, 2, 1).unwrap(), 48);
        assert!(per_variable_cap(50, 2, 49).is_err());
        assert!(per_variable_cap(1, 2, 1).is_err());
        assert!(matches!(per_variable_cap(50, 2, 0), Err(ConfigError::NoSuffixes)));
    }

    #[test]
    fn ranges_are_half_open_and_clamped() {
        assert_eq!(chunk_range(0, 12, 30), 0..12);
        assert_eq!(chunk_range(2, 12, 30), 24..30);
        assert_eq!(chunk_range(3, 12, 30), 30..30);
    }

    #[test]
    fn every_active_variable_in_exactly_one_chunk() {
        for n in [0usize, 1, 11, 12, 13, 24, 25, 100] {
            for suffixes in [1usize, 2, 4, 7] {
                let config = wide_config(n, suffixes);
                for year in [Some(2019), Some(2020), None] {
                    let plan = ChunkPlan::new(&config, "income", year).unwrap();
                    let mut seen = Vec::new();
                    for i in 0..plan.num_chunks() {
                        let chunk = plan.chunk_variables(i).unwrap();
                        assert!(!chunk.is_empty(), "chunk {i} empty");
                        seen.extend(chunk.iter().map(|v| v.name.clone()));
                    }
                    let expected: Vec<_> =
                        plan.active_variables().iter().map(|v| v.name.clone()).collect();
                    assert_eq!(seen, expected, "n={n} suffixes={suffixes} year={year:?}");
                    let unique: HashSet<_> = seen.iter().collect();
                    assert_eq!(unique.len(), seen.len());
                }
            }
        }
    }

    #[test]
    fn suppressed_variables_do_not_consume_slots() {
        let config = wide_config(30, 4);
        let plan_2019 = ChunkPlan::new(&config, "income", Some(2019)).unwrap();
        let plan_2020 = ChunkPlan::new(&config, "income", Some(2020)).unwrap();
        assert_eq!(plan_2019.active_variables().len(), 30);
        assert_eq!(plan_2020.active_variables().len(), 20);
        assert_eq!(plan_2019.num_chunks(), 3);
        assert_eq!(plan_2020.num_chunks(), 2);
        assert!(plan_2020
            .active_variables()
            .iter()
            .all(|v| !v.overrides.contains_key(&2020)));
    }

    #[test]
    fn every_chunk_respects_the_cap() {
        for suffixes in [1usize, 3, 4, 6] {
            let config = wide_config(97, suffixes);
            let plan = ChunkPlan::new(&config, "income", Some(2019)).unwrap();
            let mut codes = 0;
            for i in 0..plan.num_chunks() {
                let cols = plan.chunk_columns(i).unwrap();
                assert!(cols.len() <= 50);
                assert_eq!(&cols[..2], ["NAME", "GEO_ID"]);
                codes += cols.len() - 2;
            }
            assert_eq!(codes, 97 * suffixes);
        }
    }

    #[test]
    fn last_variable_of_each_chunk_is_kept() {
        // 4 suffixes, 2 identity columns: 12 variables per chunk
        let config = wide_config(25, 4);
        let plan = ChunkPlan::new(&config, "income", Some(2019)).unwrap();
        assert_eq!(plan.per_chunk(), 12);
        assert_eq!(plan.chunk_variables(0).unwrap().last().unwrap().name, "v011");
        assert_eq!(plan.chunk_variables(1).unwrap().last().unwrap().name, "v023");
        assert_eq!(plan.chunk_variables(2).unwrap()[0].name, "v024");
    }

    #[test]
    fn out_of_range_chunk() {
        let config = sample();
        let plan = ChunkPlan::new(&config, "income", Some(2019)).unwrap();
        assert_eq!(plan.num_chunks(), 1);
        assert!(matches!(
            plan.chunk_variables(1),
            Err(PlanError::ChunkOutOfRange { .. })
        ));
    }

    #[test]
    fn year_without_active_variables_plans_nothing() {
        let yaml = SAMPLE.replace(
            "        table: S1701\n",
            "        table: S1701\n        overrides:\n          2019:\n            missing: true\n",
        );
        let config = Config::from_yaml(&yaml).unwrap();
        let plan = ChunkPlan::new(&config, "subject", Some(2019)).unwrap();
        assert_eq!(plan.num_chunks(), 0);
    }
}
