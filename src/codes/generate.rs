// src/codes/generate.rs

use super::catalog::resolve_code;
use crate::config::{Config, VariableDefinition};
use crate::error::ConfigError;

/// Identity columns followed by every `variable × suffix` code present in `year`.
pub fn expand_variables<'a, I>(
    config: &Config,
    variables: I,
    year: Option<u16>,
) -> Result<Vec<String>, ConfigError>
where
    I: IntoIterator<Item = &'a VariableDefinition>,
{
    let mut columns: Vec<String> = config.identity_columns().map(str::to_string).collect();
    for variable in variables {
        for suffix in &config.suffixes {
            if let Some(code) = resolve_code(variable, &suffix.code, year)? {
                columns.push(code);
            }
        }
    }
    Ok(columns)
}

/// Full, unchunked `get=` list for one table and year.
pub fn expand_table_columns(
    config: &Config,
    table_name: &str,
    year: Option<u16>,
) -> Result<Vec<String>, ConfigError> {
    let table = config.table(table_name)?;
    expand_variables(config, table.variables.values(), year)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample;

    #[test]
    fn identity_first_then_variables_by_suffix() {
        let config = sample();
        let cols = expand_table_columns(&config, "income", Some(2019)).unwrap();
        assert_eq!(
            cols,
            [
                "NAME",
                "GEO_ID",
                "B01003_001E",
                "B01003_001M",
                "B19013_001E",
                "B19013_001M",
                "B11001_001E",
                "B11001_001M",
            ]
        );
    }

    #[test]
    fn suppressed_variable_contributes_nothing() {
        let config = sample();
        let cols = expand_table_columns(&config, "income", Some(2020)).unwrap();
        assert_eq!(cols.len(), 2 + 2 * 2);
        assert!(!cols.iter().any(|c| c.starts_with("B19013")));
    }

    #[test]
    fn restartable() {
        let config = sample();
        let a = expand_table_columns(&config, "subject", Some(2021)).unwrap();
        let b = expand_table_columns(&config, "subject", Some(2021)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a[2], "S1701_C03_001E");
    }

    #[test]
    fn unknown_table() {
        let config = sample();
        assert!(matches!(
            expand_table_columns(&config, "missing", Some(2019)),
            Err(ConfigError::UnknownTable(_))
        ));
    }
}
