// src/codes/catalog.rs

use crate::config::{VariableDefinition, YearOverride};
use crate::error::ConfigError;

fn override_for(variable: &VariableDefinition, year: Option<u16>) -> Option<&YearOverride> {
    year.and_then(|y| variable.overrides.get(&y))
}

/// Build the wire-level code for `variable` + `suffix_code` in `year`.
///
/// Returns `Ok(None)` when the variable is marked missing for that year; callers
/// skip it. Fragments are joined with `_` in the order table, column, row, and the
/// suffix is appended with no separator. Absent or empty `column`/`row` fragments
/// are left out entirely.
pub fn resolve_code(
    variable: &VariableDefinition,
    suffix_code: &str,
    year: Option<u16>,
) -> Result<Option<String>, ConfigError> {
    let year_override = override_for(variable, year);
    if year_override.is_some_and(|o| o.missing) {
        return Ok(None);
    }

    let table = year_override
        .and_then(|o| o.table.as_deref())
        .or(variable.table.as_deref())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ConfigError::MissingTable {
            variable: variable.name.clone(),
            year,
        })?;

    let column = match year_override.and_then(|o| o.column.as_ref()) {
        Some(explicit) => explicit.as_deref(),
        None => variable.column.as_deref(),
    };
    let row = match year_override.and_then(|o| o.row.as_ref()) {
        Some(explicit) => explicit.as_deref(),
        None => variable.row.as_deref(),
    };

    let mut code = String::from(table);
    for fragment in [column, row].into_iter().flatten() {
        if fragment.is_empty() {
            continue;
        }
        code.push('_');
        code.push_str(fragment);
    }
    code.push_str(suffix_code);
    Ok(Some(code))
}
