// src/process/reassemble.rs

use anyhow::{Context, Result};
use glob::glob;
use regex::Regex;
use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};
use tracing::{debug, instrument, warn};

use super::{csv_io::read_table, RawTable};
use crate::error::MergeError;

/// Files in `dir` whose name contains `base_stem`, ordered by chunk index.
pub fn find_chunk_files<P: AsRef<Path>>(dir: P, base_stem: &str) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let pattern = format!(
        "{}/*{}*.csv",
        glob::Pattern::escape(&dir.display().to_string()),
        glob::Pattern::escape(base_stem)
    );
    let chunk_re = Regex::new(&format!(r"{}_(\d+)\.csv$", regex::escape(base_stem)))
        .context("building chunk index pattern")?;

    let mut files: Vec<(Option<usize>, String, PathBuf)> = Vec::new();
    for entry in glob(&pattern).context("invalid glob pattern for find_chunk_files")? {
        let path = entry?;
        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        let index = chunk_re
            .captures(&name)
            .and_then(|c| c[1].parse::<usize>().ok());
        files.push((index, name, path));
    }
    files.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));
    Ok(files.into_iter().map(|(_, _, p)| p).collect())
}

/// Outer-join chunk tables on `key`, in the order given.
///
/// A single table is returned untouched. Otherwise the key comes first, then
/// every other column in first-seen order; a column already taken from an
/// earlier table is dropped from later ones. Keys missing from a table get
/// empty cells for that table's columns.
///
/// No source row is ever folded into another. The n-th row carrying a key in
/// one table joins the n-th output row with that key, or starts a new one.
/// Rows with an empty key never join and always become rows of their own.
pub fn merge_tables(tables: Vec<(PathBuf, RawTable)>, key: &str) -> Result<RawTable, MergeError> {
    let mut tables = tables.into_iter();
    let Some((first_path, first)) = tables.next() else {
        return Ok(RawTable::default());
    };
    let rest: Vec<(PathBuf, RawTable)> = tables.collect();
    if rest.is_empty() {
        return Ok(first);
    }

    let mut headers = vec![key.to_string()];
    let mut origin: HashMap<String, PathBuf> = HashMap::new();
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut by_key: HashMap<String, Vec<usize>> = HashMap::new();

    for (path, table) in std::iter::once((first_path, first)).chain(rest) {
        let key_idx = table
            .column_index(key)
            .ok_or_else(|| MergeError::MissingKey {
                file: path.clone(),
                key: key.to_string(),
            })?;

        // columns this table contributes, by source index
        let mut local = HashSet::new();
        let mut kept = Vec::new();
        for (i, column) in table.headers.iter().enumerate() {
            if i == key_idx {
                continue;
            }
            if !local.insert(column.as_str()) {
                return Err(MergeError::DuplicateColumn {
                    column: column.clone(),
                    first: path.clone(),
                    second: path.clone(),
                });
            }
            if origin.contains_key(column) {
                debug!(%column, file = %path.display(), "dropping repeated column");
                continue;
            }
            kept.push(i);
        }

        let old_width = headers.len();
        for &i in &kept {
            let column = table.headers[i].clone();
            origin.insert(column.clone(), path.clone());
            headers.push(column);
        }
        let width = headers.len();
        for row in &mut rows {
            row.resize(width, String::new());
        }

        let mut occurrences: HashMap<&str, usize> = HashMap::new();
        let mut blank_keys = 0usize;
        let mut repeated_keys = 0usize;
        for src in &table.rows {
            let key_value = src.get(key_idx).map(String::as_str).unwrap_or_default();
            let existing = if key_value.is_empty() {
                blank_keys += 1;
                None
            } else {
                let seen = occurrences.entry(key_value).or_default();
                if *seen > 0 {
                    repeated_keys += 1;
                }
                *seen += 1;
                by_key
                    .get(key_value)
                    .and_then(|positions| positions.get(*seen - 1))
                    .copied()
            };
            let target = match existing {
                Some(pos) => pos,
                None => {
                    let mut fresh = vec![String::new(); width];
                    fresh[0] = key_value.to_string();
                    rows.push(fresh);
                    let pos = rows.len() - 1;
                    if !key_value.is_empty() {
                        by_key.entry(key_value.to_string()).or_default().push(pos);
                    }
                    pos
                }
            };
            for (offset, &i) in kept.iter().enumerate() {
                rows[target][old_width + offset] = src.get(i).cloned().unwrap_or_default();
            }
        }
        if blank_keys > 0 || repeated_keys > 0 {
            warn!(file = %path.display(), key, blank_keys, repeated_keys, "join key not unique; rows kept separately");
        }
    }

    if let Some(column) = first_duplicate(&headers) {
        let file = origin.get(column).cloned().unwrap_or_default();
        return Err(MergeError::DuplicateColumn {
            column: column.to_string(),
            first: file.clone(),
            second: file,
        });
    }

    Ok(RawTable::new(headers, rows))
}

fn first_duplicate(headers: &[String]) -> Option<&str> {
    let mut seen = HashSet::new();
    headers
        .iter()
        .find(|h| !seen.insert(h.as_str()))
        .map(String::as_str)
}

/// Rebuild one wide table from every chunk file of `base_stem` in `dir`.
#[instrument(level = "info", skip(dir), fields(dir = %dir.as_ref().display()))]
pub fn merge_chunks_for_base<P: AsRef<Path>>(dir: P, base_stem: &str, key: &str) -> Result<RawTable> {
    let files = find_chunk_files(&dir, base_stem)?;
    if files.is_empty() {
        return Err(MergeError::NoFiles(base_stem.to_string()).into());
    }
    let mut tables = Vec::with_capacity(files.len());
    for path in files {
        let table = read_table(&path)?;
        tables.push((path, table));
    }
    debug!(files = tables.len(), "merging chunks");
    Ok(merge_tables(tables, key)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::csv_io::write_table;
    use tempfile::tempdir;

    fn t(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn dedupes_columns_and_outer_joins() {
        let a = t(
            &["GEO_ID", "NAME", "x1"],
            &[&["g1", "One", "10"], &["g2", "Two", "20"]],
        );
        let b = t(
            &["GEO_ID", "x1", "x2"],
            &[&["g2", "99", "200"], &["g3", "98", "300"]],
        );
        let merged = merge_tables(
            vec![("a.csv".into(), a), ("b.csv".into(), b)],
            "GEO_ID",
        )
        .unwrap();
        assert_eq!(
            merged,
            t(
                &["GEO_ID", "NAME", "x1", "x2"],
                &[
                    &["g1", "One", "10", ""],
                    &["g2", "Two", "20", "200"],
                    &["g3", "", "", "300"],
                ],
            )
        );
    }

    #[test]
    fn rows_sharing_a_key_are_all_kept() {
        let a = t(
            &["GEO_ID", "x1"],
            &[&["", "1"], &["", "2"], &["g1", "3"], &["g1", "4"]],
        );
        let b = t(&["GEO_ID", "x2"], &[&["g1", "9"], &["", "8"]]);
        let merged = merge_tables(
            vec![("a.csv".into(), a), ("b.csv".into(), b)],
            "GEO_ID",
        )
        .unwrap();
        assert_eq!(
            merged,
            t(
                &["GEO_ID", "x1", "x2"],
                &[
                    &["", "1", ""],
                    &["", "2", ""],
                    &["g1", "3", "9"],
                    &["g1", "4", ""],
                    &["", "", "8"],
                ],
            )
        );
    }

    #[test]
    fn key_moves_first() {
        let a = t(&["NAME", "GEO_ID", "x1"], &[&["One", "g1", "1"]]);
        let b = t(&["NAME", "GEO_ID", "x2"], &[&["One", "g1", "2"]]);
        let merged =
            merge_tables(vec![("a".into(), a), ("b".into(), b)], "GEO_ID").unwrap();
        assert_eq!(merged, t(&["GEO_ID", "NAME", "x1", "x2"], &[&["g1", "One", "1", "2"]]));
    }

    #[test]
    fn single_table_untouched() {
        let a = t(&["NAME", "GEO_ID"], &[&["One", "g1"]]);
        let merged = merge_tables(vec![("a".into(), a.clone())], "GEO_ID").unwrap();
        assert_eq!(merged, a);
    }

    #[test]
    fn missing_key_and_duplicate_header_are_conflicts() {
        let a = t(&["GEO_ID", "x"], &[]);
        let b = t(&["NAME", "y"], &[]);
        let err = merge_tables(vec![("a".into(), a.clone()), ("b".into(), b)], "GEO_ID").unwrap_err();
        assert!(matches!(err, MergeError::MissingKey { ref file, .. } if file == Path::new("b")));

        let c = t(&["GEO_ID", "y", "y"], &[]);
        let err = merge_tables(vec![("a".into(), a), ("c".into(), c)], "GEO_ID").unwrap_err();
        assert!(matches!(err, MergeError::DuplicateColumn { .. }));
    }

    #[test]
    fn merges_files_from_disk_in_chunk_order() -> Result<()> {
        let dir = tempdir()?;
        let stem = "p_income_zcta_2020";
        for i in 0..11 {
            let col = format!("x{i}");
            let value = i.to_string();
            write_table(
                dir.path().join(format!("{stem}_{i}.csv")),
                &t(&["NAME", "GEO_ID", col.as_str()], &[&["One", "g1", value.as_str()]]),
            )?;
        }
        // other years and geographies are ignored
        write_table(
            dir.path().join("p_income_zcta_2021_0.csv"),
            &t(&["GEO_ID", "other"], &[&["g1", "z"]]),
        )?;

        let files = find_chunk_files(dir.path(), stem)?;
        assert_eq!(files.len(), 11);
        assert!(files[10].ends_with(format!("{stem}_10.csv")));

        let merged = merge_chunks_for_base(dir.path(), stem, "GEO_ID")?;
        let expected: Vec<String> = ["GEO_ID", "NAME"]
            .iter()
            .map(|s| s.to_string())
            .chain((0..11).map(|i| format!("x{i}")))
            .collect();
        assert_eq!(merged.headers, expected);
        assert_eq!(merged.rows.len(), 1);
        assert_eq!(merged.rows[0][12], "10");
        Ok(())
    }

    #[test]
    fn single_file_on_disk_is_returned_as_is() -> Result<()> {
        let dir = tempdir()?;
        let table = t(&["NAME", "GEO_ID", "x"], &[&["One", "g1", "1"]]);
        write_table(dir.path().join("p_t_state_2019_0.csv"), &table)?;
        assert_eq!(merge_chunks_for_base(dir.path(), "p_t_state_2019", "GEO_ID")?, table);
        Ok(())
    }

    #[test]
    fn no_files_is_an_error() {
        let dir = tempdir().unwrap();
        let err = merge_chunks_for_base(dir.path(), "nothing", "GEO_ID").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MergeError>(),
            Some(MergeError::NoFiles(_))
        ));
    }
}
