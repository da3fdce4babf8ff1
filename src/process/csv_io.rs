// src/process/csv_io.rs

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use glob::glob;
use std::{
    fs::{self, File, OpenOptions},
    path::Path,
};
use tracing::{debug, info};

use super::RawTable;

/// Create `dir` if needed and delete any `.csv` left from a previous run.
pub fn prepare_and_clean_dir<P: AsRef<Path>>(dir: P) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let pattern = format!("{}/*.csv", glob::Pattern::escape(&dir.display().to_string()));
    let mut removed = 0usize;
    for entry in glob(&pattern).context("invalid glob pattern for prepare_and_clean_dir")? {
        let path = entry?;
        if !path.is_file() {
            continue;
        }
        fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
        removed += 1;
    }
    if removed > 0 {
        info!(dir = %dir.display(), removed, "cleaned stale csv files");
    }
    Ok(())
}

/// Read a headed CSV; short rows are padded to the header width.
pub fn read_table<P: AsRef<Path>>(path: P) -> Result<RawTable> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let headers: Vec<String> = rdr
        .headers()
        .with_context(|| format!("reading header of {}", path.display()))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        let record =
            result.with_context(|| format!("CSV parse error in {} at record {}", path.display(), idx))?;
        let mut row: Vec<String> = record.iter().map(str::to_string).collect();
        row.resize(headers.len(), String::new());
        rows.push(row);
    }
    debug!(path = %path.display(), rows = rows.len(), "read csv");
    Ok(RawTable::new(headers, rows))
}

/// Write `table` to `path`, replacing any existing file.
pub fn write_table<P: AsRef<Path>>(path: P, table: &RawTable) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("csv.tmp");
    {
        let mut wtr = WriterBuilder::new()
            .from_path(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        wtr.write_record(&table.headers)?;
        for row in &table.rows {
            wtr.write_record(row)?;
        }
        wtr.flush()?;
    }
    fs::rename(&tmp, path)
        .with_context(|| format!("renaming {} to {}", tmp.display(), path.display()))?;
    Ok(())
}

/// Append `table` to `path` keeping the file's column order.
///
/// A new file gets `table`'s header. If `table` brings columns the file lacks,
/// the file is rewritten with those columns added at the end.
pub fn append_table<P: AsRef<Path>>(path: P, table: &RawTable) -> Result<()> {
    let path = path.as_ref();
    let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    if is_new {
        return write_table(path, table);
    }

    let existing_headers: Vec<String> = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?
        .headers()?
        .iter()
        .map(str::to_string)
        .collect();

    if table.headers.iter().any(|h| !existing_headers.contains(h)) {
        debug!(path = %path.display(), "widening csv for new columns");
        let mut merged = read_table(path)?;
        merged.extend_with(table);
        return write_table(path, &merged);
    }

    let file = OpenOptions::new()
        .append(true)
        .open(path)
        .with_context(|| format!("opening {} for append", path.display()))?;
    let mut wtr = WriterBuilder::new().from_writer(file);
    for row in table.aligned_rows(&existing_headers) {
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

/// True when `path` exists and holds at least a header.
pub fn has_content<P: AsRef<Path>>(path: P) -> bool {
    File::open(path)
        .and_then(|f| f.metadata())
        .map(|m| m.len() > 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
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
    fn write_then_read() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("a.csv");
        let table = t(&["NAME", "GEO_ID"], &[&["Alpha, County", "1"], &["Beta", "2"]]);
        write_table(&path, &table)?;
        assert_eq!(read_table(&path)?, table);
        Ok(())
    }

    #[test]
    fn append_realigns_to_existing_header() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("c.csv");
        append_table(&path, &t(&["geo_id", "x"], &[&["1", "a"]]))?;
        append_table(&path, &t(&["x", "geo_id"], &[&["b", "2"]]))?;
        assert_eq!(
            read_table(&path)?,
            t(&["geo_id", "x"], &[&["1", "a"], &["2", "b"]])
        );
        Ok(())
    }

    #[test]
    fn append_widens_for_new_columns() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("c.csv");
        append_table(&path, &t(&["geo_id", "x"], &[&["1", "a"]]))?;
        append_table(&path, &t(&["geo_id", "y"], &[&["2", "q"]]))?;
        assert_eq!(
            read_table(&path)?,
            t(&["geo_id", "x", "y"], &[&["1", "a", ""], &["2", "", "q"]])
        );
        Ok(())
    }

    #[test]
    fn prepare_removes_only_csv() -> Result<()> {
        let dir = tempdir()?;
        let sub = dir.path().join("raw");
        prepare_and_clean_dir(&sub)?;
        fs::write(sub.join("old.csv"), "a\n1\n")?;
        fs::write(sub.join("notes.txt"), "keep")?;
        fs::create_dir(sub.join("nested.csv"))?;
        prepare_and_clean_dir(&sub)?;
        assert!(!sub.join("old.csv").exists());
        assert!(sub.join("notes.txt").exists());
        assert!(sub.join("nested.csv").is_dir());
        Ok(())
    }
}
