use std::path::{Path, PathBuf};

/// Shared prefix of every chunk file of one table/geography/year.
pub fn base_stem(prefix: &str, table: &str, geo_segment: &str, year: u16) -> String {
    format!("{prefix}_{table}_{geo_segment}_{year}")
}

pub fn chunk_file_name(prefix: &str, table: &str, geo_segment: &str, year: u16, chunk: usize) -> String {
    format!("{}_{chunk}.csv", base_stem(prefix, table, geo_segment, year))
}

/// The per-year output with chunk index and geography dropped.
pub fn consolidated_file_name(prefix: &str, table: &str, year: u16) -> String {
    format!("{prefix}_{table}_{year}.csv")
}

/// Where raw chunk files and processed outputs live under one data root.
#[derive(Debug, Clone)]
pub struct Layout {
    pub data_root: PathBuf,
}

impl Layout {
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    pub fn raw_dir(&self, table: &str) -> PathBuf {
        self.data_root.join("raw").join(table)
    }

    pub fn processed_dir(&self, table: &str) -> PathBuf {
        self.data_root.join("processed").join(table)
    }
}

/// Lowercased file stem, used as the database table name.
pub fn table_name_for(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_lowercase)
}
