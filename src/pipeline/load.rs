// src/pipeline/load.rs

use anyhow::Result;
use std::path::PathBuf;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::process::{csv_io, naming, Layout};
use crate::store::Store;

/// Consolidated files that exist for every configured table and year.
pub fn consolidated_files(config: &Config, layout: &Layout) -> Vec<PathBuf> {
    let prefix = &config.constants.file_name_prefix;
    let mut files = Vec::new();
    for table in &config.tables {
        let dir = layout.processed_dir(&table.name);
        for year in config.years() {
            let path = dir.join(naming::consolidated_file_name(prefix, &table.name, year));
            if csv_io::has_content(&path) {
                files.push(path);
            } else {
                warn!(table = %table.name, year, "no consolidated file; nothing to load");
            }
        }
    }
    files
}

/// Load every consolidated file into `store`, one table per file.
///
/// Returns the total number of rows inserted.
#[instrument(level = "info", skip_all)]
pub fn load_all(config: &Config, layout: &Layout, store: &mut Store) -> Result<usize> {
    let mut total = 0;
    for path in consolidated_files(config, layout) {
        let (name, rows) = store.load_csv_file(&path)?;
        info!(table = %name, rows, "loaded");
        total += rows;
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::sample;
    use crate::process::RawTable;
    use tempfile::tempdir;

    #[test]
    fn loads_only_existing_years() -> Result<()> {
        let config = sample();
        let dir = tempdir()?;
        let layout = Layout::new(dir.path());
        let out = layout.processed_dir("income");
        std::fs::create_dir_all(&out)?;
        csv_io::write_table(
            out.join("census_acs5_income_2021.csv"),
            &RawTable::new(
                vec!["geo_id".into(), "total_population".into()],
                vec![vec!["g1".into(), "5".into()], vec!["g2".into(), "6".into()]],
            ),
        )?;

        let mut store = Store::open_in_memory()?;
        assert_eq!(load_all(&config, &layout, &mut store)?, 2);
        assert_eq!(store.row_count("census_acs5_income_2021")?, 2);
        Ok(())
    }
}
