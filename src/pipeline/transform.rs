// src/pipeline/transform.rs

use anyhow::Result;
use std::path::PathBuf;
use tracing::{debug, error, info, instrument, warn};

use crate::codes::ColumnMapping;
use crate::config::Config;
use crate::process::{csv_io, merge_chunks_for_base, naming, Layout};

/// Reassemble, rename and consolidate every table's chunk files.
///
/// For each geography × year the chunk files are outer-joined on the join key,
/// codes are renamed to readable names, configured columns are dropped, and the
/// result is written as `{stem}.csv` and appended to the per-year consolidated
/// file. A base that fails to merge or to write is logged and skipped.
///
/// Returns the consolidated files that were written.
#[instrument(level = "info", skip_all)]
pub fn transform_all(config: &Config, mapping: &ColumnMapping, layout: &Layout) -> Result<Vec<PathBuf>> {
    let c = &config.constants;
    let mut outputs = Vec::new();

    for table in &config.tables {
        // clear earlier outputs first so a skipped table never reloads stale files
        let out_dir = layout.processed_dir(&table.name);
        csv_io::prepare_and_clean_dir(&out_dir)?;
        let raw_dir = layout.raw_dir(&table.name);
        if !raw_dir.is_dir() {
            warn!(table = %table.name, dir = %raw_dir.display(), "no raw directory; skipping table");
            continue;
        }

        for year in config.years() {
            let consolidated = out_dir.join(naming::consolidated_file_name(
                &c.file_name_prefix,
                &table.name,
                year,
            ));

            for geo in &config.geo_levels {
                let stem = naming::base_stem(&c.file_name_prefix, &table.name, &geo.file_name_segment, year);

                // 1) outer-join chunk files on the join key
                let mut merged = match merge_chunks_for_base(&raw_dir, &stem, &c.geo_id_column) {
                    Ok(t) => t,
                    Err(e) => {
                        let reason = format!("{e:#}");
                        error!(table = %table.name, geo = %geo.file_name_segment, year, error = %reason, "merge failed; skipping");
                        continue;
                    }
                };

                // 2) codes → readable names, then drop unwanted columns
                merged.rename_columns(mapping);
                let dropped = merged.drop_columns(&c.drop_columns);
                if !dropped.is_empty() {
                    debug!(stem = %stem, ?dropped, "dropped columns");
                }

                // 3) per-geography file, then the per-year consolidation
                if let Err(e) = csv_io::write_table(out_dir.join(format!("{stem}.csv")), &merged)
                    .and_then(|()| csv_io::append_table(&consolidated, &merged))
                {
                    let reason = format!("{e:#}");
                    error!(table = %table.name, geo = %geo.file_name_segment, year, error = %reason, "write failed; skipping");
                    continue;
                }
                info!(
                    stem = %stem,
                    rows = merged.rows.len(),
                    columns = merged.headers.len(),
                    "transformed"
                );
            }

            if csv_io::has_content(&consolidated) {
                outputs.push(consolidated);
            }
        }
    }

    Ok(outputs)
}
