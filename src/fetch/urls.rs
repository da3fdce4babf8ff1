// src/fetch/urls.rs

use anyhow::{Context, Result};
use url::Url;

use crate::config::{Config, GeoLevel, TableDefinition};

/// `base_url_template` for `year`, plus the table's segment when it has one.
pub fn table_url(config: &Config, table: &TableDefinition, year: u16) -> Result<Url> {
    let base = config
        .constants
        .base_url_template
        .replace("{year}", &year.to_string());
    let raw = match table.url_segment.as_deref().map(|s| s.trim_matches('/')) {
        Some(segment) if !segment.is_empty() => {
            format!("{}/{}", base.trim_end_matches('/'), segment)
        }
        _ => base,
    };
    Url::parse(&raw).with_context(|| format!("parsing request URL {}", raw))
}

/// Full request: `?get=<codes>&for=<geography>:*`.
pub fn request_url(
    config: &Config,
    table: &TableDefinition,
    geo: &GeoLevel,
    year: u16,
    columns: &[String],
) -> Result<Url> {
    let mut url = table_url(config, table, year)?;
    url.query_pairs_mut()
        .append_pair("get", &columns.join(","))
        .append_pair("for", &format!("{}:*", geo.for_parameter.trim()));
    Ok(url)
}
