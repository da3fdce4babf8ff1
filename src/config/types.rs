// src/config/types.rs

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;

/// Code fragments may be written as strings (`"001"`) or bare numbers (`1`).
/// Leading zeros only survive when quoted.
#[derive(Deserialize)]
#[serde(untagged)]
enum Fragment {
    Text(String),
    Number(u64),
}

impl From<Fragment> for String {
    fn from(f: Fragment) -> Self {
        match f {
            Fragment::Text(s) => s,
            Fragment::Number(n) => n.to_string(),
        }
    }
}

fn de_fragment<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Fragment>::deserialize(d)?.map(String::from))
}

/// Distinguishes "key absent" (outer `None`, fall back to the base value)
/// from "key set to null" (`Some(None)`, omit the fragment).
fn de_override_fragment<'de, D>(d: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    de_fragment(d).map(Some)
}

/// A column requested in every call, ahead of the chunked variables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DefaultColumn {
    pub name: String,
}

/// A measurement variant appended to every variable code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SuffixDefinition {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub mapping: String,
}

impl SuffixDefinition {
    /// The base estimate keeps the bare variable name after renaming.
    pub fn is_base_estimate(&self) -> bool {
        self.code.is_empty() || self.mapping.trim().is_empty()
    }
}

/// Partial replacement of a variable's code for one year.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct YearOverride {
    #[serde(default, deserialize_with = "de_fragment")]
    pub table: Option<String>,
    #[serde(default, deserialize_with = "de_override_fragment")]
    pub column: Option<Option<String>>,
    #[serde(default, deserialize_with = "de_override_fragment")]
    pub row: Option<Option<String>>,
    #[serde(default)]
    pub missing: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VariableDefinition {
    /// Filled from the map key after parsing.
    #[serde(skip)]
    pub name: String,
    #[serde(default, deserialize_with = "de_fragment")]
    pub table: Option<String>,
    #[serde(default, deserialize_with = "de_fragment")]
    pub column: Option<String>,
    #[serde(default, deserialize_with = "de_fragment")]
    pub row: Option<String>,
    #[serde(default, alias = "years")]
    pub overrides: BTreeMap<u16, YearOverride>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    #[serde(default)]
    pub url_segment: Option<String>,
    #[serde(default)]
    pub variables: IndexMap<String, VariableDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeoLevel {
    pub for_parameter: String,
    pub file_name_segment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct YearRange {
    pub start: u16,
    pub end: u16,
}

impl YearRange {
    pub fn years(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }
}

fn default_column_cap() -> usize {
    50
}

fn default_geo_id_column() -> String {
    "GEO_ID".to_string()
}

fn default_max_retries() -> u32 {
    10
}

fn default_retry_delay_secs() -> u64 {
    5
}

fn default_max_retry_delay_secs() -> u64 {
    60
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_concurrency() -> usize {
    1
}

fn default_min_year() -> u16 {
    2009
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Constants {
    pub year_range: YearRange,
    /// e.g. `https://api.census.gov/data/{year}/acs/acs5`
    pub base_url_template: String,
    pub file_name_prefix: String,

    /// Maximum number of `get=` columns the API accepts per request.
    #[serde(default = "default_column_cap")]
    pub column_cap: usize,
    /// Identity column used to join chunk responses back together.
    #[serde(default = "default_geo_id_column")]
    pub geo_id_column: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_max_retry_delay_secs")]
    pub max_retry_delay_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Number of (table, geography, year) units downloaded at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Readable column names removed before consolidation (e.g. `state`).
    #[serde(default)]
    pub drop_columns: Vec<String>,
    #[serde(default = "default_min_year")]
    pub min_year: u16,
}
