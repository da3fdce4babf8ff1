// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Malformed or incomplete configuration. Always fatal, raised before any request is sent.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("variable `{variable}` has no `table` code (year {year:?})")]
    MissingTable { variable: String, year: Option<u16> },

    #[error("unknown table `{0}`")]
    UnknownTable(String),

    #[error("duplicate table name `{0}`")]
    DuplicateTable(String),

    #[error("no suffixes configured")]
    NoSuffixes,

    #[error("more than one suffix denotes the base estimate: {0:?}")]
    MultipleBaseSuffixes(Vec<String>),

    #[error(
        "{suffixes} suffixes with {identity} identity columns leave no room for a variable under the {cap}-column cap"
    )]
    SuffixesExceedCap {
        suffixes: usize,
        identity: usize,
        cap: usize,
    },

    #[error("identity columns must include the join key `{0}`")]
    MissingJoinKey(String),

    #[error("no geography levels configured")]
    NoGeoLevels,

    #[error("geography `{0}` must be a single `for` predicate without `:` or `&`")]
    InvalidGeoLevel(String),

    #[error("base_url_template `{0}` has no {{year}} placeholder")]
    MissingYearPlaceholder(String),

    #[error("invalid year range {start}..={end}: {reason}")]
    InvalidYearRange { start: u16, end: u16, reason: String },
}

/// Failures while turning a table definition into per-request column lists.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("chunk {chunk} of `{table}` is out of range ({num_chunks} chunks)")]
    ChunkOutOfRange {
        table: String,
        chunk: usize,
        num_chunks: usize,
    },

    #[error("chunk {chunk} of `{table}` expands to {columns} columns, over the cap of {cap}")]
    CapExceeded {
        table: String,
        chunk: usize,
        columns: usize,
        cap: usize,
    },
}

/// Failures of a single API call.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("GET {url} failed after {attempts} attempts: {source}")]
    Transient {
        url: String,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("decoding response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Chunk files that cannot be joined into one wide table.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("no chunk files contain `{0}`")]
    NoFiles(String),

    #[error("{file} has no `{key}` column to join on")]
    MissingKey { file: PathBuf, key: String },

    #[error("column `{column}` of {second} duplicates one already taken from {first}")]
    DuplicateColumn {
        column: String,
        first: PathBuf,
        second: PathBuf,
    },
}
