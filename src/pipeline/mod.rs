//! The three stages run by the binary: download chunk files, transform them
//! into readable per-year tables, and load those tables into the database.

pub mod download;
pub mod load;
pub mod transform;

pub use download::{download_all, download_unit, ChunkOutcome, ChunkReport, DownloadReport};
pub use load::load_all;
pub use transform::transform_all;
