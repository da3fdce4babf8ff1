// src/process/mod.rs

pub mod csv_io;
pub mod naming;
pub mod raw_table;
pub mod reassemble;

pub use naming::Layout;
pub use raw_table::RawTable;
pub use reassemble::{merge_chunks_for_base, merge_tables};
