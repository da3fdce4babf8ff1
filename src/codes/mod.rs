//! Variable-code generation: the catalog resolves one variable to a wire code,
//! the generator expands whole tables, the planner splits them under the API's
//! column cap, and the mapping turns codes back into readable names.

pub mod catalog;
pub mod generate;
pub mod mapping;
pub mod plan;

pub use catalog::resolve_code;
pub use generate::{expand_table_columns, expand_variables};
pub use mapping::{build_column_mapping, readable_name, ColumnMapping};
pub use plan::{active_variables, chunk_range, per_variable_cap, ChunkPlan};
