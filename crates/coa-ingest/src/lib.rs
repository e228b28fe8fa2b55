//! Data acquisition: reference-table fetching with an on-disk cache, CSV
//! source reading and cell value helpers.

pub mod fetch;
pub mod source_table;
pub mod values;

pub use fetch::{CachedHttpFetcher, ReferenceFetcher, StaticFetcher, sha256_hex};
pub use source_table::{ReadOptions, SourceTable};
pub use values::{any_to_f64, any_to_string, format_numeric, is_missing, parse_number};
