//! Schema-driven ingestion of epidemiological datasets.
//!
//! A dataset is described by a JSON document (see [`schema`]) naming one or
//! more CSV sources and how to read them. [`DatasetSchemaParser`] turns the
//! sources into a [`CanonicalTable`]: one row per (location, date), with
//! resolved location names and codes, the declared variables and geometry.

pub mod canonical;
pub mod parser;
pub mod registry;
pub mod schema;
pub mod transform;

pub use canonical::{CanonicalRow, CanonicalTable, ParseReport, ParsedDataset};
pub use parser::{DatasetSchemaParser, ParseContext, ParserOptions, ParserState};
pub use registry::SchemaRegistry;
pub use schema::{CastType, ColumnSpec, DatasetBlock, DatasetDescription, GeoInfo, OneOrMany};
