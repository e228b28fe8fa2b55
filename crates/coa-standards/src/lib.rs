//! Location standards: the embedded ISO 3166 country table and the
//! vocabularies of known upstream databases.

pub mod catalog;
pub mod embedded;
pub mod sources;

pub use catalog::{CONTINENTS, CountryRecord, StandardsCatalog, continent_name, pad_numeric};
pub use sources::{AliasTarget, SourceDatabase};
