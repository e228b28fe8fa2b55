//! Location identity: resolution of free-form place names, multi-country
//! regions, per-country subregion hierarchies and attribute enrichment.

pub mod country;
pub mod enrich;
mod frame;
pub mod regions;
pub mod resolver;
pub mod score;

pub use country::{AddFieldOptions, AdapterRegistry, CountryGeometryCatalog, HierarchySnapshot, Level};
pub use enrich::{AttributeEnricher, EnrichField, EnricherSources};
pub use regions::{Region, RegionCatalog, RegionRule};
pub use resolver::{
    Candidate, LocationResolver, MatchPolicy, RawLocation, Resolution, ResolveMethod,
    ResolveOutput,
};
