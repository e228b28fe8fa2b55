pub mod config;
pub mod enums;
pub mod error;
pub mod lookup;

pub use config::{CacheConfig, CoaConfig, DemographicsSource, SchemaConfig, SourcesConfig};
pub use enums::{
    Granularity, GeometryView, IdentifierKind, LocationMode, LocationStandard, OutputKind,
};
pub use error::{CoaError, ErrorCategory, ErrorKind, Result};
pub use lookup::{CaseInsensitiveMap, normalize_key, title_case};

/// Column names of the canonical table.
pub mod columns {
    pub const DATE: &str = "date";
    pub const WHERE: &str = "where";
    pub const CODE: &str = "code";
    pub const GEOMETRY: &str = "geometry";
}
