//! Embedded reference data.
//!
//! The country table is compiled into the binary with `include_str!()` so
//! standard conversion never touches the network or the filesystem.
//!
//! Columns: `alpha2, alpha3, numeric, name, iso_name, continent_code, capital`.
//! `numeric` is empty for user-assigned codes (Kosovo).

/// ISO 3166-1 countries with display name, continent and capital.
pub const COUNTRIES_CSV: &str = include_str!("../data/countries.csv");

/// Origin label used in log messages and errors about the embedded table.
pub const COUNTRIES_ORIGIN: &str = "embedded:countries.csv";
