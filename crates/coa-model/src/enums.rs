//! Type-safe enumerations for location standards and dataset options.
//!
//! Dataset descriptions and command-line arguments carry these as strings;
//! the `FromStr` implementations are where bad values turn into the
//! matching taxonomy error.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoaError;

/// Location naming standard a resolver emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationStandard {
    /// ISO 3166-1 alpha-2 code ("FR").
    #[default]
    Iso2,
    /// ISO 3166-1 alpha-3 code ("FRA").
    Iso3,
    /// Display name ("France").
    Name,
    /// ISO 3166-1 numeric code ("250").
    Num,
}

impl LocationStandard {
    pub const ALL: [LocationStandard; 4] = [Self::Iso2, Self::Iso3, Self::Name, Self::Num];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Iso2 => "iso2",
            Self::Iso3 => "iso3",
            Self::Name => "name",
            Self::Num => "num",
        }
    }

    /// Whether values in this standard are codes rather than free text.
    pub fn is_code(&self) -> bool {
        !matches!(self, Self::Name)
    }
}

impl fmt::Display for LocationStandard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationStandard {
    type Err = CoaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iso2" => Ok(Self::Iso2),
            "iso3" => Ok(Self::Iso3),
            "name" => Ok(Self::Name),
            "num" => Ok(Self::Num),
            _ => Err(invalid("standard", s, &Self::ALL.map(|v| v.as_str()))),
        }
    }
}

/// Administrative level of a dataset's location column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Country,
    Region,
    Subregion,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Country => "country",
            Self::Region => "region",
            Self::Subregion => "subregion",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = CoaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "country" => Ok(Self::Country),
            "region" => Ok(Self::Region),
            "subregion" => Ok(Self::Subregion),
            _ => Err(CoaError::GranularityError {
                value: s.to_string(),
            }),
        }
    }
}

/// How a dataset spells its locations: by code or by display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationMode {
    Code,
    Name,
}

impl LocationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Name => "name",
        }
    }
}

impl FromStr for LocationMode {
    type Err = CoaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "code" => Ok(Self::Code),
            "name" => Ok(Self::Name),
            _ => Err(invalid("location mode", s, &["code", "name"])),
        }
    }
}

/// Identifier flavour returned by hierarchy lookups.
pub type IdentifierKind = LocationMode;

/// Geometry layout of a country hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryView {
    /// Geometry as published by the source.
    #[default]
    Natural,
    /// Detached territories moved next to the mainland.
    Dense,
    /// Dense, plus a magnified inset of a packed area.
    Exploded,
    /// Detached territories removed.
    Main,
}

impl GeometryView {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Natural => "natural",
            Self::Dense => "dense",
            Self::Exploded => "exploded",
            Self::Main => "main",
        }
    }
}

impl fmt::Display for GeometryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shape of a resolver result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputKind {
    #[default]
    List,
    /// Input string to canonical value.
    Map,
    /// Two-column table (`input`, `output`).
    Table,
}

impl FromStr for OutputKind {
    type Err = CoaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "list" => Ok(Self::List),
            "dict" | "map" => Ok(Self::Map),
            "table" | "dataframe" => Ok(Self::Table),
            _ => Err(invalid("output", s, &["list", "dict", "table"])),
        }
    }
}

fn invalid(argument: &'static str, value: &str, expected: &[&str]) -> CoaError {
    CoaError::InvalidArgument {
        argument,
        value: value.to_string(),
        expected: expected.join(", "),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn standards_parse_case_insensitively() {
        assert_eq!("ISO3".parse::<LocationStandard>().unwrap(), LocationStandard::Iso3);
        assert_eq!(" num ".parse::<LocationStandard>().unwrap(), LocationStandard::Num);
        let err = "iso4".parse::<LocationStandard>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("iso2, iso3, name, num"));
    }

    #[test]
    fn default_standard_is_two_letter_code() {
        assert_eq!(LocationStandard::default(), LocationStandard::Iso2);
    }

    #[test]
    fn unknown_granularity_is_granularity_error() {
        let err = "province".parse::<Granularity>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GranularityError);
        assert_eq!("Subregion".parse::<Granularity>().unwrap(), Granularity::Subregion);
    }

    #[test]
    fn output_kind_accepts_dict_alias() {
        assert_eq!("dict".parse::<OutputKind>().unwrap(), OutputKind::Map);
        assert_eq!(
            "csv".parse::<OutputKind>().unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }
}
