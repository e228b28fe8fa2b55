//! Vocabularies of upstream epidemiological databases.
//!
//! Each database spells some places its own way ("Korea, South",
//! "S. Korea", "Republic of Korea"). The alias tables map those raw names to
//! alpha-3 codes; an empty code marks an entry that is not a country
//! (cruise ships, aggregates, international conveyances).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use coa_model::{CaseInsensitiveMap, CoaError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceDatabase {
    /// Johns Hopkins CSSE time series.
    Jhu,
    /// Our World in Data.
    Owid,
    /// World Health Organization dashboard.
    Who,
    Worldometers,
    /// European Centre for Disease Prevention and Control.
    Ecdc,
}

/// What an alias table says about a raw name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasTarget {
    Country(&'static str),
    /// Known entry with no country behind it.
    NotACountry,
}

const JHU: &[(&str, &str)] = &[
    ("Burma", "MMR"),
    ("Cabo Verde", "CPV"),
    ("Congo (Brazzaville)", "COG"),
    ("Congo (Kinshasa)", "COD"),
    ("Cote d'Ivoire", "CIV"),
    ("Diamond Princess", ""),
    ("Holy See", "VAT"),
    ("Korea, North", "PRK"),
    ("Korea, South", "KOR"),
    ("Kosovo", "XKX"),
    ("Laos", "LAO"),
    ("MS Zaandam", ""),
    ("Micronesia", "FSM"),
    ("Summer Olympics 2020", ""),
    ("Taiwan*", "TWN"),
    ("Timor-Leste", "TLS"),
    ("US", "USA"),
    ("West Bank and Gaza", "PSE"),
    ("Winter Olympics 2022", ""),
];

const OWID: &[(&str, &str)] = &[
    ("Africa", ""),
    ("Asia", ""),
    ("Cape Verde", "CPV"),
    ("Congo", "COG"),
    ("Cote d'Ivoire", "CIV"),
    ("Curacao", "CUW"),
    ("Democratic Republic of Congo", "COD"),
    ("Europe", ""),
    ("European Union", ""),
    ("Faeroe Islands", "FRO"),
    ("High income", ""),
    ("International", ""),
    ("Kosovo", "XKX"),
    ("Low income", ""),
    ("Lower middle income", ""),
    ("Micronesia (country)", "FSM"),
    ("North America", ""),
    ("Oceania", ""),
    ("Palestine", "PSE"),
    ("Sint Maarten (Dutch part)", "SXM"),
    ("South America", ""),
    ("Timor", "TLS"),
    ("Upper middle income", ""),
    ("Vatican", "VAT"),
    ("World", ""),
];

const WHO: &[(&str, &str)] = &[
    ("Bolivia (Plurinational State of)", "BOL"),
    ("Bonaire", "BES"),
    ("Democratic People's Republic of Korea", "PRK"),
    ("Democratic Republic of the Congo", "COD"),
    ("Falkland Islands (Malvinas)", "FLK"),
    ("Iran (Islamic Republic of)", "IRN"),
    ("Kosovo[1]", "XKX"),
    ("Lao People's Democratic Republic", "LAO"),
    ("Micronesia (Federated States of)", "FSM"),
    ("Northern Mariana Islands (Commonwealth of the)", "MNP"),
    ("occupied Palestinian territory, including east Jerusalem", "PSE"),
    ("Other", ""),
    ("Republic of Korea", "KOR"),
    ("Republic of Moldova", "MDA"),
    ("Russian Federation", "RUS"),
    ("Saba", "BES"),
    ("Sint Eustatius", "BES"),
    ("Syrian Arab Republic", "SYR"),
    ("The United Kingdom", "GBR"),
    ("Türkiye", "TUR"),
    ("United Republic of Tanzania", "TZA"),
    ("United States of America", "USA"),
    ("Venezuela (Bolivarian Republic of)", "VEN"),
    ("Viet Nam", "VNM"),
];

const WORLDOMETERS: &[(&str, &str)] = &[
    ("CAR", "CAF"),
    ("Caribbean Netherlands", "BES"),
    ("Channel Islands", ""),
    ("Congo", "COG"),
    ("Curaçao", "CUW"),
    ("DPRK", "PRK"),
    ("DRC", "COD"),
    ("Diamond Princess", ""),
    ("Faeroe Islands", "FRO"),
    ("Ivory Coast", "CIV"),
    ("Laos", "LAO"),
    ("MS Zaandam", ""),
    ("Micronesia", "FSM"),
    ("Palestine", "PSE"),
    ("Réunion", "REU"),
    ("S. Korea", "KOR"),
    ("St. Vincent Grenadines", "VCT"),
    ("UAE", "ARE"),
    ("UK", "GBR"),
    ("USA", "USA"),
    ("Vatican City", "VAT"),
];

const ECDC: &[(&str, &str)] = &[
    ("Bonaire, Saint Eustatius and Saba", "BES"),
    ("Cases on an international conveyance Japan", ""),
    ("Congo", "COG"),
    ("Cote dIvoire", "CIV"),
    ("Democratic Republic of the Congo", "COD"),
    ("Falkland Islands (Malvinas)", "FLK"),
    ("Guinea Bissau", "GNB"),
    ("Holy See", "VAT"),
    ("Kosovo", "XKX"),
    ("Palestine", "PSE"),
    ("South Korea", "KOR"),
    ("Timor Leste", "TLS"),
    ("Turks and Caicos islands", "TCA"),
    ("United Kingdom", "GBR"),
    ("United Republic of Tanzania", "TZA"),
    ("United States of America", "USA"),
    ("United States Virgin Islands", "VIR"),
];

static TABLES: LazyLock<HashMap<SourceDatabase, CaseInsensitiveMap<&'static str>>> =
    LazyLock::new(|| {
        SourceDatabase::ALL
            .iter()
            .map(|db| {
                let mut map = CaseInsensitiveMap::new();
                for (raw, alpha3) in db.raw_aliases() {
                    map.insert_first(raw, *alpha3);
                }
                (*db, map)
            })
            .collect()
    });

impl SourceDatabase {
    pub const ALL: [SourceDatabase; 5] = [
        Self::Jhu,
        Self::Owid,
        Self::Who,
        Self::Worldometers,
        Self::Ecdc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jhu => "jhu",
            Self::Owid => "owid",
            Self::Who => "who",
            Self::Worldometers => "worldometers",
            Self::Ecdc => "ecdc",
        }
    }

    fn raw_aliases(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Jhu => JHU,
            Self::Owid => OWID,
            Self::Who => WHO,
            Self::Worldometers => WORLDOMETERS,
            Self::Ecdc => ECDC,
        }
    }

    /// Undoes source-specific spelling before any lookup.
    ///
    /// ECDC writes names with underscores ("United_States_of_America").
    pub fn normalize<'a>(&self, raw: &'a str) -> std::borrow::Cow<'a, str> {
        match self {
            Self::Ecdc if raw.contains('_') => raw.replace('_', " ").into(),
            _ => raw.into(),
        }
    }

    /// Looks `raw` up in this database's alias table.
    pub fn alias(&self, raw: &str) -> Option<AliasTarget> {
        let normalized = self.normalize(raw);
        TABLES
            .get(self)
            .and_then(|map| map.get(&normalized))
            .map(|alpha3| match *alpha3 {
                "" => AliasTarget::NotACountry,
                code => AliasTarget::Country(code),
            })
    }

    /// Number of aliases known for this database.
    pub fn alias_count(&self) -> usize {
        self.raw_aliases().len()
    }
}

impl fmt::Display for SourceDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceDatabase {
    type Err = CoaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|db| db.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| CoaError::UnsupportedSource {
                database: s.to_string(),
                known: Self::ALL.map(|db| db.as_str()).join(", "),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StandardsCatalog;
    use coa_model::ErrorKind;

    #[test]
    fn jhu_congo_aliases() {
        assert_eq!(
            SourceDatabase::Jhu.alias("Congo (Kinshasa)"),
            Some(AliasTarget::Country("COD"))
        );
        assert_eq!(
            SourceDatabase::Jhu.alias("congo (brazzaville)"),
            Some(AliasTarget::Country("COG"))
        );
        assert_eq!(
            SourceDatabase::Jhu.alias("Diamond Princess"),
            Some(AliasTarget::NotACountry)
        );
        assert_eq!(SourceDatabase::Jhu.alias("France"), None);
    }

    #[test]
    fn ecdc_underscores_are_spaces() {
        assert_eq!(
            SourceDatabase::Ecdc.alias("United_States_of_America"),
            Some(AliasTarget::Country("USA"))
        );
        assert_eq!(
            SourceDatabase::Ecdc.alias("Cases_on_an_international_conveyance_Japan"),
            Some(AliasTarget::NotACountry)
        );
    }

    #[test]
    fn unknown_database_is_unsupported_source() {
        assert_eq!("WHO".parse::<SourceDatabase>().unwrap(), SourceDatabase::Who);
        let err = "csse".parse::<SourceDatabase>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedSource);
        assert!(err.to_string().contains("jhu, owid, who, worldometers, ecdc"));
    }

    #[test]
    fn every_alias_points_at_a_known_country() {
        let catalog = StandardsCatalog::global();
        for db in SourceDatabase::ALL {
            for (raw, alpha3) in db.raw_aliases() {
                if !alpha3.is_empty() {
                    assert!(
                        catalog.by_alpha3(alpha3).is_some(),
                        "{db}: {raw} -> {alpha3}"
                    );
                }
            }
        }
    }
}
