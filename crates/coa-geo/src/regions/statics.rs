//! Hardcoded country groupings.

/// A fixed membership list.
pub struct StaticGroup {
    pub code: &'static str,
    pub name: &'static str,
    pub source: &'static str,
    pub members: &'static [&'static str],
}

/// A region made of other regions plus extra members.
pub struct UnionGroup {
    pub code: &'static str,
    pub name: &'static str,
    pub source: &'static str,
    pub parts: &'static [&'static str],
    pub extra: &'static [&'static str],
}

const G7: &[&str] = &["CAN", "FRA", "DEU", "ITA", "JPN", "GBR", "USA"];

const G8: &[&str] = &["CAN", "FRA", "DEU", "ITA", "JPN", "GBR", "USA", "RUS"];

const G20: &[&str] = &[
    "ARG", "AUS", "BRA", "CAN", "CHN", "FRA", "DEU", "IND", "IDN", "ITA", "JPN", "KOR", "MEX",
    "RUS", "SAU", "ZAF", "TUR", "GBR", "USA",
];

const EUROPEAN_UNION: &[&str] = &[
    "AUT", "BEL", "BGR", "HRV", "CYP", "CZE", "DNK", "EST", "FIN", "FRA", "DEU", "GRC", "HUN",
    "IRL", "ITA", "LVA", "LTU", "LUX", "MLT", "NLD", "POL", "PRT", "ROU", "SVK", "SVN", "ESP",
    "SWE",
];

const EURO_AREA: &[&str] = &[
    "AUT", "BEL", "HRV", "CYP", "EST", "FIN", "FRA", "DEU", "GRC", "IRL", "ITA", "LVA", "LTU",
    "LUX", "MLT", "NLD", "PRT", "SVK", "SVN", "ESP",
];

const OECD: &[&str] = &[
    "AUS", "AUT", "BEL", "CAN", "CHL", "COL", "CRI", "CZE", "DNK", "EST", "FIN", "FRA", "DEU",
    "GRC", "HUN", "ISL", "IRL", "ISR", "ITA", "JPN", "KOR", "LVA", "LTU", "LUX", "MEX", "NLD",
    "NZL", "NOR", "POL", "PRT", "SVK", "SVN", "ESP", "SWE", "CHE", "TUR", "GBR", "USA",
];

const BRICS: &[&str] = &["BRA", "RUS", "IND", "CHN", "ZAF"];

const ASEAN: &[&str] = &[
    "BRN", "KHM", "IDN", "LAO", "MYS", "MMR", "PHL", "SGP", "THA", "VNM",
];

const MERCOSUR: &[&str] = &["ARG", "BRA", "PRY", "URY"];

const UEMOA: &[&str] = &["BEN", "BFA", "CIV", "GNB", "MLI", "NER", "SEN", "TGO"];

const CEMAC: &[&str] = &["CMR", "CAF", "TCD", "COG", "GNQ", "GAB"];

pub const STATIC_GROUPS: &[StaticGroup] = &[
    StaticGroup {
        code: "G7",
        name: "G7",
        source: "https://en.wikipedia.org/wiki/Group_of_Seven",
        members: G7,
    },
    StaticGroup {
        code: "G8",
        name: "G8",
        source: "https://en.wikipedia.org/wiki/Group_of_Eight",
        members: G8,
    },
    StaticGroup {
        code: "G20",
        name: "G20",
        source: "https://en.wikipedia.org/wiki/G20",
        members: G20,
    },
    StaticGroup {
        code: "EUU",
        name: "European Union",
        source: "https://european-union.europa.eu/principles-countries-history/country-profiles_en",
        members: EUROPEAN_UNION,
    },
    StaticGroup {
        code: "EMU",
        name: "Euro Area",
        source: "https://www.ecb.europa.eu/euro/intro/html/index.en.html",
        members: EURO_AREA,
    },
    StaticGroup {
        code: "OED",
        name: "OECD",
        source: "https://www.oecd.org/en/about/members-partners.html",
        members: OECD,
    },
    StaticGroup {
        code: "BRICS",
        name: "BRICS",
        source: "https://en.wikipedia.org/wiki/BRICS",
        members: BRICS,
    },
    StaticGroup {
        code: "ASEAN",
        name: "ASEAN",
        source: "https://asean.org/member-states/",
        members: ASEAN,
    },
    StaticGroup {
        code: "MERCOSUR",
        name: "Mercosur",
        source: "https://en.wikipedia.org/wiki/Mercosur",
        members: MERCOSUR,
    },
    StaticGroup {
        code: "UEMOA",
        name: "UEMOA",
        source: "https://en.wikipedia.org/wiki/West_African_Economic_and_Monetary_Union",
        members: UEMOA,
    },
    StaticGroup {
        code: "CEMAC",
        name: "CEMAC",
        source: "https://en.wikipedia.org/wiki/Economic_and_Monetary_Community_of_Central_Africa",
        members: CEMAC,
    },
];

pub const UNION_GROUPS: &[UnionGroup] = &[UnionGroup {
    code: "EEA",
    name: "European Economic Area",
    source: "https://en.wikipedia.org/wiki/European_Economic_Area",
    parts: &["European Union"],
    extra: &["ISL", "LIE", "NOR"],
}];
