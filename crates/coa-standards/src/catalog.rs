//! Country reference catalog.
//!
//! One [`CountryRecord`] per ISO 3166-1 entry, indexed by every identifier
//! so converting between standards always goes through the same record.

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::OnceLock;

use coa_model::{CaseInsensitiveMap, CoaError, LocationStandard, Result};
use serde::Deserialize;

use crate::embedded::{COUNTRIES_CSV, COUNTRIES_ORIGIN};

/// Continent codes of the embedded table and their display names.
pub const CONTINENTS: [(&str, &str); 7] = [
    ("AF", "Africa"),
    ("AN", "Antarctica"),
    ("AS", "Asia"),
    ("EU", "Europe"),
    ("NA", "North America"),
    ("OC", "Oceania"),
    ("SA", "South America"),
];

/// Widely used names that are neither the display name nor the ISO name.
const COMMON_NAMES: &[(&str, &str)] = &[
    ("Cabo Verde", "CPV"),
    ("Czech Republic", "CZE"),
    ("East Timor", "TLS"),
    ("Great Britain", "GBR"),
    ("Ivory Coast", "CIV"),
    ("Macedonia", "MKD"),
    ("Swaziland", "SWZ"),
    ("Turkiye", "TUR"),
    ("UK", "GBR"),
    ("United States of America", "USA"),
    ("Vatican City", "VAT"),
    ("Viet Nam", "VNM"),
];

pub fn continent_name(code: &str) -> Option<&'static str> {
    CONTINENTS
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, name)| *name)
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CountryRecord {
    pub alpha2: String,
    pub alpha3: String,
    #[serde(deserialize_with = "empty_as_none")]
    pub numeric: Option<String>,
    /// Short display name ("South Korea").
    pub name: String,
    /// ISO 3166 official short name ("Korea, Republic of").
    pub iso_name: String,
    pub continent_code: String,
    #[serde(deserialize_with = "empty_as_none")]
    pub capital: Option<String>,
}

impl CountryRecord {
    /// Identifier of this country in `standard`, if it has one.
    pub fn identifier(&self, standard: LocationStandard) -> Option<&str> {
        match standard {
            LocationStandard::Iso2 => Some(&self.alpha2),
            LocationStandard::Iso3 => Some(&self.alpha3),
            LocationStandard::Name => Some(&self.name),
            LocationStandard::Num => self.numeric.as_deref(),
        }
    }

    pub fn continent_name(&self) -> Option<&'static str> {
        continent_name(&self.continent_code)
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let trimmed = raw.trim();
    Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
}

/// Indexed country table.
#[derive(Debug, Clone, Default)]
pub struct StandardsCatalog {
    records: Vec<CountryRecord>,
    by_alpha2: HashMap<String, usize>,
    by_alpha3: HashMap<String, usize>,
    by_numeric: HashMap<String, usize>,
    by_name: CaseInsensitiveMap<usize>,
}

static GLOBAL: OnceLock<StandardsCatalog> = OnceLock::new();

impl StandardsCatalog {
    /// Process-wide catalog built from the embedded table.
    pub fn global() -> &'static StandardsCatalog {
        GLOBAL.get_or_init(|| {
            let records = read_records_lenient(COUNTRIES_CSV, COUNTRIES_ORIGIN);
            tracing::debug!(countries = records.len(), "loaded embedded country table");
            Self::from_records(records)
        })
    }

    /// Builds a catalog from CSV text with the embedded table's columns.
    pub fn from_csv_str(content: &str, origin: &str) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(Cursor::new(content.as_bytes()));
        let mut records = Vec::new();
        for row in reader.deserialize::<CountryRecord>() {
            let record = row.map_err(|e| CoaError::Csv {
                origin: origin.to_string(),
                message: e.to_string(),
            })?;
            records.push(record);
        }
        Ok(Self::from_records(records))
    }

    pub fn from_records(records: Vec<CountryRecord>) -> Self {
        let mut catalog = Self {
            records,
            ..Self::default()
        };
        for (idx, record) in catalog.records.iter().enumerate() {
            catalog
                .by_alpha2
                .entry(record.alpha2.to_ascii_uppercase())
                .or_insert(idx);
            catalog
                .by_alpha3
                .entry(record.alpha3.to_ascii_uppercase())
                .or_insert(idx);
            if let Some(numeric) = &record.numeric {
                catalog.by_numeric.entry(pad_numeric(numeric)).or_insert(idx);
            }
            catalog.by_name.insert_first(&record.name, idx);
            catalog.by_name.insert_first(&record.iso_name, idx);
        }
        for (name, alpha3) in COMMON_NAMES {
            if let Some(&idx) = catalog.by_alpha3.get(*alpha3) {
                catalog.by_name.insert_first(name, idx);
            }
        }
        catalog
    }

    pub fn records(&self) -> &[CountryRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn by_alpha2(&self, code: &str) -> Option<&CountryRecord> {
        self.by_alpha2
            .get(&code.trim().to_ascii_uppercase())
            .map(|&idx| &self.records[idx])
    }

    pub fn by_alpha3(&self, code: &str) -> Option<&CountryRecord> {
        self.by_alpha3
            .get(&code.trim().to_ascii_uppercase())
            .map(|&idx| &self.records[idx])
    }

    /// Numeric lookup; "40" and "040" name the same country.
    pub fn by_numeric(&self, code: &str) -> Option<&CountryRecord> {
        self.by_numeric
            .get(&pad_numeric(code))
            .map(|&idx| &self.records[idx])
    }

    /// Display name, ISO name or common name, ignoring case and spacing.
    pub fn by_name(&self, name: &str) -> Option<&CountryRecord> {
        self.by_name.get(name).map(|&idx| &self.records[idx])
    }

    /// Value lookup in one standard.
    pub fn get(&self, standard: LocationStandard, value: &str) -> Option<&CountryRecord> {
        match standard {
            LocationStandard::Iso2 => self.by_alpha2(value),
            LocationStandard::Iso3 => self.by_alpha3(value),
            LocationStandard::Name => self.by_name(value),
            LocationStandard::Num => self.by_numeric(value),
        }
    }

    /// Exact lookup trying every identifier shape before names.
    pub fn lookup(&self, raw: &str) -> Option<&CountryRecord> {
        let value = raw.trim();
        if value.is_empty() {
            return None;
        }
        if value.chars().all(|c| c.is_ascii_digit()) {
            return self.by_numeric(value);
        }
        let by_code = match value.len() {
            2 if value.chars().all(|c| c.is_ascii_alphabetic()) => self.by_alpha2(value),
            3 if value.chars().all(|c| c.is_ascii_alphabetic()) => self.by_alpha3(value),
            _ => None,
        };
        by_code.or_else(|| self.by_name(value))
    }

    /// Converts `value` from one standard to another.
    pub fn convert(
        &self,
        value: &str,
        from: LocationStandard,
        to: LocationStandard,
    ) -> Option<&str> {
        self.get(from, value).and_then(|record| record.identifier(to))
    }

    /// Alpha-3 codes grouped by continent name.
    pub fn continents(&self) -> BTreeMap<&'static str, Vec<String>> {
        let mut grouped: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for record in &self.records {
            if let Some(name) = record.continent_name() {
                grouped.entry(name).or_default().push(record.alpha3.clone());
            }
        }
        grouped
    }

    /// Every (name, record index) pair usable as a fuzzy-match target.
    pub fn name_candidates(&self) -> impl Iterator<Item = (&str, &CountryRecord)> {
        self.records.iter().flat_map(|record| {
            let iso = (record.iso_name != record.name).then_some(record.iso_name.as_str());
            std::iter::once(record.name.as_str())
                .chain(iso)
                .map(move |name| (name, record))
        })
    }
}

/// Left-pads a numeric code to three digits ("40" -> "040").
pub fn pad_numeric(code: &str) -> String {
    let trimmed = code.trim();
    match trimmed.parse::<u16>() {
        Ok(value) => format!("{value:03}"),
        Err(_) => trimmed.to_string(),
    }
}

fn read_records_lenient(content: &str, origin: &str) -> Vec<CountryRecord> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(Cursor::new(content.as_bytes()));
    let mut records = Vec::new();
    for (line, row) in reader.deserialize::<CountryRecord>().enumerate() {
        match row {
            Ok(record) => records.push(record),
            Err(error) => {
                tracing::warn!(origin, line = line + 2, %error, "skipping malformed country row");
            }
        }
    }
    records
}
