//! Per-country adapters.
//!
//! Each supported country is described by a [`CountryAdapter`]: where its
//! subregion geometry comes from, which GeoJSON properties hold codes and
//! names, how subregions group into regions and how the compact geometry
//! views are laid out. Adding a country means registering one more adapter.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use coa_model::{CoaError, Result};
use coa_standards::StandardsCatalog;

use super::adapters;
use super::geometry::{RawFeature, combine};
use super::hierarchy::SubregionRecord;

/// GeoJSON property names of a subregion feature. `"id"` means the feature id.
#[derive(Debug, Clone, Copy)]
pub struct PropertyMap {
    pub subregion_code: &'static str,
    pub subregion_name: &'static str,
    /// Absent when regions come from the adapter's region table.
    pub region_code: Option<&'static str>,
    pub region_name: Option<&'static str>,
    pub population: Option<&'static str>,
    pub area: Option<&'static str>,
}

/// A detached territory shown next to the mainland in the dense view.
#[derive(Debug, Clone, Copy)]
pub struct Relocation {
    pub subregion_code: &'static str,
    /// Where the territory's centroid is moved.
    pub anchor: (f64, f64),
    pub scale: f64,
}

/// A packed area magnified in the exploded view.
#[derive(Debug, Clone, Copy)]
pub struct Inset {
    pub subregion_codes: &'static [&'static str],
    pub factor: f64,
    /// Where the magnified area's centroid is moved.
    pub anchor: (f64, f64),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ViewLayout {
    pub relocations: &'static [Relocation],
    pub inset: Option<Inset>,
}

impl ViewLayout {
    pub fn is_relocated(&self, subregion_code: &str) -> bool {
        self.relocations
            .iter()
            .any(|r| r.subregion_code == subregion_code)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CountryAdapter {
    pub alpha3: &'static str,
    /// GeoJSON feature collection of subregions.
    pub source_url: &'static str,
    pub properties: PropertyMap,
    /// CSV `subregion_code,region_code,region_name`.
    pub region_table: Option<&'static str>,
    pub post_process: fn(&mut SubregionRecord),
    pub layout: ViewLayout,
}

fn no_post_process(_: &mut SubregionRecord) {}

impl CountryAdapter {
    pub const fn new(alpha3: &'static str, source_url: &'static str, properties: PropertyMap) -> Self {
        Self {
            alpha3,
            source_url,
            properties,
            region_table: None,
            post_process: no_post_process,
            layout: ViewLayout {
                relocations: &[],
                inset: None,
            },
        }
    }

    /// Subregion → (region code, region name) from the embedded table.
    fn region_lookup(&self) -> HashMap<String, (String, String)> {
        let Some(table) = self.region_table else {
            return HashMap::new();
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(table.as_bytes());
        let mut lookup = HashMap::new();
        for record in reader.records().flatten() {
            if let (Some(sub), Some(code), Some(name)) = (record.get(0), record.get(1), record.get(2)) {
                lookup.insert(sub.trim().to_string(), (code.trim().to_string(), name.trim().to_string()));
            }
        }
        lookup
    }

    /// Turns raw features into subregion records.
    ///
    /// Features sharing a subregion code are merged; features without a
    /// code or a region are dropped with a warning.
    pub fn build_records(&self, features: Vec<RawFeature>) -> Result<Vec<SubregionRecord>> {
        let regions = self.region_lookup();
        let props = &self.properties;
        let mut by_code: BTreeMap<String, SubregionRecord> = BTreeMap::new();
        let mut dropped = Vec::new();

        for feature in features {
            let Some(code) = feature.text(props.subregion_code) else {
                dropped.push("<no code>".to_string());
                continue;
            };
            let name = feature.text(props.subregion_name).unwrap_or_else(|| code.clone());
            let region = match (props.region_code, props.region_name) {
                (Some(code_key), Some(name_key)) => feature.text(code_key).zip(feature.text(name_key)),
                _ => None,
            };
            let (region_code, region_name) = region.unwrap_or_default();
            let mut record = SubregionRecord {
                code,
                name,
                region_code,
                region_name,
                population: props.population.and_then(|key| feature.number(key)),
                area: props.area.and_then(|key| feature.number(key)),
                geometry: feature.geometry,
            };
            (self.post_process)(&mut record);
            if record.region_code.is_empty() {
                match regions.get(&record.code) {
                    Some((code, name)) => {
                        record.region_code = code.clone();
                        record.region_name = name.clone();
                    }
                    None => {
                        dropped.push(record.code);
                        continue;
                    }
                }
            }

            match by_code.get_mut(&record.code) {
                Some(existing) => {
                    existing.geometry = combine([&existing.geometry, &record.geometry]);
                    existing.population = sum_optional(existing.population, record.population);
                    existing.area = sum_optional(existing.area, record.area);
                }
                None => {
                    by_code.insert(record.code.clone(), record);
                }
            }
        }

        if !dropped.is_empty() {
            tracing::warn!(
                country = self.alpha3,
                count = dropped.len(),
                subregions = ?dropped,
                "subregions without code or region dropped"
            );
        }
        let records: Vec<SubregionRecord> = by_code.into_values().collect();
        check_region_names(self, &records)?;
        if records.is_empty() {
            return Err(CoaError::fetch(
                self.source_url,
                format!("no usable subregion in geometry of {}", self.alpha3),
            ));
        }
        Ok(records)
    }
}

fn sum_optional(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    }
}

/// Region codes must name one region each.
fn check_region_names(adapter: &CountryAdapter, records: &[SubregionRecord]) -> Result<()> {
    let mut names: HashMap<&str, &str> = HashMap::new();
    for record in records {
        let first = names
            .entry(record.region_code.as_str())
            .or_insert(record.region_name.as_str());
        if *first != record.region_name {
            return Err(CoaError::fetch(
                adapter.source_url,
                format!(
                    "region code {} of {} is named both '{}' and '{}'",
                    record.region_code, adapter.alpha3, first, record.region_name
                ),
            ));
        }
    }
    Ok(())
}

/// Registry of country adapters keyed by alpha-3 code.
#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    adapters: BTreeMap<&'static str, CountryAdapter>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// France, United States and Italy.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(adapters::france());
        registry.register(adapters::united_states());
        registry.register(adapters::italy());
        registry
    }

    pub fn register(&mut self, adapter: CountryAdapter) {
        self.adapters.insert(adapter.alpha3, adapter);
    }

    pub fn supported(&self) -> Vec<&'static str> {
        self.adapters.keys().copied().collect()
    }

    /// Adapter for `country`, given as any code or name.
    pub fn get(&self, country: &str) -> Result<&CountryAdapter> {
        StandardsCatalog::global()
            .lookup(country)
            .and_then(|record| self.adapters.get(record.alpha3.as_str()))
            .ok_or_else(|| CoaError::UnsupportedCountry {
                country: country.to_string(),
                supported: self.supported().join(", "),
            })
    }
}

static DEFAULT_REGISTRY: OnceLock<AdapterRegistry> = OnceLock::new();

/// Shared registry with the builtin adapters.
pub fn default_registry() -> &'static AdapterRegistry {
    DEFAULT_REGISTRY.get_or_init(AdapterRegistry::with_builtin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coa_model::ErrorKind;

    #[test]
    fn registry_accepts_any_identifier() {
        let registry = default_registry();
        assert_eq!(registry.get("FR").unwrap().alpha3, "FRA");
        assert_eq!(registry.get("italy").unwrap().alpha3, "ITA");
        assert_eq!(registry.get("840").unwrap().alpha3, "USA");
        assert_eq!(registry.supported(), vec!["FRA", "ITA", "USA"]);
    }

    fn regional_adapter() -> CountryAdapter {
        CountryAdapter::new(
            "ITA",
            "mem://ita.geojson",
            PropertyMap {
                subregion_code: "code",
                subregion_name: "name",
                region_code: Some("reg"),
                region_name: Some("reg_name"),
                population: None,
                area: None,
            },
        )
    }

    fn features(regions: [(&str, &str, &str); 2]) -> Vec<RawFeature> {
        let features: Vec<String> = regions
            .iter()
            .enumerate()
            .map(|(idx, (code, reg, reg_name))| {
                let x = idx as f64;
                format!(
                    r#"{{"type":"Feature","properties":{{"code":"{code}","name":"{code}","reg":"{reg}","reg_name":"{reg_name}"}},
                       "geometry":{{"type":"Polygon","coordinates":[[[{x},0],[{x},1],[1.5,1],[{x},0]]]}}}}"#
                )
            })
            .collect();
        let text = format!(r#"{{"type":"FeatureCollection","features":[{}]}}"#, features.join(","));
        crate::country::read_features(&text, "mem://ita.geojson").unwrap()
    }

    #[test]
    fn region_code_with_two_names_is_rejected() {
        let adapter = regional_adapter();
        let err = adapter
            .build_records(features([("001", "01", "Piemonte"), ("015", "01", "Lombardia")]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceFetchFailure);
        assert!(err.to_string().contains("Lombardia"));

        let records = adapter
            .build_records(features([("001", "01", "Piemonte"), ("002", "01", "Piemonte")]))
            .unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn unsupported_country() {
        let err = default_registry().get("DEU").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedCountry);
        assert!(err.to_string().contains("FRA, ITA, USA"));
        assert_eq!(
            default_registry().get("Atlantis").unwrap_err().kind(),
            ErrorKind::UnsupportedCountry
        );
    }
}
