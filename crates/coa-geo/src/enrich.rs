//! Country attribute enrichment.
//!
//! [`AttributeEnricher::add_field`] appends per-country columns to any table
//! whose key column holds country names or codes. Keys are resolved once per
//! distinct value; reference tables are fetched on first use and kept for
//! the lifetime of the enricher.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use coa_ingest::{ReadOptions, ReferenceFetcher, SourceTable, parse_number};
use coa_model::{CoaConfig, CoaError, DemographicsSource, Result};
use coa_standards::CountryRecord;
use polars::prelude::{DataFrame, NamedFrom, Series};

use crate::country::{read_features, to_geojson_string};
use crate::frame::{check_new_fields, text_values};
use crate::regions::RegionCatalog;
use crate::resolver::LocationResolver;

/// Properties of world geometry features that may hold the alpha-3 code.
const GEOMETRY_KEYS: [&str; 4] = ["ISO3166-1-Alpha-3", "ISO_A3", "iso_a3", "id"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnrichField {
    ContinentCode,
    ContinentName,
    CountryName,
    Population,
    Area,
    Fertility,
    MedianAge,
    UrbanRate,
    Geometry,
    RegionCodeList,
    RegionNameList,
    Capital,
    Flag,
}

impl EnrichField {
    pub const ALL: [EnrichField; 13] = [
        Self::ContinentCode,
        Self::ContinentName,
        Self::CountryName,
        Self::Population,
        Self::Area,
        Self::Fertility,
        Self::MedianAge,
        Self::UrbanRate,
        Self::Geometry,
        Self::RegionCodeList,
        Self::RegionNameList,
        Self::Capital,
        Self::Flag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContinentCode => "continent_code",
            Self::ContinentName => "continent_name",
            Self::CountryName => "country_name",
            Self::Population => "population",
            Self::Area => "area",
            Self::Fertility => "fertility",
            Self::MedianAge => "median_age",
            Self::UrbanRate => "urban_rate",
            Self::Geometry => "geometry",
            Self::RegionCodeList => "region_code_list",
            Self::RegionNameList => "region_name_list",
            Self::Capital => "capital",
            Self::Flag => "flag",
        }
    }
}

impl fmt::Display for EnrichField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EnrichField {
    type Err = CoaError;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == key)
            .ok_or_else(|| CoaError::UnknownField {
                field: s.to_string(),
                available: Self::ALL.map(|f| f.as_str()).join(", "),
            })
    }
}

/// Where the enricher's reference tables live.
#[derive(Debug, Clone)]
pub struct EnricherSources {
    pub geometry_url: String,
    pub demographics: DemographicsSource,
    /// `{alpha2}` is replaced by the lowercase alpha-2 code.
    pub flag_url_template: String,
    pub max_age: Duration,
}

impl EnricherSources {
    pub fn from_config(config: &CoaConfig) -> Self {
        Self {
            geometry_url: config.sources.world_geometry_url.clone(),
            demographics: config.sources.demographics.clone(),
            flag_url_template: config.sources.flag_url_template.clone(),
            max_age: config.cache.max_age(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Demographics {
    population: Option<f64>,
    area: Option<f64>,
    fertility: Option<f64>,
    median_age: Option<f64>,
    urban_rate: Option<f64>,
}

impl Demographics {
    fn get(&self, field: EnrichField) -> Option<f64> {
        match field {
            EnrichField::Population => self.population,
            EnrichField::Area => self.area,
            EnrichField::Fertility => self.fertility,
            EnrichField::MedianAge => self.median_age,
            EnrichField::UrbanRate => self.urban_rate,
            _ => None,
        }
    }
}

pub struct AttributeEnricher {
    fetcher: Arc<dyn ReferenceFetcher>,
    resolver: LocationResolver,
    regions: Arc<RegionCatalog>,
    sources: EnricherSources,
    demographics: OnceLock<HashMap<String, Demographics>>,
    geometry: OnceLock<HashMap<String, String>>,
}

impl fmt::Debug for AttributeEnricher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttributeEnricher")
            .field("sources", &self.sources)
            .field("demographics_loaded", &self.demographics.get().is_some())
            .field("geometry_loaded", &self.geometry.get().is_some())
            .finish_non_exhaustive()
    }
}

impl AttributeEnricher {
    pub fn new(
        fetcher: Arc<dyn ReferenceFetcher>,
        resolver: LocationResolver,
        regions: Arc<RegionCatalog>,
        sources: EnricherSources,
    ) -> Self {
        Self {
            fetcher,
            resolver,
            regions,
            sources,
            demographics: OnceLock::new(),
            geometry: OnceLock::new(),
        }
    }

    /// Appends `fields` to `table`, keyed by the locations in `geofield`.
    ///
    /// Rows whose location does not resolve get nulls (empty lists for the
    /// region list fields).
    pub fn add_field<S: AsRef<str>>(
        &self,
        table: &mut DataFrame,
        fields: &[S],
        geofield: &str,
        overload: bool,
    ) -> Result<()> {
        let requested = fields
            .iter()
            .map(|field| field.as_ref().parse::<EnrichField>())
            .collect::<Result<Vec<_>>>()?;
        check_new_fields(table, fields, overload)?;

        let records = self.resolve_keys(&text_values(table, geofield)?);
        for field in requested {
            let series = self.build_column(field, &records)?;
            table.with_column(series)?;
        }
        Ok(())
    }

    fn resolve_keys(&self, keys: &[Option<String>]) -> Vec<Option<&'static CountryRecord>> {
        let mut resolved: HashMap<&str, Option<&'static CountryRecord>> = HashMap::new();
        let mut unresolved: Vec<&str> = Vec::new();
        let records = keys
            .iter()
            .map(|key| {
                let key = key.as_deref()?;
                *resolved.entry(key).or_insert_with(|| {
                    match self.resolver.record(key, None) {
                        Ok(record) => record,
                        Err(_) => {
                            unresolved.push(key);
                            None
                        }
                    }
                })
            })
            .collect();
        if !unresolved.is_empty() {
            tracing::warn!(
                count = unresolved.len(),
                locations = ?unresolved,
                "locations left without attributes"
            );
        }
        records
    }

    fn build_column(
        &self,
        field: EnrichField,
        records: &[Option<&'static CountryRecord>],
    ) -> Result<Series> {
        let name = field.as_str().into();
        let series = match field {
            EnrichField::ContinentCode => {
                Series::new(name, text_cells(records, |r| Some(r.continent_code.clone())))
            }
            EnrichField::ContinentName => Series::new(
                name,
                text_cells(records, |r| r.continent_name().map(str::to_string)),
            ),
            EnrichField::CountryName => {
                Series::new(name, text_cells(records, |r| Some(r.name.clone())))
            }
            EnrichField::Capital => Series::new(name, text_cells(records, |r| r.capital.clone())),
            EnrichField::Flag => Series::new(
                name,
                text_cells(records, |r| {
                    Some(
                        self.sources
                            .flag_url_template
                            .replace("{alpha2}", &r.alpha2.to_ascii_lowercase()),
                    )
                }),
            ),
            EnrichField::Geometry => {
                let geometry = self.world_geometry()?;
                Series::new(name, text_cells(records, |r| geometry.get(&r.alpha3).cloned()))
            }
            EnrichField::RegionCodeList | EnrichField::RegionNameList => {
                let lists: Vec<Series> = records
                    .iter()
                    .map(|record| {
                        let values: Vec<String> = record
                            .map(|r| {
                                self.regions
                                    .regions_of(&r.alpha3)
                                    .into_iter()
                                    .map(|region| match field {
                                        EnrichField::RegionCodeList => region.code.clone(),
                                        _ => region.name.clone(),
                                    })
                                    .filter(|value| !value.is_empty())
                                    .collect()
                            })
                            .unwrap_or_default();
                        Series::new("".into(), values)
                    })
                    .collect();
                Series::new(name, lists)
            }
            EnrichField::Population
            | EnrichField::Area
            | EnrichField::Fertility
            | EnrichField::MedianAge
            | EnrichField::UrbanRate => {
                let demographics = self.demographics()?;
                let values: Vec<Option<f64>> = records
                    .iter()
                    .map(|record| {
                        record
                            .and_then(|r| demographics.get(&r.alpha3))
                            .and_then(|d| d.get(field))
                    })
                    .collect();
                Series::new(name, values)
            }
        };
        Ok(series)
    }

    fn demographics(&self) -> Result<&HashMap<String, Demographics>> {
        if let Some(table) = self.demographics.get() {
            return Ok(table);
        }
        let loaded = self.load_demographics()?;
        Ok(self.demographics.get_or_init(|| loaded))
    }

    fn load_demographics(&self) -> Result<HashMap<String, Demographics>> {
        let source = &self.sources.demographics;
        let start = Instant::now();
        let bytes = self.fetcher.fetch(&source.url, self.sources.max_age)?;
        let options = ReadOptions::default().with_separator(&source.separator);
        let table = SourceTable::from_bytes(&bytes, &source.url, &options)?;
        let Some(key_idx) = table.column_index(&source.key_column) else {
            return Err(CoaError::Csv {
                origin: source.url.clone(),
                message: format!("demographics table has no '{}' column", source.key_column),
            });
        };
        let column = |name: &Option<String>| name.as_deref().and_then(|n| table.column_index(n));
        let (population, area, fertility, median_age, urban_rate) = (
            column(&source.population),
            column(&source.area),
            column(&source.fertility),
            column(&source.median_age),
            column(&source.urban_rate),
        );
        let value = |row: &[String], idx: Option<usize>| idx.and_then(|i| parse_number(&row[i], '.'));

        let mut out = HashMap::new();
        for row in &table.rows {
            let key = row[key_idx].trim().to_ascii_uppercase();
            if key.len() != 3 {
                continue;
            }
            out.insert(
                key,
                Demographics {
                    population: value(row, population),
                    area: value(row, area),
                    fertility: value(row, fertility),
                    median_age: value(row, median_age),
                    urban_rate: value(row, urban_rate),
                },
            );
        }
        tracing::info!(
            url = %source.url,
            countries = out.len(),
            duration_ms = start.elapsed().as_millis(),
            "loaded demographics"
        );
        Ok(out)
    }

    fn world_geometry(&self) -> Result<&HashMap<String, String>> {
        if let Some(table) = self.geometry.get() {
            return Ok(table);
        }
        let loaded = self.load_world_geometry()?;
        Ok(self.geometry.get_or_init(|| loaded))
    }

    fn load_world_geometry(&self) -> Result<HashMap<String, String>> {
        let url = &self.sources.geometry_url;
        let start = Instant::now();
        let text = self.fetcher.fetch_text(url, self.sources.max_age)?;
        let catalog = self.resolver.catalog();
        let mut out = HashMap::new();
        for feature in read_features(&text, url)? {
            let alpha3 = GEOMETRY_KEYS
                .iter()
                .filter_map(|key| feature.text(key))
                .map(|value| value.to_ascii_uppercase())
                .find(|value| catalog.by_alpha3(value).is_some());
            if let Some(alpha3) = alpha3 {
                out.insert(alpha3, to_geojson_string(&feature.geometry)?);
            }
        }
        tracing::info!(
            url = %url,
            countries = out.len(),
            duration_ms = start.elapsed().as_millis(),
            "loaded world geometry"
        );
        Ok(out)
    }
}

fn text_cells(
    records: &[Option<&'static CountryRecord>],
    value: impl Fn(&CountryRecord) -> Option<String>,
) -> Vec<Option<String>> {
    records
        .iter()
        .map(|record| record.and_then(&value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use coa_ingest::StaticFetcher;
    use coa_model::ErrorKind;
    use polars::prelude::IntoColumn;

    const DEMOGRAPHICS_URL: &str = "mem://demographics.csv";
    const GEOMETRY_URL: &str = "mem://world.geojson";

    fn sources() -> EnricherSources {
        EnricherSources {
            geometry_url: GEOMETRY_URL.to_string(),
            demographics: DemographicsSource {
                url: DEMOGRAPHICS_URL.to_string(),
                separator: ";".to_string(),
                key_column: "iso3".to_string(),
                population: Some("pop".to_string()),
                area: Some("area".to_string()),
                fertility: None,
                median_age: None,
                urban_rate: None,
            },
            flag_url_template: "https://flags.test/{alpha2}.png".to_string(),
            max_age: Duration::from_secs(60),
        }
    }

    fn enricher(fetcher: Arc<StaticFetcher>) -> AttributeEnricher {
        AttributeEnricher::new(
            fetcher,
            LocationResolver::default(),
            Arc::new(RegionCatalog::builtin()),
            sources(),
        )
    }

    fn fetcher() -> Arc<StaticFetcher> {
        Arc::new(
            StaticFetcher::new()
                .with(DEMOGRAPHICS_URL, "iso3;pop;area\nFRA;67000000;551695\nITA;59000000;301340\n")
                .with(
                    GEOMETRY_URL,
                    r#"{"type":"FeatureCollection","features":[
                        {"type":"Feature","properties":{"ISO_A3":"FRA"},
                         "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,0]]]}}]}"#,
                ),
        )
    }

    fn table() -> DataFrame {
        DataFrame::new(vec![
            Series::new("where".into(), vec!["France", "ITA", "Atlantis"]).into_column(),
        ])
        .unwrap()
    }

    #[test]
    fn static_fields_need_no_fetch() {
        let fetcher = fetcher();
        let enricher = enricher(Arc::clone(&fetcher));
        let mut df = table();
        enricher
            .add_field(&mut df, &["continent_name", "capital", "flag"], "where", false)
            .unwrap();
        let continents = df.column("continent_name").unwrap().str().unwrap();
        assert_eq!(continents.get(0), Some("Europe"));
        assert_eq!(continents.get(2), None);
        let flags = df.column("flag").unwrap().str().unwrap();
        assert_eq!(flags.get(1), Some("https://flags.test/it.png"));
        assert!(fetcher.requests().is_empty());
    }

    #[test]
    fn demographics_are_fetched_once() {
        let fetcher = fetcher();
        let enricher = enricher(Arc::clone(&fetcher));
        let mut df = table();
        enricher.add_field(&mut df, &["population"], "where", false).unwrap();
        enricher.add_field(&mut df, &["area"], "where", false).unwrap();
        let population = df.column("population").unwrap().f64().unwrap();
        assert_eq!(population.get(0), Some(67_000_000.0));
        assert_eq!(population.get(2), None);
        assert_eq!(fetcher.requests(), vec![DEMOGRAPHICS_URL.to_string()]);
    }

    #[test]
    fn geometry_and_region_lists() {
        let enricher = enricher(fetcher());
        let mut df = table();
        enricher
            .add_field(&mut df, &["geometry", "region_name_list"], "where", false)
            .unwrap();
        let geometry = df.column("geometry").unwrap().str().unwrap();
        assert!(geometry.get(0).unwrap().contains("MultiPolygon"));
        assert_eq!(geometry.get(1), None);
        let lists = df.column("region_name_list").unwrap().list().unwrap();
        let france = lists.get_as_series(0).unwrap();
        let names: Vec<&str> = france.str().unwrap().into_no_null_iter().collect();
        assert!(names.contains(&"G7"));
        assert!(names.contains(&"European Union"));
    }

    #[test]
    fn unknown_and_conflicting_fields() {
        let enricher = enricher(fetcher());
        let mut df = table();
        let err = enricher
            .add_field(&mut df, &["gdp"], "where", false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownField);
        let err = enricher
            .add_field(&mut df, &["where"], "where", false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownField);

        enricher.add_field(&mut df, &["capital"], "where", false).unwrap();
        let err = enricher
            .add_field(&mut df, &["capital"], "where", false)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldConflict);
        enricher.add_field(&mut df, &["capital"], "where", true).unwrap();
    }
}
