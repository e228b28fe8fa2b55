//! Per-country region → subregion geometry catalogs.
//!
//! A [`CountryGeometryCatalog`] is built once per supported country from the
//! adapter registered for it. The natural hierarchy is kept as fetched;
//! other geometry views are derived on demand into immutable snapshots and
//! cached per view. Committing a view through `set_*_geometry` is one-way.

mod adapter;
mod adapters;
mod geometry;
mod hierarchy;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use coa_ingest::ReferenceFetcher;
use coa_model::{CoaError, GeometryView, IdentifierKind, LocationMode, Result};
use polars::prelude::DataFrame;

use crate::frame::{check_new_fields, text_values};

pub use adapter::{
    AdapterRegistry, CountryAdapter, Inset, PropertyMap, Relocation, ViewLayout, default_registry,
};
pub use adapters::{france, italy, united_states};
pub use geometry::{RawFeature, bounds, combine, read_features, to_geojson_string};
pub use hierarchy::{
    HierarchySnapshot, LocatedArea, Level, RegionRecord, SubregionRecord, columns, fold_name,
};

/// Options of [`CountryGeometryCatalog::add_field`].
#[derive(Debug, Clone)]
pub struct AddFieldOptions {
    /// Column of the input table holding the join keys.
    pub input_key: String,
    /// Hierarchy column the keys are matched against.
    pub geofield: String,
    /// Forces region level (`true`) or subregion level (`false`); `None`
    /// infers it from `geofield`.
    pub region_merging: Option<bool>,
    /// Replace columns already present in the input table.
    pub overload: bool,
}

impl Default for AddFieldOptions {
    fn default() -> Self {
        Self {
            input_key: coa_model::columns::WHERE.to_string(),
            geofield: columns::SUBREGION_CODE.to_string(),
            region_merging: None,
            overload: false,
        }
    }
}

impl AddFieldOptions {
    pub fn level(&self) -> Level {
        let region_level = self.region_merging.unwrap_or_else(|| {
            self.geofield.contains("region") && !self.geofield.contains("subregion")
        });
        if region_level { Level::Region } else { Level::Subregion }
    }
}

#[derive(Debug)]
pub struct CountryGeometryCatalog {
    adapter: CountryAdapter,
    natural: Arc<HierarchySnapshot>,
    views: Mutex<HashMap<GeometryView, Arc<HierarchySnapshot>>>,
    committed: GeometryView,
}

impl CountryGeometryCatalog {
    /// Fetches the geometry of `country` (any code or name) through `fetcher`.
    pub fn new(country: &str, fetcher: &dyn ReferenceFetcher, max_age: Duration) -> Result<Self> {
        Self::with_registry(country, default_registry(), fetcher, max_age)
    }

    pub fn with_registry(
        country: &str,
        registry: &AdapterRegistry,
        fetcher: &dyn ReferenceFetcher,
        max_age: Duration,
    ) -> Result<Self> {
        let adapter = *registry.get(country)?;
        let start = Instant::now();
        let text = fetcher.fetch_text(adapter.source_url, max_age)?;
        let catalog = Self::from_adapter(adapter, &text)?;
        tracing::info!(
            country = adapter.alpha3,
            subregions = catalog.natural.subregions().len(),
            regions = catalog.natural.regions().len(),
            duration_ms = start.elapsed().as_millis(),
            "loaded country geometry"
        );
        Ok(catalog)
    }

    /// Builds the catalog of `country` from GeoJSON already at hand.
    pub fn from_geojson(country: &str, geojson: &str) -> Result<Self> {
        let adapter = *default_registry().get(country)?;
        Self::from_adapter(adapter, geojson)
    }

    fn from_adapter(adapter: CountryAdapter, geojson: &str) -> Result<Self> {
        let features = read_features(geojson, adapter.source_url)?;
        let records = adapter.build_records(features)?;
        Ok(Self {
            adapter,
            natural: Arc::new(HierarchySnapshot::new(
                adapter.alpha3,
                GeometryView::Natural,
                records,
            )),
            views: Mutex::new(HashMap::new()),
            committed: GeometryView::Natural,
        })
    }

    pub fn country(&self) -> &'static str {
        self.adapter.alpha3
    }

    /// The committed geometry view.
    pub fn view(&self) -> GeometryView {
        self.committed
    }

    /// Hierarchy in the committed view.
    pub fn hierarchy(&self) -> Arc<HierarchySnapshot> {
        self.snapshot(self.committed)
    }

    /// Hierarchy in `view`, derived once and cached. Does not commit `view`.
    pub fn snapshot(&self, view: GeometryView) -> Arc<HierarchySnapshot> {
        if view == GeometryView::Natural {
            return Arc::clone(&self.natural);
        }
        let mut views = self.views.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            views
                .entry(view)
                .or_insert_with(|| Arc::new(self.natural.derive(&self.adapter.layout, view))),
        )
    }

    fn commit(&mut self, view: GeometryView) -> Result<()> {
        if self.committed == view {
            return Ok(());
        }
        if self.committed != GeometryView::Natural {
            return Err(CoaError::StateConflict {
                country: self.adapter.alpha3.to_string(),
                current: self.committed,
                requested: view,
            });
        }
        tracing::debug!(country = self.adapter.alpha3, view = %view, "geometry view committed");
        self.committed = view;
        Ok(())
    }

    /// Detached territories moved next to the mainland.
    pub fn set_dense_geometry(&mut self) -> Result<()> {
        self.commit(GeometryView::Dense)
    }

    /// Dense geometry plus a magnified inset of the most packed area.
    pub fn set_exploded_geometry(&mut self) -> Result<()> {
        self.commit(GeometryView::Exploded)
    }

    /// Detached territories removed.
    pub fn set_main_geometry(&mut self) -> Result<()> {
        self.commit(GeometryView::Main)
    }

    pub fn region_list(&self) -> Result<DataFrame> {
        self.hierarchy().frame(Level::Region)
    }

    pub fn subregion_list(&self) -> Result<DataFrame> {
        self.hierarchy().frame(Level::Subregion)
    }

    /// Subregions of the region given by exactly one of `code` or `name`.
    pub fn subregions_of_region(
        &self,
        code: Option<&str>,
        name: Option<&str>,
        output: IdentifierKind,
    ) -> Result<Vec<String>> {
        let (value, mode) = match (code, name) {
            (Some(code), None) => (code, LocationMode::Code),
            (None, Some(name)) => (name, LocationMode::Name),
            _ => {
                return Err(CoaError::ConflictingArguments {
                    message: "give exactly one of region code or region name".to_string(),
                });
            }
        };
        let hierarchy = self.hierarchy();
        let region = hierarchy
            .find_region(value, mode)
            .ok_or_else(|| CoaError::UnknownRegion {
                region: value.to_string(),
            })?;
        Ok(region
            .subregions
            .iter()
            .filter_map(|code| hierarchy.subregion(code))
            .map(|subregion| match output {
                LocationMode::Code => subregion.code.clone(),
                LocationMode::Name => subregion.name.clone(),
            })
            .collect())
    }

    /// Region containing the subregion `code`.
    pub fn regions_of_subregion(&self, code: &str, output: IdentifierKind) -> Result<String> {
        let hierarchy = self.hierarchy();
        let subregion = hierarchy
            .subregion(code)
            .ok_or_else(|| CoaError::UnknownSubregion {
                code: code.to_string(),
            })?;
        Ok(match output {
            LocationMode::Code => subregion.region_code.clone(),
            LocationMode::Name => subregion.region_name.clone(),
        })
    }

    /// Left-joins hierarchy columns onto `table`.
    ///
    /// Keys of `options.input_key` are matched against `options.geofield`
    /// ignoring case and accents; unmatched rows get nulls.
    pub fn add_field<S: AsRef<str>>(
        &self,
        table: &mut DataFrame,
        fields: &[S],
        options: &AddFieldOptions,
    ) -> Result<()> {
        let level = options.level();
        let available = || {
            HierarchySnapshot::column_names(level)
                .into_iter()
                .filter(|name| !name.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        };
        for field in fields
            .iter()
            .map(AsRef::as_ref)
            .chain(std::iter::once(options.geofield.as_str()))
        {
            if !HierarchySnapshot::has_column(level, field) {
                return Err(CoaError::UnknownField {
                    field: field.to_string(),
                    available: available(),
                });
            }
        }
        check_new_fields(table, fields, options.overload)?;

        let hierarchy = self.hierarchy();
        let index: HashMap<String, usize> = hierarchy
            .keys(level, &options.geofield)?
            .iter()
            .enumerate()
            .map(|(idx, key)| (fold_name(key), idx))
            .collect();
        let rows: Vec<Option<usize>> = text_values(table, &options.input_key)?
            .iter()
            .map(|key| key.as_deref().and_then(|k| index.get(&fold_name(k)).copied()))
            .collect();
        let unmatched = rows.iter().filter(|row| row.is_none()).count();
        if unmatched > 0 {
            tracing::debug!(
                country = self.adapter.alpha3,
                geofield = %options.geofield,
                unmatched,
                "rows without a hierarchy match"
            );
        }
        for field in fields {
            let series = hierarchy.gather(level, field.as_ref(), &rows)?;
            table.with_column(series)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coa_model::ErrorKind;
    use geo::Centroid;
    use polars::prelude::{IntoColumn, NamedFrom, Series};

    fn square(x: f64, y: f64, size: f64) -> String {
        format!(
            r#"{{"type":"Polygon","coordinates":[[[{x},{y}],[{x2},{y}],[{x2},{y2}],[{x},{y2}],[{x},{y}]]]}}"#,
            x2 = x + size,
            y2 = y + size,
        )
    }

    fn france_geojson() -> String {
        let features = [
            ("75", "Paris", 2.3, 48.8),
            ("92", "Hauts-de-Seine", 2.1, 48.8),
            ("93", "Seine-Saint-Denis", 2.4, 48.9),
            ("94", "Val-de-Marne", 2.4, 48.7),
            ("13", "Bouches-du-Rhône", 5.0, 43.4),
            ("971", "Guadeloupe", -61.5, 16.2),
        ]
        .iter()
        .map(|(code, name, x, y)| {
            format!(
                r#"{{"type":"Feature","properties":{{"code":"{code}","nom":"{name}"}},"geometry":{}}}"#,
                square(*x, *y, 0.1)
            )
        })
        .collect::<Vec<_>>()
        .join(",");
        format!(r#"{{"type":"FeatureCollection","features":[{features}]}}"#)
    }

    fn catalog() -> CountryGeometryCatalog {
        CountryGeometryCatalog::from_geojson("FRA", &france_geojson()).unwrap()
    }

    #[test]
    fn regions_come_from_the_embedded_table() {
        let catalog = catalog();
        let hierarchy = catalog.hierarchy();
        let codes: Vec<&str> = hierarchy.regions().iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["01", "11", "93"]);
        assert_eq!(catalog.region_list().unwrap().height(), 3);
        assert_eq!(catalog.subregion_list().unwrap().height(), 6);
    }

    #[test]
    fn subregions_of_region_by_code_or_name() {
        let catalog = catalog();
        assert_eq!(
            catalog
                .subregions_of_region(Some("11"), None, IdentifierKind::Code)
                .unwrap(),
            vec!["75", "92", "93", "94"]
        );
        assert_eq!(
            catalog
                .subregions_of_region(None, Some("ile-de-france"), IdentifierKind::Name)
                .unwrap()[0],
            "Paris"
        );
        let both = catalog
            .subregions_of_region(Some("11"), Some("Île-de-France"), IdentifierKind::Code)
            .unwrap_err();
        assert_eq!(both.kind(), ErrorKind::ConflictingArguments);
        let neither = catalog
            .subregions_of_region(None, None, IdentifierKind::Code)
            .unwrap_err();
        assert_eq!(neither.kind(), ErrorKind::ConflictingArguments);
        let unknown = catalog
            .subregions_of_region(Some("99"), None, IdentifierKind::Code)
            .unwrap_err();
        assert_eq!(unknown.kind(), ErrorKind::UnknownRegion);
    }

    #[test]
    fn regions_of_subregion_lookup() {
        let catalog = catalog();
        assert_eq!(
            catalog.regions_of_subregion("13", IdentifierKind::Name).unwrap(),
            "Provence-Alpes-Côte d'Azur"
        );
        let err = catalog
            .regions_of_subregion("2A", IdentifierKind::Code)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownSubregion);
    }

    #[test]
    fn dense_view_is_idempotent_and_irreversible() {
        let mut catalog = catalog();
        catalog.set_dense_geometry().unwrap();
        let once = catalog.subregion_list().unwrap();
        catalog.set_dense_geometry().unwrap();
        let twice = catalog.subregion_list().unwrap();
        assert!(once.equals_missing(&twice));
        assert_eq!(catalog.view(), GeometryView::Dense);

        let err = catalog.set_main_geometry().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);
        assert_eq!(catalog.view(), GeometryView::Dense);
    }

    #[test]
    fn dense_moves_overseas_departments() {
        let catalog = catalog();
        let dense = catalog.snapshot(GeometryView::Dense);
        let center = dense.subregion("971").unwrap().geometry.centroid().unwrap();
        assert!((center.x() + 6.8).abs() < 1e-6);
        assert!((center.y() - 47.6).abs() < 1e-6);
        // The committed view is untouched.
        assert_eq!(catalog.view(), GeometryView::Natural);
    }

    #[test]
    fn exploded_magnifies_the_inset() {
        let catalog = catalog();
        let exploded = catalog.snapshot(GeometryView::Exploded);
        let (min, max) = bounds(&exploded.subregion("75").unwrap().geometry).unwrap();
        assert!((max.x - min.x - 0.4).abs() < 1e-6);
        let (min, max) = bounds(&exploded.subregion("13").unwrap().geometry).unwrap();
        assert!((max.x - min.x - 0.1).abs() < 1e-6);
    }

    #[test]
    fn main_view_drops_relocated_territories() {
        let mut catalog = catalog();
        catalog.set_main_geometry().unwrap();
        let hierarchy = catalog.hierarchy();
        assert!(hierarchy.subregion("971").is_none());
        assert_eq!(hierarchy.regions().len(), 2);
    }

    #[test]
    fn code_name_round_trip() {
        let hierarchy = catalog().hierarchy();
        for subregion in hierarchy.subregions() {
            let by_name = hierarchy
                .find_subregion(&subregion.name, LocationMode::Name)
                .unwrap();
            assert_eq!(by_name.code, subregion.code);
        }
    }

    #[test]
    fn add_field_joins_on_subregion_code() {
        let catalog = catalog();
        let mut table = DataFrame::new(vec![
            Series::new("where".into(), vec!["75", "13", "2B"]).into_column(),
            Series::new("cases".into(), vec![1.0, 2.0, 3.0]).into_column(),
        ])
        .unwrap();
        catalog
            .add_field(
                &mut table,
                &[columns::SUBREGION_NAME, columns::REGION_NAME],
                &AddFieldOptions::default(),
            )
            .unwrap();
        let names = table.column(columns::SUBREGION_NAME).unwrap().str().unwrap();
        assert_eq!(names.get(0), Some("Paris"));
        assert_eq!(names.get(2), None);
        let regions = table.column(columns::REGION_NAME).unwrap().str().unwrap();
        assert_eq!(regions.get(1), Some("Provence-Alpes-Côte d'Azur"));
    }

    #[test]
    fn add_field_at_region_level() {
        let catalog = catalog();
        let mut table = DataFrame::new(vec![
            Series::new("where".into(), vec!["Île-de-France", "Guadeloupe"]).into_column(),
        ])
        .unwrap();
        let options = AddFieldOptions {
            geofield: columns::REGION_NAME.to_string(),
            ..AddFieldOptions::default()
        };
        assert_eq!(options.level(), Level::Region);
        catalog
            .add_field(&mut table, &[columns::REGION_CODE], &options)
            .unwrap();
        let codes = table.column(columns::REGION_CODE).unwrap().str().unwrap();
        assert_eq!(codes.get(0), Some("11"));
        assert_eq!(codes.get(1), Some("01"));
    }

    #[test]
    fn add_field_rejects_conflicts_and_unknown_fields() {
        let catalog = catalog();
        let mut table = DataFrame::new(vec![
            Series::new("where".into(), vec!["75"]).into_column(),
            Series::new("name_subregion".into(), vec!["x"]).into_column(),
        ])
        .unwrap();
        let err = catalog
            .add_field(&mut table, &["name_subregion"], &AddFieldOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FieldConflict);
        let err = catalog
            .add_field(&mut table, &["capital"], &AddFieldOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownField);

        let overload = AddFieldOptions {
            overload: true,
            ..AddFieldOptions::default()
        };
        catalog
            .add_field(&mut table, &["name_subregion"], &overload)
            .unwrap();
        let names = table.column("name_subregion").unwrap().str().unwrap();
        assert_eq!(names.get(0), Some("Paris"));
    }

    #[test]
    fn unsupported_country() {
        let err = CountryGeometryCatalog::from_geojson("Germany", &france_geojson()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedCountry);
    }
}
