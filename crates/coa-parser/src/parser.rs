//! Dataset parsing: description → canonical table.
//!
//! A [`DatasetSchemaParser`] moves through three states. It starts
//! `Unloaded`; [`load_schema`](DatasetSchemaParser::load_schema) reads and
//! validates the description (`SchemaLoaded`) without touching any source;
//! [`produce_table`](DatasetSchemaParser::produce_table) runs every block
//! through the pipeline below and leaves it `Parsed`.
//!
//! Per block: fetch, cast, cumulate, drop, select, drop columns, replace,
//! rename, melt date-wide layouts, parse dates. Blocks are then merged by
//! summation on (location, date), date gaps are filled, locations are
//! resolved, rows that land on the same canonical location are summed again
//! and geometry is attached.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use coa_geo::country::{HierarchySnapshot, LocatedArea, to_geojson_string};
use coa_geo::{
    AdapterRegistry, AttributeEnricher, CountryGeometryCatalog, EnrichField, EnricherSources, Level,
    LocationResolver, RegionCatalog,
};
use coa_ingest::{ReadOptions, ReferenceFetcher, SourceTable, parse_number};
use coa_model::{CacheConfig, CoaConfig, CoaError, ErrorKind, Granularity, LocationMode, Result, columns};
use coa_standards::SourceDatabase;
use polars::prelude::{DataFrame, IntoColumn, NamedFrom, Series};

use crate::canonical::{CanonicalRow, CanonicalTable, ParseReport, ParsedDataset};
use crate::registry::SchemaRegistry;
use crate::schema::{ColumnSpec, DatasetBlock, DatasetDescription};
use crate::transform::{
    KeyedValues, accumulate, apply_cast, cumulate, drop_prefixed, fill_gaps, is_date_header,
    melt_dates, parse_date, replace_values, select_values,
};

/// Collaborators shared by every parser: the fetcher, the country
/// resolver, the per-country geometry catalogs and the enricher used for
/// country geometry.
pub struct ParseContext {
    fetcher: Arc<dyn ReferenceFetcher>,
    resolver: LocationResolver,
    adapters: AdapterRegistry,
    enricher: Option<Arc<AttributeEnricher>>,
    countries: Mutex<HashMap<&'static str, Arc<CountryGeometryCatalog>>>,
}

impl fmt::Debug for ParseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let countries: Vec<&'static str> = self
            .countries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect();
        f.debug_struct("ParseContext")
            .field("resolver", &self.resolver)
            .field("supported", &self.adapters.supported())
            .field("loaded_countries", &countries)
            .field("enricher", &self.enricher)
            .finish_non_exhaustive()
    }
}

impl ParseContext {
    pub fn new(fetcher: Arc<dyn ReferenceFetcher>) -> Self {
        Self {
            fetcher,
            resolver: LocationResolver::default(),
            adapters: AdapterRegistry::with_builtin(),
            enricher: None,
            countries: Mutex::default(),
        }
    }

    /// Context with an enricher reading the reference sources of `config`.
    pub fn configured(fetcher: Arc<dyn ReferenceFetcher>, config: &CoaConfig) -> Self {
        let enricher = AttributeEnricher::new(
            Arc::clone(&fetcher),
            LocationResolver::default(),
            Arc::new(RegionCatalog::builtin()),
            EnricherSources::from_config(config),
        );
        Self::new(fetcher).with_enricher(Arc::new(enricher))
    }

    pub fn with_resolver(mut self, resolver: LocationResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn with_enricher(mut self, enricher: Arc<AttributeEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Registers an already built catalog, e.g. one committed to a
    /// non-natural view.
    pub fn with_country(self, catalog: CountryGeometryCatalog) -> Self {
        self.countries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(catalog.country(), Arc::new(catalog));
        self
    }

    pub fn fetcher(&self) -> &dyn ReferenceFetcher {
        &*self.fetcher
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }

    /// Geometry catalog of `country`, loaded on first use.
    ///
    /// The lock is held while loading so that one country is only fetched
    /// once.
    pub fn country_catalog(&self, country: &str, max_age: Duration) -> Result<Arc<CountryGeometryCatalog>> {
        let alpha3 = self.adapters.get(country)?.alpha3;
        let mut countries = self.countries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = countries.get(alpha3) {
            return Ok(Arc::clone(found));
        }
        let catalog = Arc::new(CountryGeometryCatalog::with_registry(
            country,
            &self.adapters,
            &*self.fetcher,
            max_age,
        )?);
        countries.insert(alpha3, Arc::clone(&catalog));
        Ok(catalog)
    }
}

#[derive(Debug, Clone)]
pub struct ParserOptions {
    /// Age beyond which cached sources are fetched again.
    pub max_age: Duration,
    /// Fill the `geometry` column. Without an enricher, country datasets
    /// get no geometry either way.
    pub attach_geometry: bool,
    /// Source database whose naming quirks apply to country names; takes
    /// precedence over the description's `geoinfo.db`.
    pub db_hint: Option<SourceDatabase>,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_age: CacheConfig::default().max_age(),
            attach_geometry: true,
            db_hint: None,
        }
    }
}

impl ParserOptions {
    pub fn from_config(config: &CoaConfig) -> Self {
        Self {
            max_age: config.cache.max_age(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    Unloaded,
    SchemaLoaded,
    Parsed,
}

/// Canonical identity of a raw location.
#[derive(Debug, Clone)]
struct Target {
    location: String,
    code: String,
    geometry: Option<Arc<str>>,
}

impl Target {
    fn from_area(area: LocatedArea<'_>, with_geometry: bool) -> Result<Self> {
        let geometry = if with_geometry {
            Some(Arc::from(to_geojson_string(area.geometry)?))
        } else {
            None
        };
        Ok(Self {
            location: area.name.to_string(),
            code: area.code.to_string(),
            geometry,
        })
    }
}

#[derive(Debug)]
pub struct DatasetSchemaParser {
    dataset: String,
    schemas: Arc<SchemaRegistry>,
    context: Arc<ParseContext>,
    description: Option<Arc<DatasetDescription>>,
    state: ParserState,
}

impl DatasetSchemaParser {
    pub fn new(dataset: impl Into<String>, schemas: Arc<SchemaRegistry>, context: Arc<ParseContext>) -> Self {
        Self {
            dataset: dataset.into(),
            schemas,
            context,
            description: None,
            state: ParserState::Unloaded,
        }
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn description(&self) -> Option<&DatasetDescription> {
        self.description.as_deref()
    }

    /// Reads and validates the description. Fetches nothing.
    pub fn load_schema(&mut self) -> Result<Arc<DatasetDescription>> {
        if let Some(description) = &self.description {
            return Ok(Arc::clone(description));
        }
        let description = self.schemas.get(&self.dataset)?;
        tracing::debug!(
            dataset = %self.dataset,
            blocks = description.datasets.len(),
            granularity = %description.geoinfo.granularity,
            "dataset description loaded"
        );
        self.description = Some(Arc::clone(&description));
        self.state = ParserState::SchemaLoaded;
        Ok(description)
    }

    /// Runs the full pipeline. Errors other than schema, fetch and
    /// granularity errors come back wrapped in a `ParseFailure`.
    pub fn produce_table(&mut self, options: &ParserOptions) -> Result<ParsedDataset> {
        let description = self.load_schema()?;
        let span = tracing::info_span!("produce_table", dataset = %self.dataset);
        let _guard = span.enter();
        let start = Instant::now();

        let parsed = self
            .parse(&description, options)
            .map_err(|err| self.wrap_error(err))?;
        self.state = ParserState::Parsed;

        let report = &parsed.report;
        if report.has_drops() {
            tracing::warn!(
                invalid_dates = report.invalid_dates,
                unresolved_locations = report.unresolved.len(),
                dropped_rows = report.dropped_rows(),
                "rows dropped while parsing"
            );
        }
        tracing::info!(
            rows = report.rows,
            locations = parsed.table.locations().len(),
            filled_rows = report.filled_rows,
            duration_ms = start.elapsed().as_millis(),
            "dataset parsed"
        );
        Ok(parsed)
    }

    fn wrap_error(&self, err: CoaError) -> CoaError {
        match err.kind() {
            ErrorKind::SchemaInvalid
            | ErrorKind::SourceFetchFailure
            | ErrorKind::GranularityError
            | ErrorKind::ParseFailure => err,
            _ => CoaError::ParseFailure {
                dataset: self.dataset.clone(),
                source: Box::new(err),
            },
        }
    }

    fn parse(&self, description: &DatasetDescription, options: &ParserOptions) -> Result<ParsedDataset> {
        let granularity = description.granularity()?;
        let variables = description.variables();
        let mut report = ParseReport {
            dataset: self.dataset.clone(),
            blocks: description.datasets.len(),
            ..ParseReport::default()
        };

        let mut keyed = KeyedValues::new();
        let mut source_rows: BTreeMap<String, usize> = BTreeMap::new();
        for (idx, block) in description.datasets.iter().enumerate() {
            let table = self.prepare_block(idx, block, options, &mut report)?;
            tracing::debug!(block = idx, url = %block.urldata, rows = table.len(), "block prepared");
            self.collect_block(
                idx,
                &table,
                block,
                description,
                granularity,
                &variables,
                &mut keyed,
                &mut source_rows,
                &mut report,
            )?;
        }
        let observed_days = days_per_location(&keyed);
        report.filled_rows = fill_gaps(&mut keyed, variables.len());

        let targets = self.resolve_locations(&keyed, description, granularity, options)?;
        let mut merged = KeyedValues::new();
        let mut dropped_days: BTreeMap<String, usize> = BTreeMap::new();
        for ((raw, date), values) in keyed {
            match targets.get(&raw).and_then(Option::as_ref) {
                Some(target) => accumulate(&mut merged, (target.code.clone(), date), &values),
                None => *dropped_days.entry(raw).or_insert(0) += 1,
            }
        }
        // Filled days of a dropped location were never source rows.
        for (raw, days) in dropped_days {
            let observed = observed_days.get(&raw).copied().unwrap_or(0);
            report.filled_rows = report.filled_rows.saturating_sub(days.saturating_sub(observed));
            let rows = source_rows.get(&raw).copied().unwrap_or(0);
            report.unresolved.insert(raw, rows);
        }
        for (raw, rows) in &report.unresolved {
            tracing::warn!(location = %raw, rows, "location not resolved, rows dropped");
        }
        // Two raw spellings of one place may cover different dates.
        report.filled_rows += fill_gaps(&mut merged, variables.len());

        let by_code: HashMap<&str, &Target> = targets
            .values()
            .flatten()
            .map(|target| (target.code.as_str(), target))
            .collect();
        let rows: Vec<CanonicalRow> = merged
            .into_iter()
            .filter_map(|((code, date), values)| {
                let target = by_code.get(code.as_str())?;
                Some(CanonicalRow {
                    date,
                    location: target.location.clone(),
                    code,
                    values,
                    geometry: target.geometry.clone(),
                })
            })
            .collect();
        let table = CanonicalTable::new(variables, rows);
        report.rows = table.len();
        Ok(ParsedDataset { table, report })
    }

    /// Fetches a block and reshapes it to `where`, `date` and its variables.
    fn prepare_block(
        &self,
        idx: usize,
        block: &DatasetBlock,
        options: &ParserOptions,
        report: &mut ParseReport,
    ) -> Result<SourceTable> {
        let bytes = self.context.fetcher.fetch(&block.urldata, options.max_age)?;
        let mut table = SourceTable::from_bytes(
            &bytes,
            &block.urldata,
            &ReadOptions::default().with_separator(&block.separator),
        )
        .map_err(|e| CoaError::fetch(&block.urldata, e))?;
        report.source_rows += table.len();

        let decimal = block.decimal_mark();
        for (column, cast) in &block.cast {
            apply_cast(&mut table, column, *cast, decimal);
        }
        let location_source = block.column(columns::WHERE).map(ColumnSpec::source_name);
        let date_source = block.column(columns::DATE).map(ColumnSpec::source_name);
        for spec in block.columns.iter().filter(|c| c.cumulative) {
            cumulate(&mut table, spec.source_name(), location_source, date_source, decimal);
        }
        for (column, prefixes) in &block.drop {
            report.filtered_rows += drop_prefixed(&mut table, column, prefixes.values());
        }
        for (column, accepted) in &block.selections {
            report.filtered_rows += select_values(&mut table, column, accepted.values());
        }
        for column in &block.dropcolumns {
            table.drop_column(column);
        }
        for (column, replacements) in &block.replace {
            replace_values(&mut table, column, replacements);
        }
        for spec in &block.columns {
            if let Some(alias) = &spec.alias {
                table.rename_column(alias, &spec.name);
            }
        }

        let date_headers: Vec<String> = table
            .headers
            .iter()
            .filter(|header| is_date_header(header))
            .cloned()
            .collect();
        let wide = !table.has_column(columns::DATE) && !date_headers.is_empty();
        if !wide && !table.has_column(columns::DATE) {
            return Err(CoaError::schema(
                &self.dataset,
                format!("datasets[{idx}]: no date column in {}", block.urldata),
            ));
        }
        for spec in &block.columns {
            let melted = wide && (spec.name == columns::DATE || block.namedata.as_ref() == Some(&spec.name));
            if spec.name != columns::WHERE && !melted && !table.has_column(&spec.name) {
                return Err(CoaError::schema(
                    &self.dataset,
                    format!(
                        "datasets[{idx}]: column '{}' not found in {}",
                        spec.source_name(),
                        block.urldata
                    ),
                ));
            }
        }

        let mut selected: Vec<String> = block
            .columns
            .iter()
            .map(|spec| spec.name.clone())
            .filter(|name| table.has_column(name))
            .collect();
        if !wide {
            return table.select(&selected);
        }
        let Some(value_column) = block.namedata.as_deref() else {
            return Err(CoaError::schema(
                &self.dataset,
                format!("datasets[{idx}] has one column per date but no namedata"),
            ));
        };
        selected.extend(date_headers);
        let mut long = melt_dates(&table.select(&selected)?, columns::DATE, value_column);
        if block.column(value_column).is_some_and(|spec| spec.cumulative) {
            let group = long.has_column(columns::WHERE).then_some(columns::WHERE);
            cumulate(&mut long, value_column, group, Some(columns::DATE), decimal);
        }
        Ok(long)
    }

    /// Adds the rows of a prepared block to `keyed`, summing collisions.
    #[allow(clippy::too_many_arguments)]
    fn collect_block(
        &self,
        idx: usize,
        table: &SourceTable,
        block: &DatasetBlock,
        description: &DatasetDescription,
        granularity: Granularity,
        variables: &[String],
        keyed: &mut KeyedValues,
        source_rows: &mut BTreeMap<String, usize>,
        report: &mut ParseReport,
    ) -> Result<()> {
        let date_idx = table.column_index(columns::DATE).ok_or_else(|| {
            CoaError::schema(&self.dataset, format!("datasets[{idx}]: no date column"))
        })?;
        let location_idx = table.column_index(columns::WHERE);
        if location_idx.is_none() && granularity != Granularity::Country {
            return Err(CoaError::schema(
                &self.dataset,
                format!("datasets[{idx}]: {granularity} data needs a 'where' column"),
            ));
        }
        let slots: Vec<(usize, usize)> = variables
            .iter()
            .enumerate()
            .filter_map(|(slot, name)| table.column_index(name).map(|col| (slot, col)))
            .collect();
        let decimal = block.decimal_mark();

        for row in &table.rows {
            let Some(date) = parse_date(&row[date_idx]) else {
                report.invalid_dates += 1;
                continue;
            };
            let location = match location_idx {
                Some(col) => row[col].trim().to_string(),
                None => description.geoinfo.iso3.clone(),
            };
            let mut values = vec![None; variables.len()];
            for &(slot, col) in &slots {
                values[slot] = parse_number(&row[col], decimal);
            }
            *source_rows.entry(location.clone()).or_insert(0) += 1;
            accumulate(keyed, (location, date), &values);
        }
        Ok(())
    }

    /// Canonical identity of every raw location; `None` when it does not
    /// resolve.
    fn resolve_locations(
        &self,
        keyed: &KeyedValues,
        description: &DatasetDescription,
        granularity: Granularity,
        options: &ParserOptions,
    ) -> Result<BTreeMap<String, Option<Target>>> {
        let raw_locations: BTreeSet<&str> = keyed.keys().map(|(location, _)| location.as_str()).collect();
        let level = match granularity {
            Granularity::Country => {
                return self.resolve_countries(&raw_locations, description, options);
            }
            Granularity::Region => Level::Region,
            Granularity::Subregion => Level::Subregion,
        };

        let catalog = self
            .context
            .country_catalog(&description.geoinfo.iso3, options.max_age)?;
        let hierarchy = catalog.hierarchy();
        let mode = description.location_mode();
        let mut targets = BTreeMap::new();
        for raw in raw_locations {
            let target = match locate(&hierarchy, level, raw, mode) {
                Some(area) => Some(Target::from_area(area, options.attach_geometry)?),
                None => None,
            };
            targets.insert(raw.to_string(), target);
        }
        Ok(targets)
    }

    fn resolve_countries(
        &self,
        raw_locations: &BTreeSet<&str>,
        description: &DatasetDescription,
        options: &ParserOptions,
    ) -> Result<BTreeMap<String, Option<Target>>> {
        let database = options.db_hint.or(description.geoinfo.db);
        let mut targets = BTreeMap::new();
        for &raw in raw_locations {
            let target = match self.context.resolver.record(raw, database) {
                Ok(Some(record)) => Some(Target {
                    location: record.name.clone(),
                    code: record.alpha3.clone(),
                    geometry: None,
                }),
                Ok(None) => None,
                Err(err) => {
                    tracing::debug!(location = raw, error = %err, "country lookup failed");
                    None
                }
            };
            targets.insert(raw.to_string(), target);
        }
        if options.attach_geometry {
            self.attach_country_geometry(&mut targets)?;
        }
        Ok(targets)
    }

    fn attach_country_geometry(&self, targets: &mut BTreeMap<String, Option<Target>>) -> Result<()> {
        let Some(enricher) = &self.context.enricher else {
            tracing::debug!("no enricher configured, country geometry skipped");
            return Ok(());
        };
        let codes: Vec<String> = targets
            .values()
            .flatten()
            .map(|target| target.code.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if codes.is_empty() {
            return Ok(());
        }
        let mut frame = DataFrame::new(vec![Series::new(columns::CODE.into(), codes.clone()).into_column()])?;
        enricher.add_field(&mut frame, &[EnrichField::Geometry.as_str()], columns::CODE, false)?;
        let geometry = frame.column(columns::GEOMETRY)?.str()?;
        let by_code: HashMap<&str, Arc<str>> = codes
            .iter()
            .zip(geometry)
            .filter_map(|(code, shape)| shape.map(|shape| (code.as_str(), Arc::from(shape))))
            .collect();
        for target in targets.values_mut().flatten() {
            target.geometry = by_code.get(target.code.as_str()).cloned();
        }
        Ok(())
    }
}

fn days_per_location(keyed: &KeyedValues) -> BTreeMap<String, usize> {
    let mut days = BTreeMap::new();
    for (location, _) in keyed.keys() {
        *days.entry(location.clone()).or_insert(0) += 1;
    }
    days
}

/// Looks `raw` up in the hierarchy; numeric codes that lost their leading
/// zeros are retried padded to two and three digits.
fn locate<'h>(
    hierarchy: &'h HierarchySnapshot,
    level: Level,
    raw: &str,
    mode: LocationMode,
) -> Option<LocatedArea<'h>> {
    if let Some(found) = hierarchy.locate(level, raw, mode) {
        return Some(found);
    }
    if mode != LocationMode::Code || raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    [2usize, 3]
        .into_iter()
        .filter(|&width| raw.len() < width)
        .find_map(|width| hierarchy.locate(level, &format!("{raw:0>width$}"), mode))
}
