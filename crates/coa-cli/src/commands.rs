use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, info_span};

use coa_geo::{CountryGeometryCatalog, LocationResolver, MatchPolicy, RegionCatalog};
use coa_ingest::{CachedHttpFetcher, ReferenceFetcher};
use coa_model::{CoaConfig, CoaError, ErrorCategory, GeometryView, LocationMode, OutputKind};
use coa_parser::{DatasetSchemaParser, ParseContext, ParsedDataset, ParserOptions, SchemaRegistry};
use coa_standards::{SourceDatabase, StandardsCatalog};

use crate::cli::{MembersArgs, ParseArgs, RegionsArgs, ResolveArgs, SubregionsArgs};
use crate::summary::{
    head_table, list_table, region_table, report_table, resolution_table, subregion_table,
    unresolved_table,
};

pub fn load_config(path: Option<&Path>) -> Result<CoaConfig> {
    let config = match path {
        Some(path) => CoaConfig::load(path)?,
        None => CoaConfig::from_env()?,
    };
    Ok(config)
}

/// Exit status for a failed command: 2 for configuration problems, 3 when
/// an external source could not be reached, 1 otherwise.
pub fn exit_code(error: &anyhow::Error) -> i32 {
    let category = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<CoaError>())
        .map(|err| err.root().kind().category());
    match category {
        Some(ErrorCategory::Configuration) => 2,
        Some(ErrorCategory::Transient) => 3,
        _ => 1,
    }
}

fn fetcher(config: &CoaConfig) -> Result<Arc<CachedHttpFetcher>> {
    Ok(Arc::new(CachedHttpFetcher::new(&config.cache)?))
}

fn region_catalog(config: &CoaConfig, offline: bool) -> Result<RegionCatalog> {
    if offline {
        return Ok(RegionCatalog::builtin());
    }
    let fetcher = fetcher(config)?;
    RegionCatalog::build(fetcher.as_ref(), config)
        .context("load the UN M49 hierarchy (use --offline for built-in regions only)")
}

fn parse_db(db: Option<&str>) -> Result<Option<SourceDatabase>> {
    Ok(db.map(str::parse::<SourceDatabase>).transpose()?)
}

pub fn run_resolve(args: &ResolveArgs, config: &CoaConfig) -> Result<()> {
    let policy = if args.strict {
        MatchPolicy::Strict
    } else {
        MatchPolicy::Lenient
    };
    let resolver = LocationResolver::new(args.standard.into()).with_policy(policy);

    if args.expand {
        let resolver = resolver.with_regions(Arc::new(region_catalog(config, args.offline)?));
        let values = resolver
            .resolve(args.locations.iter(), args.db.as_deref(), OutputKind::List, true)?
            .into_list()
            .unwrap_or_default();
        println!("{}", list_table(&resolver.standard().to_string(), &values));
        return Ok(());
    }

    let database = parse_db(args.db.as_deref())?;
    let resolutions = args
        .locations
        .iter()
        .map(|location| resolver.resolve_detailed(location.as_str(), database))
        .collect::<Result<Vec<_>, _>>()?;
    println!("{}", resolution_table(&resolutions));
    Ok(())
}

pub fn run_regions(args: &RegionsArgs, config: &CoaConfig) -> Result<()> {
    let catalog = region_catalog(config, args.offline)?;
    let needle = args.filter.as_deref().map(str::to_lowercase);
    let mut regions: Vec<_> = catalog
        .regions()
        .iter()
        .filter(|region| {
            needle
                .as_deref()
                .is_none_or(|needle| region.name.to_lowercase().contains(needle))
        })
        .collect();
    regions.sort_by(|a, b| a.name.cmp(&b.name));
    println!("{}", region_table(regions));
    Ok(())
}

pub fn run_members(args: &MembersArgs, config: &CoaConfig) -> Result<()> {
    let catalog = region_catalog(config, args.offline)?;
    let standard = args.standard.into();
    let standards = StandardsCatalog::global();
    let members: Vec<String> = catalog
        .members_of(&args.region)?
        .iter()
        .map(|alpha3| {
            standards
                .by_alpha3(alpha3)
                .and_then(|record| record.identifier(standard))
                .map_or_else(|| alpha3.clone(), str::to_string)
        })
        .collect();
    let title = format!("{} ({})", catalog.is_region(&args.region).unwrap_or(&args.region), members.len());
    println!("{}", list_table(&title, &members));

    let children = catalog.children_of(&args.region);
    if !children.is_empty() {
        println!("{}", region_table(children));
    }
    Ok(())
}

pub fn run_subregions(args: &SubregionsArgs, config: &CoaConfig) -> Result<()> {
    let fetcher = fetcher(config)?;
    let mut catalog = CountryGeometryCatalog::new(&args.country, fetcher.as_ref(), config.cache.max_age())?;
    match GeometryView::from(args.view) {
        GeometryView::Natural => {}
        GeometryView::Dense => catalog.set_dense_geometry()?,
        GeometryView::Exploded => catalog.set_exploded_geometry()?,
        GeometryView::Main => catalog.set_main_geometry()?,
    }
    let hierarchy = catalog.hierarchy();

    if args.region.is_none() && args.region_name.is_none() {
        println!("{}", subregion_table(hierarchy.subregions()));
        return Ok(());
    }
    let codes = catalog.subregions_of_region(
        args.region.as_deref(),
        args.region_name.as_deref(),
        LocationMode::Code,
    )?;
    println!(
        "{}",
        subregion_table(codes.iter().filter_map(|code| hierarchy.subregion(code)))
    );
    Ok(())
}

pub fn run_parse(args: &ParseArgs, config: &CoaConfig) -> Result<ParsedDataset> {
    let span = info_span!("parse", dataset = %args.dataset);
    let _guard = span.enter();
    let start = Instant::now();

    let schema_dir = args.schema_dir.clone().unwrap_or_else(|| config.schemas.dir.clone());
    let fetcher: Arc<dyn ReferenceFetcher> = fetcher(config)?;
    let context = ParseContext::configured(fetcher, config);
    let mut parser = DatasetSchemaParser::new(
        args.dataset.clone(),
        Arc::new(SchemaRegistry::new(&schema_dir)),
        Arc::new(context),
    );
    let options = ParserOptions {
        attach_geometry: !args.no_geometry,
        db_hint: parse_db(args.db.as_deref())?,
        ..ParserOptions::from_config(config)
    };
    let parsed = parser
        .produce_table(&options)
        .with_context(|| format!("parse dataset '{}'", args.dataset))?;

    println!("{}", report_table(&parsed.report));
    if let Some(table) = unresolved_table(&parsed.report) {
        println!("{table}");
    }
    if args.head > 0 && !parsed.table.is_empty() {
        println!("{}", head_table(&parsed.table, args.head));
    }
    info!(duration_ms = start.elapsed().as_millis(), "parse command finished");
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_error_category() {
        let schema = anyhow::Error::from(CoaError::schema("demo", "no such dataset"));
        assert_eq!(exit_code(&schema), 2);

        let fetch = anyhow::Error::from(CoaError::fetch("https://x.test", "timed out"))
            .context("parse dataset 'demo'");
        assert_eq!(exit_code(&fetch), 3);

        let wrapped = CoaError::ParseFailure {
            dataset: "demo".to_string(),
            source: Box::new(CoaError::fetch("https://x.test", "timed out")),
        };
        assert_eq!(exit_code(&anyhow::Error::from(wrapped)), 3);

        assert_eq!(exit_code(&anyhow::anyhow!("plain")), 1);
    }
}
