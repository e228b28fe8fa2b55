//! Argument parsing and rendering.

use chrono::NaiveDate;
use clap::Parser;
use coa_cli::cli::{Cli, Command, StandardArg};
use coa_cli::summary::{head_table, resolution_table};
use coa_geo::LocationResolver;
use coa_model::LocationStandard;
use coa_parser::{CanonicalRow, CanonicalTable};
use coa_standards::SourceDatabase;

#[test]
fn resolve_arguments() {
    let cli = Cli::try_parse_from([
        "coa", "resolve", "Congo (Kinshasa)", "Italy", "--db", "jhu", "--standard", "name",
    ])
    .unwrap();
    let Command::Resolve(args) = cli.command else {
        panic!("expected the resolve command");
    };
    assert_eq!(args.locations, vec!["Congo (Kinshasa)", "Italy"]);
    assert_eq!(args.db.as_deref(), Some("jhu"));
    assert!(matches!(args.standard, StandardArg::Name));
    assert_eq!(LocationStandard::from(args.standard), LocationStandard::Name);
    assert!(!args.expand);
}

#[test]
fn region_code_and_name_conflict() {
    let result = Cli::try_parse_from([
        "coa",
        "subregions",
        "FRA",
        "--region",
        "11",
        "--region-name",
        "Île-de-France",
    ]);
    assert!(result.is_err());
}

#[test]
fn parse_arguments_with_global_flags() {
    let cli = Cli::try_parse_from([
        "coa", "parse", "spf_hosp", "--no-geometry", "--head", "3", "--log-format", "json",
    ])
    .unwrap();
    let Command::Parse(args) = cli.command else {
        panic!("expected the parse command");
    };
    assert_eq!(args.dataset, "spf_hosp");
    assert!(args.no_geometry);
    assert_eq!(args.head, 3);
    assert!(args.db.is_none());
}

#[test]
fn resolution_table_shows_method() {
    let resolver = LocationResolver::new(LocationStandard::Iso3);
    let resolution = resolver
        .resolve_detailed("Congo (Kinshasa)", Some(SourceDatabase::Jhu))
        .unwrap();
    let rendered = resolution_table(&[resolution]).to_string();
    assert!(rendered.contains("COD"));
    assert!(rendered.contains("alias"));
}

#[test]
fn head_table_is_limited() {
    let rows = (1..=5)
        .map(|day| CanonicalRow {
            date: NaiveDate::from_ymd_opt(2021, 2, day).unwrap(),
            location: "France".to_string(),
            code: "FRA".to_string(),
            values: vec![Some(f64::from(day) * 1.5)],
            geometry: None,
        })
        .collect();
    let table = CanonicalTable::new(vec!["cases".to_string()], rows);
    let rendered = head_table(&table, 2).to_string();
    assert!(rendered.contains("2021-02-02"));
    assert!(rendered.contains("3"));
    assert!(!rendered.contains("2021-02-03"));
}
