//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use coa_model::{GeometryView, LocationStandard};

#[derive(Parser)]
#[command(
    name = "coa",
    version,
    about = "Inspect location catalogs and parse epidemiological datasets",
    long_about = "Resolve place names to ISO 3166 standards, list multi-country regions and \
                  subregion hierarchies, and parse described datasets into a canonical \
                  (location, date) table."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(long = "log-format", value_enum, default_value = "pretty", global = true)]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Configuration file (default: $COA_CONFIG, then built-in defaults).
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve location names or codes to a naming standard.
    Resolve(ResolveArgs),

    /// List known multi-country regions.
    Regions(RegionsArgs),

    /// List the member countries of a region.
    Members(MembersArgs),

    /// List the subregions of a supported country.
    Subregions(SubregionsArgs),

    /// Parse a described dataset into the canonical table.
    Parse(ParseArgs),
}

#[derive(Parser)]
pub struct ResolveArgs {
    /// Names or codes to resolve.
    #[arg(value_name = "LOCATION", required = true)]
    pub locations: Vec<String>,

    /// Standard of the output.
    #[arg(long = "standard", value_enum, default_value = "iso3")]
    pub standard: StandardArg,

    /// Source database whose naming quirks apply (jhu, owid, who, worldometers, ecdc).
    #[arg(long = "db", value_name = "DB")]
    pub db: Option<String>,

    /// Replace region names by their member countries.
    #[arg(long = "expand")]
    pub expand: bool,

    /// Fail instead of picking the best of several close matches.
    #[arg(long = "strict")]
    pub strict: bool,

    /// Use only the built-in regions (no download of the UN hierarchy).
    #[arg(long = "offline")]
    pub offline: bool,
}

#[derive(Parser)]
pub struct RegionsArgs {
    /// Use only the built-in regions (no download of the UN hierarchy).
    #[arg(long = "offline")]
    pub offline: bool,

    /// Only list regions whose name contains this text.
    #[arg(long = "filter", value_name = "TEXT")]
    pub filter: Option<String>,
}

#[derive(Parser)]
pub struct MembersArgs {
    /// Region name (e.g. "G7", "European Union", "Western Africa").
    #[arg(value_name = "REGION")]
    pub region: String,

    /// Standard of the listed members.
    #[arg(long = "standard", value_enum, default_value = "iso3")]
    pub standard: StandardArg,

    /// Use only the built-in regions (no download of the UN hierarchy).
    #[arg(long = "offline")]
    pub offline: bool,
}

#[derive(Parser)]
pub struct SubregionsArgs {
    /// Country code or name (FRA, USA, ITA).
    #[arg(value_name = "COUNTRY")]
    pub country: String,

    /// Only list the subregions of the region with this code.
    #[arg(long = "region", value_name = "CODE", conflicts_with = "region_name")]
    pub region: Option<String>,

    /// Only list the subregions of the region with this name.
    #[arg(long = "region-name", value_name = "NAME")]
    pub region_name: Option<String>,

    /// Geometry layout to load.
    #[arg(long = "view", value_enum, default_value = "natural")]
    pub view: ViewArg,
}

#[derive(Parser)]
pub struct ParseArgs {
    /// Dataset name (`<SCHEMA_DIR>/<DATASET>.json`).
    #[arg(value_name = "DATASET")]
    pub dataset: String,

    /// Directory of dataset descriptions (overrides the configuration).
    #[arg(long = "schema-dir", value_name = "DIR")]
    pub schema_dir: Option<PathBuf>,

    /// Source database whose naming quirks apply to country names
    /// (overrides the description's `geoinfo.db`).
    #[arg(long = "db", value_name = "DB")]
    pub db: Option<String>,

    /// Skip the geometry column.
    #[arg(long = "no-geometry")]
    pub no_geometry: bool,

    /// Number of rows to print.
    #[arg(long = "head", value_name = "N", default_value_t = 10)]
    pub head: usize,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StandardArg {
    Iso2,
    Iso3,
    Name,
    Num,
}

impl From<StandardArg> for LocationStandard {
    fn from(value: StandardArg) -> Self {
        match value {
            StandardArg::Iso2 => Self::Iso2,
            StandardArg::Iso3 => Self::Iso3,
            StandardArg::Name => Self::Name,
            StandardArg::Num => Self::Num,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ViewArg {
    Natural,
    Dense,
    Exploded,
    Main,
}

impl From<ViewArg> for GeometryView {
    fn from(value: ViewArg) -> Self {
        match value {
            ViewArg::Natural => Self::Natural,
            ViewArg::Dense => Self::Dense,
            ViewArg::Exploded => Self::Exploded,
            ViewArg::Main => Self::Main,
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
