//! Runtime configuration.
//!
//! Everything has a usable default so a bare `CoaConfig::default()` works
//! offline-first. A TOML file (pointed to by `COA_CONFIG`) can override any
//! field, and `COA_CACHE_DIR` / `COA_SCHEMA_DIR` override the two paths on
//! top of that.
//!
//! ```toml
//! [cache]
//! dir = "/var/cache/coa"
//! max_age_days = 2
//!
//! [schemas]
//! dir = "./descriptions"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoaError, Result};

/// Environment variable holding the path of a TOML configuration file.
pub const CONFIG_ENV_VAR: &str = "COA_CONFIG";
/// Environment variable overriding the on-disk cache directory.
pub const CACHE_DIR_ENV_VAR: &str = "COA_CACHE_DIR";
/// Environment variable overriding the dataset description directory.
pub const SCHEMA_DIR_ENV_VAR: &str = "COA_SCHEMA_DIR";

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoaConfig {
    pub cache: CacheConfig,
    pub sources: SourcesConfig,
    pub schemas: SchemaConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub dir: PathBuf,
    /// Cached reference tables older than this are fetched again.
    pub max_age_days: u64,
    /// Timeout applied to every network request.
    pub timeout_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: std::env::temp_dir().join("coa-cache"),
            max_age_days: 2,
            timeout_secs: 30,
        }
    }
}

impl CacheConfig {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_days.saturating_mul(SECONDS_PER_DAY))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// UN M49 hierarchy table (region / sub-region / intermediate region).
    pub regions_url: String,
    /// World country polygons as a GeoJSON feature collection.
    pub world_geometry_url: String,
    pub demographics: DemographicsSource,
    /// Flag image URL; `{alpha2}` is replaced by the lowercase alpha-2 code.
    pub flag_url_template: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            regions_url: "https://raw.githubusercontent.com/lukes/ISO-3166-Countries-with-Regional-Codes/master/all/all.csv".to_string(),
            world_geometry_url: "https://raw.githubusercontent.com/datasets/geo-countries/master/data/countries.geojson".to_string(),
            demographics: DemographicsSource::default(),
            flag_url_template: "https://flagcdn.com/w320/{alpha2}.png".to_string(),
        }
    }
}

/// Where per-country demographic figures come from and how their columns
/// are named. Absent columns leave the matching field empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemographicsSource {
    pub url: String,
    pub separator: String,
    /// Column holding alpha-3 codes.
    pub key_column: String,
    pub population: Option<String>,
    pub area: Option<String>,
    pub fertility: Option<String>,
    pub median_age: Option<String>,
    pub urban_rate: Option<String>,
}

impl Default for DemographicsSource {
    fn default() -> Self {
        Self {
            url: "https://covid.ourworldindata.org/data/latest/owid-covid-latest.csv".to_string(),
            separator: ",".to_string(),
            key_column: "iso_code".to_string(),
            population: Some("population".to_string()),
            area: None,
            fertility: None,
            median_age: Some("median_age".to_string()),
            urban_rate: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    pub dir: PathBuf,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("descriptions"),
        }
    }
}

impl CoaConfig {
    /// Loads a TOML file; missing sections keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| CoaError::io(path, e))?;
        toml::from_str(&contents).map_err(|e| CoaError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Resolves configuration from the environment.
    ///
    /// Resolution order:
    /// 1. the file named by `COA_CONFIG`, if set
    /// 2. built-in defaults
    ///
    /// then `COA_CACHE_DIR` and `COA_SCHEMA_DIR` are applied on top.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => Self::load(Path::new(&path))?,
            None => Self::default(),
        };
        if let Some(dir) = std::env::var_os(CACHE_DIR_ENV_VAR) {
            config.cache.dir = PathBuf::from(dir);
        }
        if let Some(dir) = std::env::var_os(SCHEMA_DIR_ENV_VAR) {
            config.schemas.dir = PathBuf::from(dir);
        }
        Ok(config)
    }
}
