//! Dataset descriptions.
//!
//! A description is a JSON document per dataset:
//!
//! ```json
//! {
//!   "header": "Hospital data, France",
//!   "geoinfo": {"granularity": "subregion", "iso3": "FRA", "locationmode": "code"},
//!   "datasets": [{
//!     "urldata": "https://example.org/hosp.csv",
//!     "separator": ";",
//!     "columns": [
//!       {"name": "where", "alias": "dep"},
//!       {"name": "date", "alias": "jour"},
//!       {"name": "hosp", "description": "Hospitalized", "cumulative": false}
//!     ],
//!     "selections": {"sexe": "0"}
//!   }]
//! }
//! ```
//!
//! The raw JSON is checked for required keys before deserialization so that
//! a missing key is reported by path, not as a serde error.

use std::collections::BTreeMap;

use coa_model::{CoaError, Granularity, LocationMode, Result, columns};
use coa_standards::SourceDatabase;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescription {
    #[serde(default)]
    pub header: String,
    pub geoinfo: GeoInfo,
    pub datasets: Vec<DatasetBlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoInfo {
    /// Kept as text so an unknown value surfaces as a granularity error.
    pub granularity: String,
    /// Country the dataset describes (or the default country of country data).
    pub iso3: String,
    pub locationmode: LocationMode,
    /// Source database whose spellings the location names follow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db: Option<SourceDatabase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetBlock {
    pub urldata: String,
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default = "default_decimal")]
    pub decimal: String,
    pub columns: Vec<ColumnSpec>,
    /// Column → accepted values; other rows are dropped, then the column.
    #[serde(default)]
    pub selections: BTreeMap<String, OneOrMany>,
    /// Columns removed after selection.
    #[serde(default)]
    pub dropcolumns: Vec<String>,
    /// Column → value prefixes; matching rows are dropped.
    #[serde(default)]
    pub drop: BTreeMap<String, OneOrMany>,
    #[serde(default)]
    pub cast: BTreeMap<String, CastType>,
    /// Column → (value → replacement).
    #[serde(default)]
    pub replace: BTreeMap<String, BTreeMap<String, String>>,
    /// Name of the value column when the file has one column per date.
    #[serde(default)]
    pub namedata: Option<String>,
}

fn default_separator() -> String {
    ",".to_string()
}

fn default_decimal() -> String {
    ".".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Canonical name: `where`, `date` or a variable name.
    pub name: String,
    /// Column name in the source file, when it differs.
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cumulative: bool,
}

impl ColumnSpec {
    /// Name of the column in the source file.
    pub fn source_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn is_key(&self) -> bool {
        self.name == columns::WHERE || self.name == columns::DATE
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn values(&self) -> &[String] {
        match self {
            Self::One(value) => std::slice::from_ref(value),
            Self::Many(values) => values,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CastType {
    /// Left untouched (codes with leading zeros).
    String,
    Float,
    /// Truncated to an integer.
    Int,
}

impl DatasetBlock {
    pub fn decimal_mark(&self) -> char {
        self.decimal.chars().next().unwrap_or('.')
    }

    /// Canonical names of the block's variables in declaration order,
    /// `namedata` last.
    pub fn variables(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .columns
            .iter()
            .filter(|c| !c.is_key())
            .map(|c| c.name.as_str())
            .collect();
        if let Some(namedata) = self.namedata.as_deref()
            && !out.contains(&namedata)
        {
            out.push(namedata);
        }
        out
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }
}

impl DatasetDescription {
    /// Parses and validates a description.
    pub fn from_json_str(dataset: &str, text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| CoaError::schema(dataset, format!("not valid JSON: {e}")))?;
        Self::from_value(dataset, value)
    }

    pub fn from_value(dataset: &str, value: Value) -> Result<Self> {
        let missing = missing_keys(&value);
        if !missing.is_empty() {
            return Err(CoaError::schema(
                dataset,
                format!("missing required keys: {}", missing.join(", ")),
            ));
        }
        let description: Self =
            serde_json::from_value(value).map_err(|e| CoaError::schema(dataset, e.to_string()))?;
        description.validate(dataset)?;
        Ok(description)
    }

    pub fn granularity(&self) -> Result<Granularity> {
        self.geoinfo.granularity.parse()
    }

    pub fn location_mode(&self) -> LocationMode {
        self.geoinfo.locationmode
    }

    /// Every variable declared by any block, first declaration first.
    pub fn variables(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for name in self.datasets.iter().flat_map(DatasetBlock::variables) {
            if !out.iter().any(|v| v == name) {
                out.push(name.to_string());
            }
        }
        out
    }

    fn validate(&self, dataset: &str) -> Result<()> {
        self.granularity()?;
        if self.datasets.is_empty() {
            return Err(CoaError::schema(dataset, "no dataset block"));
        }
        for (idx, block) in self.datasets.iter().enumerate() {
            if block.columns.is_empty() {
                return Err(CoaError::schema(dataset, format!("datasets[{idx}] declares no column")));
            }
            if block.separator.is_empty() {
                return Err(CoaError::schema(dataset, format!("datasets[{idx}].separator is empty")));
            }
            if block.variables().is_empty() {
                return Err(CoaError::schema(
                    dataset,
                    format!("datasets[{idx}] declares no variable"),
                ));
            }
        }
        Ok(())
    }
}

/// Dotted paths of required keys absent from `value`.
fn missing_keys(value: &Value) -> Vec<String> {
    let mut missing = Vec::new();
    for key in ["granularity", "iso3", "locationmode"] {
        if value.pointer(&format!("/geoinfo/{key}")).is_none() {
            missing.push(format!("geoinfo.{key}"));
        }
    }
    let Some(blocks) = value.get("datasets").and_then(Value::as_array) else {
        missing.push("datasets".to_string());
        return missing;
    };
    for (idx, block) in blocks.iter().enumerate() {
        if block.get("urldata").is_none() {
            missing.push(format!("datasets[{idx}].urldata"));
        }
        match block.get("columns").and_then(Value::as_array) {
            Some(columns) => {
                for (col, column) in columns.iter().enumerate() {
                    if column.get("name").is_none() {
                        missing.push(format!("datasets[{idx}].columns[{col}].name"));
                    }
                }
            }
            None => missing.push(format!("datasets[{idx}].columns")),
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use coa_model::ErrorKind;

    const VALID: &str = r#"{
        "header": "test",
        "geoinfo": {"granularity": "country", "iso3": "FRA", "locationmode": "name"},
        "datasets": [{
            "urldata": "mem://a.csv",
            "separator": ";",
            "decimal": ",",
            "columns": [
                {"name": "where", "alias": "country"},
                {"name": "date"},
                {"name": "cases", "cumulative": true}
            ],
            "selections": {"age": ["0", "all"]},
            "drop": {"country": "Total"},
            "cast": {"country": "string"}
        }]
    }"#;

    #[test]
    fn source_database_is_optional() {
        let description = DatasetDescription::from_json_str("demo", VALID).unwrap();
        assert_eq!(description.geoinfo.db, None);

        let tagged = VALID.replace(r#""locationmode": "name""#, r#""locationmode": "name", "db": "jhu""#);
        let description = DatasetDescription::from_json_str("demo", &tagged).unwrap();
        assert_eq!(description.geoinfo.db, Some(SourceDatabase::Jhu));

        let unknown = VALID.replace(r#""locationmode": "name""#, r#""locationmode": "name", "db": "csse""#);
        let err = DatasetDescription::from_json_str("demo", &unknown).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaInvalid);
    }

    #[test]
    fn parses_a_full_description() {
        let description = DatasetDescription::from_json_str("demo", VALID).unwrap();
        assert_eq!(description.granularity().unwrap(), Granularity::Country);
        let block = &description.datasets[0];
        assert_eq!(block.decimal_mark(), ',');
        assert_eq!(block.column("where").unwrap().source_name(), "country");
        assert_eq!(block.selections["age"].values(), ["0", "all"]);
        assert_eq!(block.drop["country"].values(), ["Total"]);
        assert_eq!(block.cast["country"], CastType::String);
        assert_eq!(description.variables(), vec!["cases"]);
    }

    #[test]
    fn missing_keys_are_listed_by_path() {
        let text = r#"{"geoinfo": {"granularity": "country", "iso3": "FRA"},
                       "datasets": [{"columns": [{"alias": "x"}]}]}"#;
        let err = DatasetDescription::from_json_str("demo", text).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaInvalid);
        let message = err.to_string();
        assert!(message.contains("geoinfo.locationmode"));
        assert!(message.contains("datasets[0].urldata"));
        assert!(message.contains("datasets[0].columns[0].name"));
    }

    #[test]
    fn unknown_granularity() {
        let text = VALID.replace("\"country\", \"iso3\"", "\"canton\", \"iso3\"");
        let err = DatasetDescription::from_json_str("demo", &text).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GranularityError);
    }

    #[test]
    fn bad_location_mode_is_schema_error() {
        let text = VALID.replace("\"locationmode\": \"name\"", "\"locationmode\": \"zip\"");
        let err = DatasetDescription::from_json_str("demo", &text).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaInvalid);
    }
}
