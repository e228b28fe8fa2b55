//! Error taxonomy shared by every crate of the workspace.
//!
//! Each failure mode of the location and dataset pipeline has its own
//! variant so callers can tell a configuration problem ("no such dataset")
//! from a transient one ("source unreachable") without string matching.
//! Use [`CoaError::kind`] and [`ErrorKind::category`] for that.

use std::path::PathBuf;

use thiserror::Error;

use crate::enums::GeometryView;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CoaError {
    #[error("invalid {argument} '{value}', expected one of: {expected}")]
    InvalidArgument {
        argument: &'static str,
        value: String,
        expected: String,
    },

    #[error("incompatible options: {message}")]
    IncompatibleOptions { message: String },

    #[error("location '{location}' could not be resolved{}", candidates_note(.candidates))]
    LookupFailure {
        location: String,
        candidates: Vec<String>,
    },

    #[error("unsupported source database '{database}', known: {known}")]
    UnsupportedSource { database: String, known: String },

    #[error("'{region}' is not a known region")]
    UnknownRegion { region: String },

    #[error("country '{country}' has no geometry catalog, supported: {supported}")]
    UnsupportedCountry { country: String, supported: String },

    #[error("conflicting arguments: {message}")]
    ConflictingArguments { message: String },

    #[error("subregion '{code}' does not exist")]
    UnknownSubregion { code: String },

    #[error("geometry of {country} is already {current}, cannot switch to {requested}")]
    StateConflict {
        country: String,
        current: GeometryView,
        requested: GeometryView,
    },

    #[error("field '{field}' already exists (use overload to replace it)")]
    FieldConflict { field: String },

    #[error("unknown field '{field}', available: {available}")]
    UnknownField { field: String, available: String },

    #[error("invalid description for dataset '{dataset}': {message}")]
    SchemaInvalid { dataset: String, message: String },

    #[error("failed to fetch {url}: {message}")]
    SourceFetchFailure { url: String, message: String },

    #[error("unrecognized granularity '{value}', expected country, region or subregion")]
    GranularityError { value: String },

    #[error("failed to parse dataset '{dataset}': {source}")]
    ParseFailure {
        dataset: String,
        #[source]
        source: Box<CoaError>,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse CSV {origin}: {message}")]
    Csv { origin: String, message: String },

    #[error("invalid configuration {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("table operation failed: {0}")]
    Table(#[from] polars::prelude::PolarsError),
}

fn candidates_note(candidates: &[String]) -> String {
    if candidates.is_empty() {
        String::new()
    } else {
        format!(" (ambiguous between: {})", candidates.join(", "))
    }
}

impl CoaError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn lookup(location: impl Into<String>) -> Self {
        Self::LookupFailure {
            location: location.into(),
            candidates: Vec::new(),
        }
    }

    pub fn schema(dataset: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaInvalid {
            dataset: dataset.into(),
            message: message.into(),
        }
    }

    pub fn fetch(url: impl Into<String>, message: impl ToString) -> Self {
        Self::SourceFetchFailure {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Returns the taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::IncompatibleOptions { .. } => ErrorKind::IncompatibleOptions,
            Self::LookupFailure { .. } => ErrorKind::LookupFailure,
            Self::UnsupportedSource { .. } => ErrorKind::UnsupportedSource,
            Self::UnknownRegion { .. } => ErrorKind::UnknownRegion,
            Self::UnsupportedCountry { .. } => ErrorKind::UnsupportedCountry,
            Self::ConflictingArguments { .. } => ErrorKind::ConflictingArguments,
            Self::UnknownSubregion { .. } => ErrorKind::UnknownSubregion,
            Self::StateConflict { .. } => ErrorKind::StateConflict,
            Self::FieldConflict { .. } => ErrorKind::FieldConflict,
            Self::UnknownField { .. } => ErrorKind::UnknownField,
            Self::SchemaInvalid { .. } => ErrorKind::SchemaInvalid,
            Self::SourceFetchFailure { .. } => ErrorKind::SourceFetchFailure,
            Self::GranularityError { .. } => ErrorKind::GranularityError,
            Self::ParseFailure { .. } => ErrorKind::ParseFailure,
            Self::Io { .. } => ErrorKind::Io,
            Self::Csv { .. } => ErrorKind::Csv,
            Self::Config { .. } => ErrorKind::Config,
            Self::Json(_) => ErrorKind::Json,
            Self::Table(_) => ErrorKind::Table,
        }
    }

    /// Innermost error of a `ParseFailure` chain, or `self`.
    pub fn root(&self) -> &CoaError {
        match self {
            Self::ParseFailure { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Flat, copyable view of [`CoaError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    IncompatibleOptions,
    LookupFailure,
    UnsupportedSource,
    UnknownRegion,
    UnsupportedCountry,
    ConflictingArguments,
    UnknownSubregion,
    StateConflict,
    FieldConflict,
    UnknownField,
    SchemaInvalid,
    SourceFetchFailure,
    GranularityError,
    ParseFailure,
    Io,
    Csv,
    Config,
    Json,
    Table,
}

/// How a caller is expected to react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Wrong arguments or configuration; retrying will not help.
    Configuration,
    /// The input data did not match any known vocabulary.
    DataQuality,
    /// An external source could not be reached; retrying may help.
    Transient,
    /// Anything else raised while building a table.
    Internal,
}

impl ErrorKind {
    pub fn category(self) -> ErrorCategory {
        match self {
            Self::InvalidArgument
            | Self::IncompatibleOptions
            | Self::UnsupportedSource
            | Self::UnsupportedCountry
            | Self::ConflictingArguments
            | Self::StateConflict
            | Self::FieldConflict
            | Self::UnknownField
            | Self::SchemaInvalid
            | Self::GranularityError
            | Self::Config => ErrorCategory::Configuration,
            Self::LookupFailure | Self::UnknownRegion | Self::UnknownSubregion => {
                ErrorCategory::DataQuality
            }
            Self::SourceFetchFailure => ErrorCategory::Transient,
            Self::ParseFailure | Self::Io | Self::Csv | Self::Json | Self::Table => {
                ErrorCategory::Internal
            }
        }
    }

    pub fn is_transient(self) -> bool {
        self.category() == ErrorCategory::Transient
    }
}

pub type Result<T> = std::result::Result<T, CoaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_failure_lists_candidates() {
        let err = CoaError::LookupFailure {
            location: "Congo".to_string(),
            candidates: vec!["Congo".to_string(), "DR Congo".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "location 'Congo' could not be resolved (ambiguous between: Congo, DR Congo)"
        );
        assert_eq!(
            CoaError::lookup("Atlantis").to_string(),
            "location 'Atlantis' could not be resolved"
        );
    }

    #[test]
    fn parse_failure_keeps_root_cause() {
        let err = CoaError::ParseFailure {
            dataset: "jhu".to_string(),
            source: Box::new(CoaError::UnknownRegion {
                region: "Atlantis".to_string(),
            }),
        };
        assert_eq!(err.kind(), ErrorKind::ParseFailure);
        assert_eq!(err.root().kind(), ErrorKind::UnknownRegion);
        assert!(err.to_string().contains("'Atlantis' is not a known region"));
    }

    #[test]
    fn categories_separate_configuration_from_transient() {
        assert_eq!(
            ErrorKind::SchemaInvalid.category(),
            ErrorCategory::Configuration
        );
        assert!(ErrorKind::SourceFetchFailure.is_transient());
        assert!(!ErrorKind::LookupFailure.is_transient());
        assert_eq!(
            ErrorKind::LookupFailure.category(),
            ErrorCategory::DataQuality
        );
    }
}
