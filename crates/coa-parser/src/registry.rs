//! Directory-backed store of dataset descriptions.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use coa_model::{CoaError, Result};

use crate::schema::DatasetDescription;

/// Loads `<dir>/<dataset>.json` on first request and keeps it for the
/// lifetime of the registry.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    dir: Option<PathBuf>,
    cache: Mutex<HashMap<String, Arc<DatasetDescription>>>,
}

impl SchemaRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
            cache: Mutex::default(),
        }
    }

    /// A registry holding only what is [`insert`](Self::insert)ed.
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn insert(&self, dataset: impl Into<String>, description: DatasetDescription) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(dataset.into(), Arc::new(description));
    }

    pub fn get(&self, dataset: &str) -> Result<Arc<DatasetDescription>> {
        if let Some(found) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(dataset)
        {
            return Ok(Arc::clone(found));
        }
        let description = Arc::new(self.load(dataset)?);
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(cache.entry(dataset.to_string()).or_insert(description)))
    }

    fn load(&self, dataset: &str) -> Result<DatasetDescription> {
        let Some(dir) = &self.dir else {
            return Err(CoaError::schema(dataset, "no such dataset"));
        };
        let path = dir.join(format!("{dataset}.json"));
        if !path.is_file() {
            return Err(CoaError::schema(
                dataset,
                format!("no such dataset (looked for {})", path.display()),
            ));
        }
        let text = std::fs::read_to_string(&path).map_err(|e| CoaError::io(&path, e))?;
        let description = DatasetDescription::from_json_str(dataset, &text)?;
        tracing::debug!(dataset, path = %path.display(), "loaded dataset description");
        Ok(description)
    }

    /// Dataset names available on disk or in memory, sorted.
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        if let Some(dir) = &self.dir
            && dir.is_dir()
        {
            for entry in std::fs::read_dir(dir).map_err(|e| CoaError::io(dir, e))? {
                let path = entry.map_err(|e| CoaError::io(dir, e))?.path();
                if path.extension().is_some_and(|ext| ext == "json")
                    && let Some(stem) = path.file_stem().and_then(|s| s.to_str())
                {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coa_model::ErrorKind;

    const DESCRIPTION: &str = r#"{
        "geoinfo": {"granularity": "country", "iso3": "FRA", "locationmode": "code"},
        "datasets": [{"urldata": "mem://x.csv", "columns": [{"name": "cases"}]}]
    }"#;

    #[test]
    fn loads_once_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.json");
        std::fs::write(&path, DESCRIPTION).unwrap();
        let registry = SchemaRegistry::new(dir.path());

        let first = registry.get("demo").unwrap();
        std::fs::remove_file(&path).unwrap();
        let second = registry.get("demo").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.names().unwrap(), vec!["demo"]);
    }

    #[test]
    fn unknown_dataset_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SchemaRegistry::new(dir.path()).get("nothing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaInvalid);
        assert_eq!(
            err.kind().category(),
            coa_model::ErrorCategory::Configuration
        );
    }
}
