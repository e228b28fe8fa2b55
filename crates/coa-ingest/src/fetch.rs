//! Fetching of remote reference tables.
//!
//! Every component that needs data from outside the binary (region
//! hierarchies, demographics, geometry, dataset sources) takes a
//! [`ReferenceFetcher`]. Production code uses [`CachedHttpFetcher`]; tests
//! and offline runs use [`StaticFetcher`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use coa_model::{CacheConfig, CoaError, Result};
use sha2::Digest;

/// User agent sent with every request.
const USER_AGENT_VALUE: &str = concat!("coa/", env!("CARGO_PKG_VERSION"));

pub trait ReferenceFetcher: Send + Sync {
    /// Returns the content behind `url`, reusing a cached copy younger than
    /// `max_age`.
    fn fetch(&self, url: &str, max_age: Duration) -> Result<Vec<u8>>;

    /// [`fetch`](Self::fetch) decoded as UTF-8 (lossy).
    fn fetch_text(&self, url: &str, max_age: Duration) -> Result<String> {
        let bytes = self.fetch(url, max_age)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(sha2::Sha256::digest(bytes))
}

/// Local path named by `url`, if it is not an http(s) URL.
fn local_path(url: &str) -> Option<PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        None
    } else {
        Some(PathBuf::from(url))
    }
}

/// Blocking HTTP fetcher with an on-disk cache keyed by `sha256(url)`.
#[derive(Debug)]
pub struct CachedHttpFetcher {
    client: reqwest::blocking::Client,
    cache_dir: PathBuf,
}

impl CachedHttpFetcher {
    pub fn new(config: &CacheConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT_VALUE)
            .build()
            .map_err(|e| CoaError::fetch("<client>", format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            cache_dir: config.dir.clone(),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn cache_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(sha256_hex(url.as_bytes()))
    }

    /// Downloads `url` again regardless of the cached copy's age.
    pub fn refetch(&self, url: &str) -> Result<Vec<u8>> {
        if let Some(path) = local_path(url) {
            return read_local(url, &path);
        }
        let bytes = self.download(url)?;
        self.store(url, &bytes);
        Ok(bytes)
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        let started = Instant::now();
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| CoaError::fetch(url, describe_request_error(&e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CoaError::fetch(url, format!("HTTP {status}")));
        }
        let bytes = response
            .bytes()
            .map_err(|e| CoaError::fetch(url, describe_request_error(&e)))?;
        tracing::info!(
            url,
            bytes = bytes.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "downloaded reference table"
        );
        Ok(bytes.to_vec())
    }

    /// Writes a cache entry. A failing cache write is logged, not fatal.
    fn store(&self, url: &str, bytes: &[u8]) {
        let path = self.cache_path(url);
        let result = std::fs::create_dir_all(&self.cache_dir)
            .and_then(|()| std::fs::write(&path, bytes));
        if let Err(error) = result {
            tracing::warn!(url, path = %path.display(), %error, "could not write cache entry");
        }
    }

    fn cached(&self, url: &str, max_age: Duration) -> Option<CacheEntry> {
        let path = self.cache_path(url);
        let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok()?;
        let age = modified.elapsed().unwrap_or(Duration::ZERO);
        let bytes = std::fs::read(&path).ok()?;
        Some(CacheEntry {
            bytes,
            fresh: age <= max_age,
        })
    }
}

struct CacheEntry {
    bytes: Vec<u8>,
    fresh: bool,
}

impl ReferenceFetcher for CachedHttpFetcher {
    fn fetch(&self, url: &str, max_age: Duration) -> Result<Vec<u8>> {
        if let Some(path) = local_path(url) {
            return read_local(url, &path);
        }
        let cached = self.cached(url, max_age);
        if let Some(entry) = &cached
            && entry.fresh
        {
            tracing::debug!(url, "cache hit");
            return Ok(entry.bytes.clone());
        }
        match self.download(url) {
            Ok(bytes) => {
                self.store(url, &bytes);
                Ok(bytes)
            }
            // An expired copy beats no copy when the source is down.
            Err(error) => match cached {
                Some(entry) => {
                    tracing::warn!(url, %error, "source unreachable, using expired cache entry");
                    Ok(entry.bytes)
                }
                None => Err(error),
            },
        }
    }
}

fn read_local(url: &str, path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| CoaError::fetch(url, e))
}

fn describe_request_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("timed out: {error}")
    } else if error.is_connect() {
        format!("connection failed: {error}")
    } else {
        error.to_string()
    }
}

/// In-memory fetcher serving fixed content and recording every request.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    content: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.insert(url, content);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.content.insert(url.into(), content.into());
    }

    /// URLs requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl ReferenceFetcher for StaticFetcher {
    fn fetch(&self, url: &str, _max_age: Duration) -> Result<Vec<u8>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        self.content
            .get(url)
            .cloned()
            .ok_or_else(|| CoaError::fetch(url, "no content registered for this URL"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coa_model::ErrorKind;

    #[test]
    fn static_fetcher_records_requests() {
        let fetcher = StaticFetcher::new().with("mem://a", "x,y\n1,2\n");
        assert_eq!(
            fetcher.fetch_text("mem://a", Duration::ZERO).unwrap(),
            "x,y\n1,2\n"
        );
        let err = fetcher.fetch("mem://b", Duration::ZERO).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceFetchFailure);
        assert_eq!(fetcher.requests(), vec!["mem://a", "mem://b"]);
    }

    #[test]
    fn cache_path_is_url_digest() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            dir: dir.path().to_path_buf(),
            ..CacheConfig::default()
        };
        let fetcher = CachedHttpFetcher::new(&config).unwrap();
        let path = fetcher.cache_path("https://example.org/a.csv");
        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(path.file_name().unwrap().len(), 64);
    }

    #[test]
    fn fresh_cache_entry_avoids_network() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            dir: dir.path().to_path_buf(),
            ..CacheConfig::default()
        };
        let fetcher = CachedHttpFetcher::new(&config).unwrap();
        // Unroutable host: only the cache can answer.
        let url = "http://coa.invalid/table.csv";
        std::fs::write(fetcher.cache_path(url), b"a,b\n").unwrap();
        let bytes = fetcher.fetch(url, Duration::from_secs(3600)).unwrap();
        assert_eq!(bytes, b"a,b\n");
    }

    #[test]
    fn local_files_are_read_directly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.csv");
        std::fs::write(&path, "k\n1\n").unwrap();
        let fetcher = CachedHttpFetcher::new(&CacheConfig::default()).unwrap();
        let url = format!("file://{}", path.display());
        assert_eq!(fetcher.fetch_text(&url, Duration::ZERO).unwrap(), "k\n1\n");
        let missing = fetcher
            .fetch(&dir.path().join("nope.csv").display().to_string(), Duration::ZERO)
            .unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::SourceFetchFailure);
    }
}
