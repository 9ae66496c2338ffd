//! Time-bounded memoization of dataset loads.
//!
//! Interactive view queries reuse the parsed snapshot until the source file's
//! modification time changes or the entry outlives the cache's TTL.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

use anyhow::{Context, Result};
use log::debug;

use crate::{dataset::Dataset, error::PipelineError, schema::Schema};

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
struct CacheEntry {
    modified: SystemTime,
    loaded_at: Instant,
    schema: Schema,
    dataset: Arc<Dataset>,
}

#[derive(Debug)]
pub struct LoadCache {
    ttl: Duration,
    entries: HashMap<PathBuf, CacheEntry>,
    loads: usize,
}

impl Default for LoadCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl LoadCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
            loads: 0,
        }
    }

    /// Number of times a dataset was actually parsed from disk.
    pub fn loads(&self) -> usize {
        self.loads
    }

    /// Returns the cached snapshot for `path`, reloading it when stale.
    ///
    /// The snapshot is loaded with [`Dataset::read`] followed by
    /// [`Dataset::retain_positive_prices`].
    pub fn get_or_load(&mut self, path: &Path, schema: &Schema) -> Result<Arc<Dataset>> {
        let key = fs::canonicalize(path).map_err(|_| PipelineError::not_found(path))?;
        let modified = fs::metadata(&key)
            .and_then(|meta| meta.modified())
            .with_context(|| format!("Reading modification time of {path:?}"))?;

        if let Some(entry) = self.entries.get(&key) {
            let fresh = entry.modified == modified
                && entry.loaded_at.elapsed() < self.ttl
                && entry.schema == *schema;
            if fresh {
                debug!("Serving cached dataset for {key:?}");
                return Ok(Arc::clone(&entry.dataset));
            }
            debug!("Cached dataset for {key:?} is stale; reloading");
        }

        let mut dataset = Dataset::read(&key, schema)?;
        dataset.retain_positive_prices()?;
        let dataset = Arc::new(dataset);
        self.loads += 1;
        self.entries.insert(
            key,
            CacheEntry {
                modified,
                loaded_at: Instant::now(),
                schema: schema.clone(),
                dataset: Arc::clone(&dataset),
            },
        );
        Ok(dataset)
    }

    pub fn invalidate(&mut self, path: &Path) {
        if let Ok(key) = fs::canonicalize(path) {
            self.entries.remove(&key);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
