//! QueryCache - Loaded stores memoized by source path
//!
//! A cache is an explicit object owned by the caller; there is no process-wide state.
//! Entries are never evicted or refreshed: a source that changes on disk after its first
//! load keeps being served from memory for the lifetime of the cache.
//!
//! All methods take `&self` and are safe to call from several threads. The internal lock
//! is held while a store loads, so concurrent first queries against the same source parse
//! it exactly once.

use crate::query::{QueryOptions, QueryResult, query};
use crate::{RegionStore, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Memoizes [`RegionStore`]s by the path they were loaded from
#[derive(Debug, Default)]
pub struct QueryCache {
    stores: Mutex<HashMap<PathBuf, Arc<RegionStore>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the store for `path`, loading it on first use
    ///
    /// A failed load is not cached; the next call tries again.
    pub fn get_or_load<P: AsRef<Path>>(&self, path: P) -> Result<Arc<RegionStore>> {
        let path = path.as_ref();
        self.get_or_insert_with(path, || RegionStore::load(path))
    }

    /// Return the store cached under `key`, building it with `load` if absent
    pub fn get_or_insert_with<F>(&self, key: impl Into<PathBuf>, load: F) -> Result<Arc<RegionStore>>
    where
        F: FnOnce() -> Result<RegionStore>,
    {
        let key = key.into();
        let mut stores = self.lock();

        if let Some(store) = stores.get(&key) {
            tracing::trace!("Cache hit for {}", key.display());
            return Ok(Arc::clone(store));
        }

        let store = Arc::new(load()?);
        let info = store.info();
        tracing::info!(
            regions = info.region_count,
            levels = info.level_count,
            vertices = info.vertex_count,
            "Loaded {}",
            key.display()
        );
        stores.insert(key, Arc::clone(&store));
        Ok(store)
    }

    /// Load (or reuse) the store at `source` and run a full query against it
    pub fn query<P: AsRef<Path>>(
        &self,
        source: P,
        lon: f64,
        lat: f64,
        options: &QueryOptions,
    ) -> Result<QueryResult> {
        let store = self.get_or_load(source)?;
        query(&store, lon, lat, options)
    }

    /// Check whether a store for `path` is already loaded
    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        self.lock().contains_key(path.as_ref())
    }

    /// Number of cached stores
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PathBuf, Arc<RegionStore>>> {
        // Stores are immutable once inserted, so a poisoned map is still consistent
        self.stores
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
