/// Cached catalog store.
///
/// Holds the full catalog behind a shared read-mostly cache so that repeated
/// identifier resolutions do not re-query the web service. The cache is an
/// `Arc<Vec<CatalogEntry>>` swapped atomically under a lock: readers keep
/// whatever snapshot they obtained, and a reload never mutates entries in
/// place. A store instance is injected wherever catalog access is needed, so
/// independent service roots get independent caches.

use std::sync::{Arc, RwLock};

use crate::catalog::{annotate_duplicates, CatalogEntry};
use crate::logging::{self, LogSource};
use crate::query::{CatalogQuery, CatalogQueryEngine};
use crate::transport::CatalogTransport;

pub struct CatalogStore {
    cache: RwLock<Arc<Vec<CatalogEntry>>>,
}

impl CatalogStore {
    pub fn new() -> CatalogStore {
        CatalogStore { cache: RwLock::new(Arc::new(Vec::new())) }
    }

    /// Loads the full catalog through the given engine.
    ///
    /// With `force` false this never queries: the current snapshot comes
    /// back as-is, empty when nothing was loaded yet. With `force` true the
    /// catalog is re-queried and the cache swapped. A failed query degrades
    /// to an empty snapshot with an error log entry rather than propagating,
    /// so discovery callers see "no entries" instead of an error; resolution
    /// paths that need to distinguish failure query the engine directly.
    pub fn load<T: CatalogTransport>(
        &self,
        engine: &CatalogQueryEngine<T>,
        force: bool,
    ) -> Arc<Vec<CatalogEntry>> {
        if !force {
            return self.cached();
        }

        let entries = match engine.query(&CatalogQuery::default()) {
            Ok(mut entries) => {
                annotate_duplicates(&mut entries);
                entries
            }
            Err(e) => {
                logging::error(
                    LogSource::Catalog,
                    None,
                    &format!("catalog load failed, caching empty catalog: {}", e),
                );
                Vec::new()
            }
        };

        let snapshot = Arc::new(entries);
        let mut cache = self.cache.write().expect("catalog cache poisoned");
        *cache = Arc::clone(&snapshot);
        logging::info(
            LogSource::Catalog,
            None,
            &format!("catalog cache loaded with {} entries", snapshot.len()),
        );
        snapshot
    }

    /// Current snapshot without triggering a load; empty when never loaded.
    pub fn cached(&self) -> Arc<Vec<CatalogEntry>> {
        Arc::clone(&self.cache.read().expect("catalog cache poisoned"))
    }

    /// Replaces the snapshot with an empty one; callers reload with
    /// `load(force=true)`.
    pub fn invalidate(&self) {
        *self.cache.write().expect("catalog cache poisoned") = Arc::new(Vec::new());
    }
}

impl Default for CatalogStore {
    fn default() -> CatalogStore {
        CatalogStore::new()
    }
}
