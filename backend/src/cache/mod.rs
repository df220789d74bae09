//! Load-once dataset cache.
//!
//! One [`DatasetCache`] is created at process start (by `serve` or a CLI
//! query). The first successful load is kept for the rest of the process and
//! never invalidated. A failed load leaves the cache empty, so the next
//! request retries instead of serving a stale error.

use once_cell::sync::OnceCell;
use std::sync::Arc;

use crate::api::logs::log_error;
use crate::config::DataPaths;
use crate::error::LoadResult;
use crate::loader::{load_dataset, Dataset};

/// Process-wide holder of the loaded [`Dataset`].
#[derive(Debug)]
pub struct DatasetCache {
    paths: DataPaths,
    cell: OnceCell<Arc<Dataset>>,
}

impl DatasetCache {
    pub fn new(paths: DataPaths) -> Self {
        Self {
            paths,
            cell: OnceCell::new(),
        }
    }

    /// Wrap an already loaded dataset.
    pub fn preloaded(paths: DataPaths, dataset: Dataset) -> Self {
        let cell = OnceCell::new();
        let _ = cell.set(Arc::new(dataset));
        Self { paths, cell }
    }

    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    /// The dataset, loading it on first use.
    pub fn get_or_load(&self) -> LoadResult<Arc<Dataset>> {
        self.cell
            .get_or_try_init(|| load_dataset(&self.paths).map(Arc::new))
            .cloned()
            .map_err(|e| {
                log_error(format!("Data load failed: {}", e));
                e
            })
    }

    /// The dataset if it has already been loaded.
    pub fn get(&self) -> Option<Arc<Dataset>> {
        self.cell.get().cloned()
    }

    pub fn is_loaded(&self) -> bool {
        self.cell.get().is_some()
    }
}
