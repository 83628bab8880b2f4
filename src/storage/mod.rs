// Storage module - local persistent store (compressed datasets, chains,
// visualizations, API cache) over one embedded database

pub mod api_cache;
pub mod chains;
pub mod clock;
pub mod collection;
pub mod compression;
pub mod database;
pub mod datasets;
pub mod visualizations;

pub use api_cache::{ApiCache, ApiCacheEntry, ApiCacheStats};
pub use chains::ChainStore;
pub use clock::{Clock, ManualClock, SystemClock};
pub use collection::{Collection, Document, IndexKey, IndexSpec};
pub use compression::{compress, compress_with_stats, compression_ratio, decompress, CompressionStats};
pub use database::{LocalDatabase, DATABASE_NAME, SCHEMA_VERSION};
pub use datasets::{DatasetMetadata, DatasetStore, StoredDataset};
pub use visualizations::{Visualization, VisualizationStore};

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use chrono::{DateTime, Utc};
use crate::types::InsightError;

/// Handle to the local store, constructed once and passed to consumers.
///
/// Cloning is cheap; every clone and every store view shares the same database.
#[derive(Debug, Clone)]
pub struct LocalStore {
    db: Arc<Mutex<LocalDatabase>>,
    clock: Arc<dyn Clock>,
}

impl LocalStore {
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, InsightError> {
        Self::open_with_clock(root, Arc::new(SystemClock))
    }

    pub fn open_with_clock<P: AsRef<Path>>(root: P, clock: Arc<dyn Clock>) -> Result<Self, InsightError> {
        let db = LocalDatabase::open(root)?;
        Ok(Self { db: Arc::new(Mutex::new(db)), clock })
    }

    #[must_use]
    pub fn datasets(&self) -> DatasetStore {
        DatasetStore::new(self.clone())
    }

    #[must_use]
    pub fn chains(&self) -> ChainStore {
        ChainStore::new(self.clone())
    }

    #[must_use]
    pub fn visualizations(&self) -> VisualizationStore {
        VisualizationStore::new(self.clone())
    }

    #[must_use]
    pub fn api_cache(&self) -> ApiCache {
        ApiCache::new(self.clone())
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, LocalDatabase>, InsightError> {
        self.db
            .lock()
            .map_err(|e| InsightError::StoreUnavailable(format!("database lock poisoned: {e}")))
    }
}
