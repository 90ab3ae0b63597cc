//! Log handles and the per-handle dataset cache.
//!
//! A [`LogHandle`] binds one in-memory log record to one store and
//! enforces the lifecycle: save once, load lazily or eagerly, read
//! datasets through a cache, delete, save again. Dataset column data
//! lives in the handle's [`DatasetCache`], not in the wrapped
//! [`FlightLog`]; [`LogHandle::snapshot`] reassembles the full record.

use flightlog_core::{Dataset, FlightLog};
use std::sync::Arc;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::{LogId, LogStore};

/// Per-handle cache of dataset reads.
///
/// The cache only ever shrinks or refreshes: a fetch for a key that is
/// not cached returns the data without inserting it, so one hot dataset
/// cannot grow the cache on behalf of a handle that never asked for the
/// whole log. Entries appear only through [`LogHandle::load`] /
/// [`LogHandle::for_log`], which install the complete dataset list.
#[derive(Debug, Default)]
pub struct DatasetCache {
    entries: Vec<Dataset>,
}

impl DatasetCache {
    pub fn lookup(&self, name: &str, multi_id: u8) -> Option<&Dataset> {
        self.entries
            .iter()
            .find(|d| d.name == name && d.multi_id == multi_id)
    }

    /// Replace the entry with this key if one is cached; never insert.
    /// Returns whether a replacement happened.
    fn refresh(&mut self, dataset: &Dataset) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|d| d.name == dataset.name && d.multi_id == dataset.multi_id)
        {
            Some(slot) => {
                *slot = dataset.clone();
                true
            }
            None => false,
        }
    }

    fn replace_all(&mut self, datasets: Vec<Dataset>) {
        self.entries = datasets;
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Dataset] {
        &self.entries
    }
}

/// One log record bound to one store.
///
/// Construct with [`LogHandle::for_log`] (a freshly decoded, not yet
/// persisted record) or [`LogHandle::open`] (an already stored record).
#[derive(Debug)]
pub struct LogHandle<S: LogStore> {
    store: Arc<S>,
    id: Option<LogId>,
    /// Everything but the datasets; those live in `cache`.
    log: FlightLog,
    cache: DatasetCache,
    /// Set when the last whole-record load skipped column data. A handle
    /// in this state cannot be re-saved.
    lazy_loaded: bool,
}

impl<S: LogStore> LogHandle<S> {
    /// General constructor: exactly one of `log` and `id` must be given.
    /// The store's schema version is checked up front.
    pub async fn new(
        store: Arc<S>,
        log: Option<FlightLog>,
        id: Option<LogId>,
        lazy: bool,
    ) -> Result<Self> {
        store.check_schema().await?;
        match (log, id) {
            (Some(log), None) => Ok(Self::from_parts(store, log, None, false)),
            (None, Some(id)) => {
                let log = store.fetch_log(id, lazy).await?;
                Ok(Self::from_parts(store, log, Some(id), lazy))
            }
            (Some(_), Some(_)) => Err(StoreError::InvalidArguments(
                "give either a log record or a stored id, not both".to_string(),
            )),
            (None, None) => Err(StoreError::InvalidArguments(
                "give either a log record or a stored id".to_string(),
            )),
        }
    }

    /// Wrap a freshly decoded log that has not been persisted yet.
    pub async fn for_log(store: Arc<S>, log: FlightLog) -> Result<Self> {
        Self::new(store, Some(log), None, false).await
    }

    /// Open an already stored log. With `lazy`, dataset column data is
    /// left unmaterialized until asked for.
    pub async fn open(store: Arc<S>, id: LogId, lazy: bool) -> Result<Self> {
        Self::new(store, None, Some(id), lazy).await
    }

    fn from_parts(store: Arc<S>, mut log: FlightLog, id: Option<LogId>, lazy: bool) -> Self {
        let datasets = std::mem::take(&mut log.datasets);
        let mut cache = DatasetCache::default();
        cache.replace_all(datasets);
        Self {
            store,
            id,
            log,
            cache,
            lazy_loaded: lazy,
        }
    }

    /// The stored identity, if this handle is persisted.
    pub fn id(&self) -> Option<LogId> {
        self.id
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// The wrapped record's metadata. Its `datasets` list is empty; use
    /// [`LogHandle::get_dataset`] or [`LogHandle::snapshot`].
    pub fn log(&self) -> &FlightLog {
        &self.log
    }

    pub fn cache(&self) -> &DatasetCache {
        &self.cache
    }

    /// Reassemble the complete record, datasets included.
    pub fn snapshot(&self) -> Result<FlightLog> {
        if self.lazy_loaded {
            return Err(StoreError::IllegalAfterLazyLoad);
        }
        let mut log = self.log.clone();
        log.datasets = self.cache.entries.to_vec();
        Ok(log)
    }

    /// Persist the record and adopt the new identity.
    ///
    /// Fails with [`StoreError::AlreadyPersisted`] if the handle already
    /// has an identity, and with [`StoreError::DuplicateContent`] if the
    /// content digest is already stored under another identity.
    pub async fn save(&mut self, append_json: bool) -> Result<LogId> {
        if self.id.is_some() {
            return Err(StoreError::AlreadyPersisted);
        }
        let snapshot = self.snapshot()?;
        match self.store.insert_log(&snapshot, append_json).await {
            Ok(id) => {
                self.id = Some(id);
                debug!(log_id = id, "handle saved");
                Ok(id)
            }
            // The content is already stored; adopt that identity so the
            // handle still points at the stored record.
            Err(StoreError::DuplicateContent { existing, digest }) => {
                self.id = Some(existing);
                Err(StoreError::DuplicateContent { existing, digest })
            }
            Err(e) => Err(e),
        }
    }

    /// Re-read the whole record from the store, replacing in-memory
    /// state and the dataset cache.
    pub async fn load(&mut self, lazy: bool) -> Result<()> {
        let id = self.id.ok_or(StoreError::NotPersisted)?;
        let mut log = self.store.fetch_log(id, lazy).await?;
        let datasets = std::mem::take(&mut log.datasets);
        self.log = log;
        self.cache.replace_all(datasets);
        self.lazy_loaded = lazy;
        Ok(())
    }

    /// Read one dataset, serving from the per-handle cache when it can.
    ///
    /// With `use_cache`, a cached entry is returned as long as it
    /// satisfies the request (always, when `lazy`; only when
    /// materialized, otherwise). A miss goes to the store; the result
    /// refreshes an existing cache entry but is never inserted as a new
    /// one.
    pub async fn get_dataset(
        &mut self,
        name: &str,
        multi_id: u8,
        lazy: bool,
        use_cache: bool,
    ) -> Result<Dataset> {
        let id = self.id.ok_or(StoreError::NotPersisted)?;
        if use_cache {
            if let Some(cached) = self.cache.lookup(name, multi_id) {
                if lazy || cached.has_data() {
                    debug!(name, multi_id, "dataset served from cache");
                    return Ok(cached.clone());
                }
            }
        }
        let fetched = self.store.fetch_dataset(id, name, multi_id, lazy).await?;
        let refreshed = self.cache.refresh(&fetched);
        debug!(name, multi_id, lazy, refreshed, "dataset fetched from store");
        Ok(fetched)
    }

    /// Delete the stored record. The handle reverts to unpersisted and,
    /// unless it was lazily loaded, can be saved again.
    pub async fn delete(&mut self) -> Result<()> {
        let id = self.id.ok_or(StoreError::NotPersisted)?;
        self.store.delete_log(id).await?;
        self.id = None;
        Ok(())
    }

    /// Drop all cached dataset entries.
    ///
    /// Mainly useful in tests that want to force real fetches. The
    /// handle no longer holds the full record afterwards, so it counts
    /// as lazily loaded and cannot be re-saved.
    pub fn clear_dataset_cache(&mut self) {
        self.cache.clear();
        self.lazy_loaded = true;
    }
}
