//! # Flightlog Store
//!
//! Relational persistence for decoded flight-telemetry logs, backed by
//! SQLite via `sqlx`.
//!
//! ## Architecture
//!
//! ```text
//! LogHandle ──► LogStore (trait) ──► SqliteLogStore ──► SQLite
//!     │
//!     └── DatasetCache (per-handle, column data)
//! ```
//!
//! - [`LogStore`] is the persistence seam: identity allocation, whole-log
//!   and per-dataset reads, deletion, digest lookup. [`SqliteLogStore`]
//!   is the production implementation; tests substitute their own.
//! - [`LogHandle`] binds one log record to one store and carries the
//!   lifecycle rules: write-once save, content dedup, lazy or eager
//!   column loading, and a per-handle [`DatasetCache`].
//! - [`ContentHasher`] produces the SHA-256 digest that identifies log
//!   content across stores.
//!
//! ## Write-Once Model
//!
//! A log record is immutable once saved. There is no update path: to
//! change a stored log, delete it and save again, which allocates a new
//! identity. Saving content whose digest is already present fails with
//! [`StoreError::DuplicateContent`] carrying the existing identity.
//!
//! ## Lazy Columns
//!
//! Whole-log reads can skip the bulk column blobs (`lazy`), leaving
//! dataset declarations in place and `data == None`. Individual datasets
//! are then materialized on demand through the handle, which caches them
//! per handle. A lazily loaded handle can never be re-saved
//! ([`StoreError::IllegalAfterLazyLoad`]): its in-memory state is not
//! the full record.

pub mod config;
pub mod error;
pub mod handle;
pub mod hasher;
pub mod store;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use handle::{DatasetCache, LogHandle};
pub use hasher::ContentHasher;
pub use store::{SqliteLogStore, SCHEMA_VERSION};

use async_trait::async_trait;
use flightlog_core::{Dataset, FlightLog};

/// Row identity of a persisted log.
pub type LogId = i64;

/// The persistence seam between log handles and the backing database.
///
/// All operations are whole-record: there is no partial update. `lazy`
/// on the read paths skips materializing column data.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Fail if the store's schema version is behind this engine's.
    async fn check_schema(&self) -> Result<()>;

    /// Look up the identity of a log by content digest.
    async fn find_by_digest(&self, digest: &str) -> Result<Option<LogId>>;

    /// Whether a log with this identity exists.
    async fn exists(&self, id: LogId) -> Result<bool>;

    /// Persist a complete log and return its new identity.
    ///
    /// Atomic: on any failure no rows remain. A digest collision maps to
    /// [`StoreError::DuplicateContent`].
    async fn insert_log(&self, log: &FlightLog, append_json: bool) -> Result<LogId>;

    /// Read a complete log record. With `lazy`, dataset column data is
    /// skipped and each dataset's `data` is `None`.
    async fn fetch_log(&self, id: LogId, lazy: bool) -> Result<FlightLog>;

    /// Read a single dataset of a log. Declarations are always present;
    /// with `lazy`, column data is skipped.
    async fn fetch_dataset(
        &self,
        id: LogId,
        name: &str,
        multi_id: u8,
        lazy: bool,
    ) -> Result<Dataset>;

    /// Delete a log and everything it owns.
    async fn delete_log(&self, id: LogId) -> Result<()>;
}
