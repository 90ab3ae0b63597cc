//! Store Error Types
//!
//! All errors are surfaced synchronously to the caller of the triggering
//! operation; nothing is retried internally. A failed save leaves no new
//! rows visible.
//!
//! ## Error Categories
//!
//! ### Compatibility
//! - `SchemaVersionTooOld`: the store's version counter is behind what
//!   this engine expects; migrate the store first, no retry
//!
//! ### Lifecycle
//! - `AlreadyPersisted`: save on a handle that already has an identity
//! - `DuplicateContent`: save aborted, the content digest is already
//!   present; carries the existing identity
//! - `NotPersisted`: read or delete on a handle without an identity
//! - `IllegalAfterLazyLoad`: re-serializing a handle whose column data
//!   was never materialized
//!
//! ### Lookup
//! - `NotFound` / `DatasetNotFound`: absent identity or dataset key
//!
//! ### Substrate
//! - `Database`, `Migration`, `Io`, `Codec`: wrapped lower-level failures

use flightlog_core::CodecError;
use thiserror::Error;

use crate::LogId;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store schema version {found} < expected {expected}, migration needed")]
    SchemaVersionTooOld { found: i64, expected: i64 },

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("log is already persisted; delete it before saving again")]
    AlreadyPersisted,

    #[error("content digest {digest} already stored with id={existing}")]
    DuplicateContent { existing: LogId, digest: String },

    #[error("no log in store with id={0}")]
    NotFound(LogId),

    #[error("dataset '{name}' (instance {multi_id}) not found")]
    DatasetNotFound { name: String, multi_id: u8 },

    #[error("log has not been persisted")]
    NotPersisted,

    #[error("columns were never materialized (lazy load); cannot re-serialize")]
    IllegalAfterLazyLoad,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("column codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        StoreError::Migration(e.to_string())
    }
}
